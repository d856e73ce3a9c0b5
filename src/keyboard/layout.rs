//! Layout index
//!
//! Lists the keycode tables available for selection. Only the metadata
//! header at the top of each file is read:
//!
//! ```text
//! #! layoutName = de
//! #! layoutDescription = German
//! #! variantName = nodeadkeys
//! #! variantDescription = German (eliminate dead keys)
//! ```
//!
//! Reading stops at the first record line, so listing is cheap
//! even for large tables.

use crate::constants::{COMMENT_CHAR, METADATA_PREFIX};
use crate::error::TableLoadError;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Descriptive metadata of one keycode table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub layout_name: String,
    pub layout_description: String,
    pub variant_name: String,
    pub variant_description: String,
}

impl Layout {
    pub fn new(layout_name: impl Into<String>, variant_name: impl Into<String>) -> Self {
        Self {
            layout_name: layout_name.into(),
            variant_name: variant_name.into(),
            ..Default::default()
        }
    }

    /// `layoutName[-variantName]`, the keycode table file name.
    /// Empty when the layout name is missing.
    pub fn id(&self) -> String {
        if self.layout_name.is_empty() {
            String::new()
        } else if self.variant_name.is_empty() {
            self.layout_name.clone()
        } else {
            format!("{}-{}", self.layout_name, self.variant_name)
        }
    }

    /// Human-readable name for pickers; variant description first
    pub fn display_name(&self) -> String {
        if !self.variant_description.is_empty() {
            self.variant_description.clone()
        } else if !self.layout_description.is_empty() {
            self.layout_description.clone()
        } else {
            self.id()
        }
    }

    /// Read the metadata header of a keycode table
    pub fn read_header<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut layout = Layout::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(entry) = line.strip_prefix(METADATA_PREFIX) else {
                if line.starts_with(COMMENT_CHAR) {
                    continue;
                }
                // first record, header is over
                break;
            };
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed metadata line {:?}", line),
                )
            })?;
            let value = value.trim().to_string();
            match key.trim() {
                "layoutName" => layout.layout_name = value,
                "layoutDescription" => layout.layout_description = value,
                "variantName" => layout.variant_name = value,
                "variantDescription" => layout.variant_description = value,
                other => debug!("Unknown layout metadata key {:?}", other),
            }
        }
        Ok(layout)
    }
}

/// Enumerates layouts in a keycode table directory
#[derive(Debug, Clone)]
pub struct LayoutIndex {
    dir: PathBuf,
}

impl LayoutIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All readable layouts, in directory order.
    ///
    /// Unreadable or inconsistent files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Layout>, TableLoadError> {
        let origin = self.dir.display().to_string();
        let entries = std::fs::read_dir(&self.dir).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                TableLoadError::NotFound {
                    origin: origin.clone(),
                }
            } else {
                TableLoadError::Io {
                    origin: origin.clone(),
                    source,
                }
            }
        })?;

        let mut layouts = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match read_layout(&path) {
                Ok(layout) => layouts.push(layout),
                Err(e) => warn!("Skipping keycode table {}: {}", path.display(), e),
            }
        }
        debug!("Found {} layouts in {}", layouts.len(), origin);
        Ok(layouts)
    }

    /// Layout with the given id
    pub fn find(&self, id: &str) -> Option<Layout> {
        self.list().ok()?.into_iter().find(|l| l.id() == id)
    }
}

fn read_layout(path: &Path) -> io::Result<Layout> {
    let layout = Layout::read_header(BufReader::new(File::open(path)?))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if layout.layout_name.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing layoutName",
        ));
    }
    if layout.id() != file_name {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("layout id {:?} does not match file name", layout.id()),
        ));
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_layout_id() {
        assert_eq!(Layout::new("us", "").id(), "us");
        assert_eq!(Layout::new("de", "nodeadkeys").id(), "de-nodeadkeys");
        assert_eq!(Layout::new("", "dvorak").id(), "");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut layout = Layout::new("de", "nodeadkeys");
        assert_eq!(layout.display_name(), "de-nodeadkeys");
        layout.layout_description = "German".into();
        assert_eq!(layout.display_name(), "German");
        layout.variant_description = "German (eliminate dead keys)".into();
        assert_eq!(layout.display_name(), "German (eliminate dead keys)");
    }

    #[test]
    fn test_read_header_stops_at_first_record() {
        let text = "\
# exported keycodes
#! layoutName = de
#! layoutDescription = German
38,0x61,0x41
#! variantName = late
";
        let layout = Layout::read_header(text.as_bytes()).unwrap();
        assert_eq!(layout.layout_name, "de");
        assert_eq!(layout.layout_description, "German");
        assert_eq!(layout.variant_name, "");
    }

    #[test]
    fn test_list_skips_malformed_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(
            dir.join("us"),
            "#! layoutName = us\n#! layoutDescription = English (US)\n38,0x61\n",
        )
        .unwrap();
        fs::write(
            dir.join("de-nodeadkeys"),
            "#! layoutName = de\n#! variantName = nodeadkeys\n38,0x61\n",
        )
        .unwrap();
        // id mismatch
        fs::write(dir.join("fr"), "#! layoutName = be\n38,0x61\n").unwrap();
        // no metadata at all
        fs::write(dir.join("plain"), "38,0x61\n").unwrap();
        // malformed metadata line
        fs::write(dir.join("bad"), "#! layoutName bad\n").unwrap();

        let index = LayoutIndex::new(dir);
        let mut ids: Vec<String> = index.list().unwrap().iter().map(|l| l.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["de-nodeadkeys", "us"]);

        assert_eq!(
            index.find("us").map(|l| l.display_name()),
            Some("English (US)".to_string())
        );
        assert!(index.find("fr").is_none());
    }

    #[test]
    fn test_list_missing_dir() {
        let index = LayoutIndex::new("/nonexistent/keycodes");
        assert!(matches!(index.list(), Err(TableLoadError::NotFound { .. })));
    }
}
