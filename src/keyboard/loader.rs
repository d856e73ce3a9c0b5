//! Table file loading
//!
//! Tables are plain text, one comma-separated record per line.
//! `#` starts a comment. Numbers are decimal or `0x` hex.
//!
//! ```text
//! # keycodes/us
//! #! layoutName = us
//! 38,0x0061,0x0041          # <keycode>,<keysym col1>,<keysym col2>,...
//!
//! # scancodes/default
//! 38,0x04,KEY_A             # <keycode>,<scancode>[,<name>]
//!
//! # keysyms/default
//! a,0x0061,0x0061,LATIN SMALL LETTER A   # <name>,<id>[,<unicode>,<unicode name>]
//! ```
//!
//! Records with an unexpected number of fields are skipped.
//! A field that is not a number fails the whole table.

use crate::constants::{
    COMMENT_CHAR, FIELD_SEPARATOR, KEYCODES_DIR, KEYSYMS_DIR, SCANCODES_DIR,
};
use crate::error::TableLoadError;
use crate::keyboard::tables::{Keycode, Keycodes, Keysym, Keysyms, Scancode, Scancodes, Unicode};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Source of the three tables a layout is built from
pub trait TableSource {
    fn load_keycodes(&self, id: &str) -> Result<Keycodes, TableLoadError>;
    fn load_keysyms(&self, id: &str) -> Result<Keysyms, TableLoadError>;
    fn load_scancodes(&self, id: &str) -> Result<Scancodes, TableLoadError>;
}

/// Table directory on disk
///
/// ```text
/// <root>/keycodes/<layout id>
/// <root>/keysyms/<id>
/// <root>/scancodes/<id>
/// ```
#[derive(Debug, Clone)]
pub struct TableDir {
    root: PathBuf,
}

impl TableDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory scanned by the layout index
    pub fn keycodes_dir(&self) -> PathBuf {
        self.root.join(KEYCODES_DIR)
    }

    fn path_for(&self, kind: &str, id: &str) -> Result<PathBuf, TableLoadError> {
        // ids are bare file names
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(TableLoadError::InvalidId { id: id.to_string() });
        }
        Ok(self.root.join(kind).join(id))
    }

    fn read(&self, kind: &str, id: &str) -> Result<(String, String), TableLoadError> {
        let path = self.path_for(kind, id)?;
        let origin = format!("{}/{}", kind, id);
        if !path.is_file() {
            return Err(TableLoadError::NotFound { origin });
        }
        debug!("Reading table {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|source| TableLoadError::Io {
            origin: origin.clone(),
            source,
        })?;
        Ok((origin, text))
    }
}

impl TableSource for TableDir {
    fn load_keycodes(&self, id: &str) -> Result<Keycodes, TableLoadError> {
        let (origin, text) = self.read(KEYCODES_DIR, id)?;
        let table = parse_keycodes(id, &origin, &text)?;
        info!("Loaded {} keycodes from {}", table.len(), origin);
        Ok(table)
    }

    fn load_keysyms(&self, id: &str) -> Result<Keysyms, TableLoadError> {
        let (origin, text) = self.read(KEYSYMS_DIR, id)?;
        let table = parse_keysyms(id, &origin, &text)?;
        info!("Loaded {} keysyms from {}", table.len(), origin);
        Ok(table)
    }

    fn load_scancodes(&self, id: &str) -> Result<Scancodes, TableLoadError> {
        let (origin, text) = self.read(SCANCODES_DIR, id)?;
        let table = parse_scancodes(id, &origin, &text)?;
        info!("Loaded {} scancodes from {}", table.len(), origin);
        Ok(table)
    }
}

/// Parse a keycode table: `<keycode>,<keysym col1>[,<keysym col2>...]`
pub fn parse_keycodes(name: &str, origin: &str, text: &str) -> Result<Keycodes, TableLoadError> {
    let mut keycodes = Vec::new();
    for (line, fields) in records(text) {
        if fields.len() < 2 {
            debug!("{}:{}: keycode without keysyms, skipped", origin, line);
            continue;
        }
        let id = parse_number(origin, line, fields[0])?;
        let keysyms = fields[1..]
            .iter()
            .map(|f| parse_number(origin, line, f))
            .collect::<Result<Vec<_>, _>>()?;
        keycodes.push(Keycode::new(id, keysyms));
    }
    Ok(Keycodes::new(name, keycodes))
}

/// Parse a scancode table: `<keycode>,<scancode>[,<name>]`
pub fn parse_scancodes(name: &str, origin: &str, text: &str) -> Result<Scancodes, TableLoadError> {
    let mut scancodes = Vec::new();
    for (line, fields) in records(text) {
        if !(2..=3).contains(&fields.len()) {
            debug!("{}:{}: expected 2 or 3 fields, skipped", origin, line);
            continue;
        }
        let keycode = parse_number(origin, line, fields[0])?;
        let id = parse_number(origin, line, fields[1])?;
        scancodes.push(Scancode {
            id,
            name: fields.get(2).filter(|n| !n.is_empty()).map(|n| n.to_string()),
            keycode,
        });
    }
    Ok(Scancodes::new(name, scancodes))
}

/// Parse a keysym table: `<name>,<id>[,<unicode>,<unicode name>]`
pub fn parse_keysyms(name: &str, origin: &str, text: &str) -> Result<Keysyms, TableLoadError> {
    let mut keysyms = Vec::new();
    for (line, fields) in records(text) {
        if fields.len() != 2 && fields.len() != 4 {
            debug!("{}:{}: expected 2 or 4 fields, skipped", origin, line);
            continue;
        }
        let id = parse_number(origin, line, fields[1])?;
        let unicode = if fields.len() == 4 {
            let value = parse_number(origin, line, fields[2])?;
            let character = char::from_u32(value).ok_or_else(|| {
                TableLoadError::InvalidCodePoint {
                    origin: origin.to_string(),
                    line,
                    value,
                }
            })?;
            Some(Unicode {
                character,
                name: fields[3].to_string(),
            })
        } else {
            None
        };
        keysyms.push(Keysym {
            id,
            name: Some(fields[0].to_string()).filter(|n| !n.is_empty()),
            unicode,
        });
    }
    Ok(Keysyms::new(name, keysyms))
}

/// Non-empty records with comments stripped, as (1-based line, trimmed fields)
fn records(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, raw)| {
        let content = match raw.find(COMMENT_CHAR) {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let fields = content.split(FIELD_SEPARATOR).map(str::trim).collect();
        Some((i + 1, fields))
    })
}

/// Decimal or `0x`-prefixed hexadecimal
fn parse_number(origin: &str, line: usize, field: &str) -> Result<u32, TableLoadError> {
    let parsed = match field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => field.parse::<u32>(),
    };
    parsed.map_err(|_| TableLoadError::InvalidNumber {
        origin: origin.to_string(),
        line,
        value: field.to_string(),
    })
}
