//! Keyboard table records
//!
//! Three independent tables make up a layout:
//! - keysyms: symbols a key can produce, optionally with a Unicode character
//! - scancodes: HID usage ids, each tied to one keycode
//! - keycodes: physical key positions, each listing keysyms per shift level
//!
//! Records only reference each other by id. Cross-linking happens once,
//! in [`KeyboardGraph::resolve`](super::graph::KeyboardGraph::resolve).

/// A record addressed by a numeric id, unique within its table
pub trait Record {
    fn id(&self) -> u32;
}

/// Unicode character produced by a keysym
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unicode {
    pub character: char,
    /// Unicode character name, e.g. "LATIN SMALL LETTER A"
    pub name: String,
}

/// Symbol a key can produce
#[derive(Debug, Clone)]
pub struct Keysym {
    pub id: u32,
    pub name: Option<String>,
    /// None for non-printable keysyms (modifiers, function keys)
    pub unicode: Option<Unicode>,
}

impl Keysym {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            unicode: None,
        }
    }

    /// Attach the Unicode character this keysym types
    pub fn with_unicode(mut self, character: char, name: impl Into<String>) -> Self {
        self.unicode = Some(Unicode {
            character,
            name: name.into(),
        });
        self
    }

    pub fn is_printable(&self) -> bool {
        self.unicode.is_some()
    }

    /// Character typed by this keysym, if printable
    pub fn character(&self) -> Option<char> {
        self.unicode.as_ref().map(|u| u.character)
    }

    /// Whether typing this keysym yields `character`
    #[inline]
    pub fn produces(&self, character: char) -> bool {
        self.character() == Some(character)
    }
}

impl Record for Keysym {
    fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for Keysym {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Keysym {}

/// HID usage id of a physical key
#[derive(Debug, Clone)]
pub struct Scancode {
    /// Value placed in the report's key byte
    pub id: u32,
    pub name: Option<String>,
    /// Keycode this scancode belongs to
    pub keycode: u32,
}

impl Scancode {
    pub fn new(id: u32, keycode: u32) -> Self {
        Self {
            id,
            name: None,
            keycode,
        }
    }
}

impl Record for Scancode {
    fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for Scancode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Scancode {}

/// Physical key position within a layout
#[derive(Debug, Clone)]
pub struct Keycode {
    pub id: u32,
    /// Keysym ids by shift level; index 0 is column 1 (unmodified)
    pub keysyms: Vec<u32>,
}

impl Keycode {
    pub fn new(id: u32, keysyms: Vec<u32>) -> Self {
        Self { id, keysyms }
    }
}

impl Record for Keycode {
    fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for Keycode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Keycode {}

/// One loaded table, in file order
#[derive(Debug, Clone)]
pub struct Table<T> {
    /// Table id (the file name it was loaded from)
    name: String,
    records: Vec<T>,
}

impl<T: Record> Table<T> {
    pub fn new(name: impl Into<String>, records: Vec<T>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    /// First record with the given id
    pub fn find(&self, id: u32) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

pub type Keysyms = Table<Keysym>;
pub type Scancodes = Table<Scancode>;
pub type Keycodes = Table<Keycode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_by_id() {
        let a = Keysym::new(0x61, "a").with_unicode('a', "LATIN SMALL LETTER A");
        let other = Keysym::new(0x61, "renamed");
        assert_eq!(a, other);
        assert!(a.produces('a'));
        assert!(!other.is_printable());
    }

    #[test]
    fn test_table_find_first() {
        let table = Scancodes::new(
            "default",
            vec![Scancode::new(4, 38), Scancode::new(5, 56), Scancode::new(4, 99)],
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.find(4).map(|s| s.keycode), Some(38));
        assert!(table.find(6).is_none());
    }
}
