//! Error types
//!
//! Loading and resolution fail at the granularity of one layout,
//! encoding per character, device writes per batch.

use std::io;
use thiserror::Error;

/// Failure to read or parse one table file
#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("table not found: {origin}")]
    NotFound { origin: String },

    #[error("invalid table id {id:?}")]
    InvalidId { id: String },

    #[error("failed to read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("{origin}:{line}: invalid number {value:?}")]
    InvalidNumber {
        origin: String,
        line: usize,
        value: String,
    },

    #[error("{origin}:{line}: {value:#x} is not a unicode scalar value")]
    InvalidCodePoint {
        origin: String,
        line: usize,
        value: u32,
    },
}

/// Per-entity problem found while cross-linking tables.
///
/// Never fatal; the affected keycode or column is left out of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionWarning {
    #[error("keycode {keycode} has no scancode")]
    MissingScancode { keycode: u32 },

    #[error("keycode {keycode} column {column}: keysym {keysym:#06x} not found")]
    MissingKeysym {
        keycode: u32,
        column: usize,
        keysym: u32,
    },

    #[error("keycode {keycode} column {column}: no modifier mapping, keysym {keysym:#06x} ignored")]
    UnmappedColumn {
        keycode: u32,
        column: usize,
        keysym: u32,
    },

    #[error("scancode {scancode} references unknown keycode {keycode}")]
    DanglingScancode { scancode: u32, keycode: u32 },

    #[error("scancode {scancode} does not fit in one report byte")]
    WideScancode { scancode: u32 },
}

/// Whole-table resolution failure
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("layout {layout:?}: none of {keycodes} keycodes could be resolved")]
    NoValidKeycodes { layout: String, keycodes: usize },
}

/// Failure to load and resolve a layout into the encoder
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Table(#[from] TableLoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Character encoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("no keyboard layout loaded")]
    NotLoaded,

    #[error("no key produces {0:?}")]
    NoMapping(char),

    #[error("no key produces {character:?} at position {position}")]
    NoMappingAt { position: usize, character: char },
}

/// Privileged session failure
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to start {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("session I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("privileged session exited with code {code}")]
    WriteFailure { code: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_messages() {
        assert_eq!(
            EncodeError::NoMapping('€').to_string(),
            "no key produces '€'"
        );
        assert_eq!(
            EncodeError::NoMappingAt {
                position: 3,
                character: 'x'
            }
            .to_string(),
            "no key produces 'x' at position 3"
        );
    }

    #[test]
    fn test_load_error_is_transparent() {
        let err: LoadError = TableLoadError::NotFound {
            origin: "keycodes/xx".into(),
        }
        .into();
        assert_eq!(err.to_string(), "table not found: keycodes/xx");
    }
}
