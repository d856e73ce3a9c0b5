//! Global constants for keybeam
//!
//! Consolidates report layout, timing defaults and table locations
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// HID Report Layout
// ============================================================================

/// Length of one keyboard report written to the gadget device
/// (8-byte boot keyboard report plus vendor padding)
pub const REPORT_LEN: usize = 16;

/// Offset of the modifier byte
pub const REPORT_MODIFIER_OFFSET: usize = 0;

/// Offset of the first (and only) key usage byte
pub const REPORT_KEY_OFFSET: usize = 2;

// ============================================================================
// Write Pipeline Defaults
// ============================================================================

/// Delay between two keystrokes in milliseconds
pub const DEFAULT_CHARACTER_DELAY_MS: u64 = 20;

/// Idle time before the privileged session is closed, in milliseconds
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 2000;

/// HID keyboard gadget device node
pub const DEFAULT_DEVICE_PATH: &str = "/dev/hidg0";

/// Command that opens a privileged, line-oriented shell
pub const DEFAULT_SHELL: &str = "su";

/// Name of the writer worker thread
pub const WRITER_THREAD_NAME: &str = "keybeam-writer";

// ============================================================================
// Table Files
// ============================================================================

/// Subdirectory holding keycode (layout) tables
pub const KEYCODES_DIR: &str = "keycodes";

/// Subdirectory holding keysym tables
pub const KEYSYMS_DIR: &str = "keysyms";

/// Subdirectory holding scancode tables
pub const SCANCODES_DIR: &str = "scancodes";

/// Layout loaded when nothing else is configured
pub const DEFAULT_LAYOUT: &str = "us";

/// Default keysym table
pub const DEFAULT_KEYSYMS: &str = "default";

/// Default scancode table
pub const DEFAULT_SCANCODES: &str = "default";

/// Prefix of layout metadata lines in keycode tables
pub const METADATA_PREFIX: &str = "#!";

/// Start of a comment in table files
pub const COMMENT_CHAR: char = '#';

/// Field separator in table files
pub const FIELD_SEPARATOR: char = ',';
