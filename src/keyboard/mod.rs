//! Keyboard model
//!
//! Turns keycode, keysym and scancode tables into a resolved graph
//! and encodes characters as HID reports.
//! - Table parsing and the on-disk table directory
//! - Cross-linking into a keyboard graph
//! - Keystroke selection and report encoding
//! - Layout discovery

pub mod encoder;
pub mod graph;
pub mod keystate;
pub mod layout;
pub mod loader;
pub mod report;
pub mod tables;

pub use encoder::{select_symbol, Encoder};
pub use graph::{KeyboardGraph, ResolutionReport, ResolvedKeycode, Symbol};
pub use keystate::Keystate;
pub use layout::{Layout, LayoutIndex};
pub use loader::{TableDir, TableSource};
pub use report::HidReport;
pub use tables::{Keycode, Keycodes, Keysym, Keysyms, Record, Scancode, Scancodes, Table, Unicode};
