//! keybeam - Unicode text to USB HID keystrokes
//!
//! Resolves keyboard layout tables into a graph, encodes characters as
//! 16-byte HID reports and writes them to a keyboard gadget device
//! through a privileged shell session.

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod keyboard;

pub use device::{DeviceWriter, WriterSettings};
pub use error::{DeviceError, EncodeError, LoadError, ResolveError, TableLoadError};
pub use keyboard::{Encoder, HidReport, KeyboardGraph, Keystate};
