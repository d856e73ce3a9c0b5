//! HID gadget output
//!
//! Reports reach the gadget node through a privileged shell.
//! - Session abstraction and the default shell launcher
//! - Queued writer with idle session shutdown

pub mod session;
pub mod writer;

pub use session::{PrivilegedSession, SessionLauncher, ShellLauncher, ShellSession};
pub use writer::{DeviceWriter, WriterSettings};
