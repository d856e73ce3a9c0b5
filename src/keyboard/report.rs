//! HID keyboard report
//!
//! 16 bytes: modifier byte, reserved byte, one key usage, zero padding.
//! Only a single key is ever pressed per report.

use crate::constants::{REPORT_KEY_OFFSET, REPORT_LEN, REPORT_MODIFIER_OFFSET};
use crate::keyboard::keystate::Keystate;
use std::fmt::{self, Write};

/// One keystroke as written to the gadget device
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HidReport([u8; REPORT_LEN]);

impl HidReport {
    /// Build a report for one key.
    ///
    /// The scancode is truncated to its low byte; standard HID usages fit.
    pub fn new(modifiers: Keystate, scancode: u32) -> Self {
        let mut bytes = [0u8; REPORT_LEN];
        bytes[REPORT_MODIFIER_OFFSET] = modifiers.bits();
        bytes[REPORT_KEY_OFFSET] = scancode as u8;
        Self(bytes)
    }

    pub fn modifiers(&self) -> Keystate {
        Keystate::from_bits_retain(self.0[REPORT_MODIFIER_OFFSET])
    }

    /// Key usage byte
    pub fn key(&self) -> u8 {
        self.0[REPORT_KEY_OFFSET]
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.0
    }

    /// `\x00\x00\x04...` for `echo -e`
    pub fn to_shell_escape(&self) -> String {
        let mut out = String::with_capacity(REPORT_LEN * 4);
        for b in self.0 {
            let _ = write!(out, "\\x{:02X}", b);
        }
        out
    }

    /// `00 00 04 ...` for logs
    pub fn to_spaced_hex(&self) -> String {
        let mut out = String::with_capacity(REPORT_LEN * 3);
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{:02X}", b);
        }
        out
    }
}

impl fmt::Debug for HidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HidReport[{}]", self.to_spaced_hex())
    }
}

impl AsRef<[u8]> for HidReport {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<HidReport> for [u8; REPORT_LEN] {
    fn from(report: HidReport) -> Self {
        report.0
    }
}
