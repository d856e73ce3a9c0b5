//! Modifier state of a keystroke
//!
//! Bit layout matches the modifier byte of a USB HID boot keyboard report.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held while a key is pressed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Keystate: u8 {
        const LEFT_CTRL = 0x01;
        const LEFT_SHIFT = 0x02;
        const LEFT_ALT = 0x04;
        const LEFT_META = 0x08;
        const RIGHT_CTRL = 0x10;
        const RIGHT_SHIFT = 0x20;
        /// AltGr on most European layouts
        const RIGHT_ALT = 0x40;
        const RIGHT_META = 0x80;
    }
}

impl Keystate {
    /// Modifiers implied by the 1-based keysym column of a keycode record.
    ///
    /// Column 1 is the bare key, 2 shift, 3 AltGr, 4 AltGr+Shift.
    /// The table format carries no modifier semantics of its own, so
    /// layouts with a different column order map incorrectly.
    /// Returns None for columns past the fourth.
    pub fn for_column(column: usize) -> Option<Self> {
        match column {
            1 => Some(Self::empty()),
            2 => Some(Self::LEFT_SHIFT),
            3 => Some(Self::RIGHT_ALT),
            4 => Some(Self::RIGHT_ALT | Self::LEFT_SHIFT),
            _ => None,
        }
    }

    /// Number of modifier keys held
    #[inline]
    pub fn modifier_count(self) -> u32 {
        self.bits().count_ones()
    }

    /// Preference order among candidate keystrokes: fewer modifiers
    /// first, then the smaller mask.
    #[inline]
    pub fn rank(self) -> (u32, u8) {
        (self.modifier_count(), self.bits())
    }
}
