// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! USB HID boot-protocol keyboard reports and output sinks
//!
//! The player's only observable effect is a sequence of [`KeyReport`]s
//! written to a [`HidSink`]. A press is a report carrying the key's usage
//! ID (plus modifier bits); a release is the all-zero report.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Modifier bits as laid out in byte 0 of the boot keyboard report.
pub const MOD_CTRL: u8 = 0x01;
pub const MOD_SHIFT: u8 = 0x02;
pub const MOD_ALT: u8 = 0x04;
pub const MOD_GUI: u8 = 0x08;

/// Keyboard usage IDs from the USB HID usage tables (page 0x07).
#[allow(dead_code)]
pub mod usage {
    pub const A: u8 = 0x04;
    pub const B: u8 = 0x05;
    pub const C: u8 = 0x06;
    pub const R: u8 = 0x15;
    pub const N1: u8 = 0x1e;
    pub const N0: u8 = 0x27;
    pub const ENTER: u8 = 0x28;
    pub const ESC: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2a;
    pub const TAB: u8 = 0x2b;
    pub const SPACE: u8 = 0x2c;
    pub const MINUS: u8 = 0x2d;
    pub const EQUAL: u8 = 0x2e;
    pub const LEFT_BRACKET: u8 = 0x2f;
    pub const RIGHT_BRACKET: u8 = 0x30;
    pub const BACKSLASH: u8 = 0x31;
    pub const SEMICOLON: u8 = 0x33;
    pub const QUOTE: u8 = 0x34;
    pub const GRAVE: u8 = 0x35;
    pub const COMMA: u8 = 0x36;
    pub const PERIOD: u8 = 0x37;
    pub const SLASH: u8 = 0x38;
    pub const CAPS_LOCK: u8 = 0x39;
    pub const F1: u8 = 0x3a;
    pub const F2: u8 = 0x3b;
    pub const F3: u8 = 0x3c;
    pub const F4: u8 = 0x3d;
    pub const F5: u8 = 0x3e;
    pub const F6: u8 = 0x3f;
    pub const F7: u8 = 0x40;
    pub const F8: u8 = 0x41;
    pub const F9: u8 = 0x42;
    pub const F10: u8 = 0x43;
    pub const F11: u8 = 0x44;
    pub const F12: u8 = 0x45;
    pub const PRINT_SCREEN: u8 = 0x46;
    pub const SCROLL_LOCK: u8 = 0x47;
    pub const PAUSE: u8 = 0x48;
    pub const INSERT: u8 = 0x49;
    pub const HOME: u8 = 0x4a;
    pub const PAGE_UP: u8 = 0x4b;
    pub const DELETE: u8 = 0x4c;
    pub const END: u8 = 0x4d;
    pub const PAGE_DOWN: u8 = 0x4e;
    pub const RIGHT: u8 = 0x4f;
    pub const LEFT: u8 = 0x50;
    pub const DOWN: u8 = 0x51;
    pub const UP: u8 = 0x52;
    pub const MENU: u8 = 0x65;
}

/// One 8-byte boot keyboard report (modifier byte, reserved byte elided,
/// up to six concurrent usage IDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyReport {
    pub modifiers: u8,
    pub keys: [u8; 6],
}

impl KeyReport {
    /// The all-zero report releasing every key.
    pub const RELEASE: KeyReport = KeyReport {
        modifiers: 0,
        keys: [0; 6],
    };

    /// Report pressing a single key with the given modifier bits.
    pub fn single(usage: u8, modifiers: u8) -> Self {
        let mut keys = [0u8; 6];
        keys[0] = usage;
        Self { modifiers, keys }
    }

    /// Report pressing several keys at once. Returns `None` when more
    /// than six usages are given, the boot protocol's hard limit.
    pub fn chord(modifiers: u8, usages: &[u8]) -> Option<Self> {
        if usages.len() > 6 {
            return None;
        }
        let mut keys = [0u8; 6];
        keys[..usages.len()].copy_from_slice(usages);
        Some(Self { modifiers, keys })
    }

    pub fn is_release(&self) -> bool {
        *self == Self::RELEASE
    }

    /// Serialize to the wire format expected by HID gadget devices:
    /// modifier byte, reserved zero byte, six usage bytes.
    pub fn to_boot_bytes(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0] = self.modifiers;
        buf[2..8].copy_from_slice(&self.keys);
        buf
    }
}

impl fmt::Display for KeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_release() {
            return write!(f, "[release]");
        }
        write!(f, "[mod {:#04x} |", self.modifiers)?;
        for usage in self.keys.iter().filter(|u| **u != 0) {
            write!(f, " {usage:02x}")?;
        }
        write!(f, "]")
    }
}

/// Outbound HID event stream. The player never reads anything back.
pub trait HidSink {
    fn send(&mut self, report: KeyReport) -> io::Result<()>;
}

/// Records every report in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub reports: Vec<KeyReport>,
}

impl HidSink for CaptureSink {
    fn send(&mut self, report: KeyReport) -> io::Result<()> {
        self.reports.push(report);
        Ok(())
    }
}

/// Writes raw boot reports to a Linux USB gadget HID node such as
/// `/dev/hidg0`.
pub struct DeviceSink {
    device: File,
}

impl DeviceSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = File::options().write(true).open(path)?;
        Ok(Self { device })
    }
}

impl HidSink for DeviceSink {
    fn send(&mut self, report: KeyReport) -> io::Result<()> {
        self.device.write_all(&report.to_boot_bytes())?;
        self.device.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_places_usage_first() {
        let report = KeyReport::single(usage::A, MOD_SHIFT);
        assert_eq!(report.modifiers, MOD_SHIFT);
        assert_eq!(report.keys, [usage::A, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn chord_rejects_more_than_six_keys() {
        let too_many = [1u8, 2, 3, 4, 5, 6, 7];
        assert!(KeyReport::chord(0, &too_many).is_none());
        let six = [1u8, 2, 3, 4, 5, 6];
        assert!(KeyReport::chord(0, &six).is_some());
    }

    #[test]
    fn boot_bytes_layout() {
        let report = KeyReport::single(usage::R, MOD_GUI);
        assert_eq!(
            report.to_boot_bytes(),
            [MOD_GUI, 0x00, usage::R, 0, 0, 0, 0, 0]
        );
        assert_eq!(KeyReport::RELEASE.to_boot_bytes(), [0u8; 8]);
    }
}
