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

//! Local PTY emulator sink
//!
//! Spawns a shell in a PTY and feeds it the terminal-byte rendering of
//! each HID press report: control bytes for Ctrl chords, an ESC prefix
//! for Alt, CSI/SS3 sequences for navigation and function keys, plain
//! characters through a host-side layout for everything else. Reports
//! with no terminal encoding (GUI chords and the like) are skipped.

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use std::io::{self, IsTerminal, Read, Write};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::hid::{HidSink, KeyReport, MOD_ALT, MOD_CTRL, MOD_GUI, MOD_SHIFT, usage};
use crate::layout::Layout;

// RAII guard for terminal raw mode - only enables if stdout is a TTY
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn new() -> Result<Self> {
        let enabled = if io::stdout().is_terminal() {
            enable_raw_mode().context("Failed to enable raw mode")?;
            true
        } else {
            false
        };
        Ok(RawModeGuard { enabled })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = disable_raw_mode();
        }
    }
}

/// Escape sequence for keys that are not printable characters.
fn escape_for_usage(u: u8) -> Option<&'static str> {
    Some(match u {
        usage::ENTER => "\r",
        usage::ESC => "\x1b",
        usage::TAB => "\t",
        usage::BACKSPACE => "\x7f",
        usage::F1 => "\x1bOP",
        usage::F2 => "\x1bOQ",
        usage::F3 => "\x1bOR",
        usage::F4 => "\x1bOS",
        usage::F5 => "\x1b[15~",
        usage::F6 => "\x1b[17~",
        usage::F7 => "\x1b[18~",
        usage::F8 => "\x1b[19~",
        usage::F9 => "\x1b[20~",
        usage::F10 => "\x1b[21~",
        usage::F11 => "\x1b[23~",
        usage::F12 => "\x1b[24~",
        usage::UP => "\x1b[A",
        usage::DOWN => "\x1b[B",
        usage::RIGHT => "\x1b[C",
        usage::LEFT => "\x1b[D",
        usage::HOME => "\x1b[H",
        usage::END => "\x1b[F",
        usage::PAGE_UP => "\x1b[5~",
        usage::PAGE_DOWN => "\x1b[6~",
        usage::INSERT => "\x1b[2~",
        usage::DELETE => "\x1b[3~",
        _ => return None,
    })
}

/// Control byte for a Ctrl-chorded character, if one exists.
fn control_byte(c: char) -> Option<char> {
    let c = c.to_ascii_lowercase();
    if c.is_ascii_lowercase() {
        // Ctrl-letter maps to ASCII 1-26
        return char::from_u32((c as u8 - b'a' + 1) as u32);
    }
    match c {
        ' ' => Some('\x00'),
        '[' => Some('\x1b'),
        ']' => Some('\x1d'),
        '\\' => Some('\x1c'),
        _ => None,
    }
}

/// Render a press report as terminal input bytes under the given
/// host-side layout. `None` when the report has no terminal encoding.
pub(crate) fn decode_report(layout: &Layout, report: &KeyReport) -> Option<String> {
    if report.modifiers & MOD_GUI != 0 {
        return None;
    }

    let shifted = report.modifiers & MOD_SHIFT != 0;
    let ctrl = report.modifiers & MOD_CTRL != 0;
    let alt = report.modifiers & MOD_ALT != 0;

    let mut out = String::new();
    for &u in report.keys.iter().filter(|u| **u != 0) {
        let base = if let Some(seq) = escape_for_usage(u) {
            seq.to_string()
        } else {
            layout.char_for(u, shifted)?.to_string()
        };

        if alt {
            out.push('\x1b');
        }

        if ctrl {
            out.push(control_byte(base.chars().next()?)?);
        } else {
            out.push_str(&base);
        }
    }

    if out.is_empty() { None } else { Some(out) }
}

pub struct PtySink {
    writer: Option<Box<dyn Write + Send>>,
    layout: Layout,
    _reader_thread: Option<thread::JoinHandle<()>>,
    _raw_mode_guard: RawModeGuard,
}

impl PtySink {
    pub fn new(shell: &str, cols: u16, rows: u16, layout: Layout) -> Result<Self> {
        // Raw mode must be on before PTY creation so escape sequences
        // pass through unmangled
        let raw_mode_guard = RawModeGuard::new()?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to create PTY")?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.env("TERM", "xterm-256color");

        let _child = pair
            .slave
            .spawn_command(cmd)
            .context("Failed to spawn shell in PTY")?;

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        // Mirror whatever the shell prints back onto our stdout
        let reader_thread = thread::spawn(move || {
            let mut reader = reader;
            let mut stdout = io::stdout();
            let mut buffer = [0u8; 8192];

            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdout.write_all(&buffer[..n]).is_err() {
                            break;
                        }
                        if stdout.flush().is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            writer: Some(writer),
            layout,
            _reader_thread: Some(reader_thread),
            _raw_mode_guard: raw_mode_guard,
        })
    }
}

impl HidSink for PtySink {
    fn send(&mut self, report: KeyReport) -> io::Result<()> {
        if report.is_release() {
            return Ok(());
        }

        let Some(bytes) = decode_report(&self.layout, &report) else {
            debug!(%report, "no terminal encoding, skipping");
            return Ok(());
        };

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("PTY writer has been closed"))?;
        writer.write_all(bytes.as_bytes())?;
        writer.flush()
    }
}

impl Drop for PtySink {
    fn drop(&mut self) {
        // Close writer to signal EOF
        drop(self.writer.take());

        // Wait for reader thread so all shell output is flushed before
        // raw mode is restored
        if let Some(handle) = self._reader_thread.take() {
            let _ = handle.join();
        }

        // Allow time for the parent terminal to respond to any queries
        thread::sleep(Duration::from_millis(100));

        // Drain stdin so query responses don't appear as garbage after exit
        if io::stdin().is_terminal() {
            use crossterm::event::{poll, read};
            while poll(Duration::from_millis(0)).unwrap_or(false) {
                let _ = read();
            }
        }

        // _raw_mode_guard drops here, restoring terminal state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::us;

    #[test]
    fn plain_and_shifted_characters_decode() {
        let layout = us();
        let a = KeyReport::single(usage::A, 0);
        assert_eq!(decode_report(&layout, &a), Some("a".to_string()));
        let upper = KeyReport::single(usage::A, MOD_SHIFT);
        assert_eq!(decode_report(&layout, &upper), Some("A".to_string()));
    }

    #[test]
    fn enter_decodes_to_carriage_return() {
        let layout = us();
        let enter = KeyReport::single(usage::ENTER, 0);
        assert_eq!(decode_report(&layout, &enter), Some("\r".to_string()));
    }

    #[test]
    fn ctrl_chords_decode_to_control_bytes() {
        let layout = us();
        let ctrl_c = KeyReport::single(usage::C, MOD_CTRL);
        assert_eq!(decode_report(&layout, &ctrl_c), Some("\x03".to_string()));
    }

    #[test]
    fn alt_chords_get_an_escape_prefix() {
        let layout = us();
        let alt_b = KeyReport::single(usage::B, MOD_ALT);
        assert_eq!(decode_report(&layout, &alt_b), Some("\x1bb".to_string()));
    }

    #[test]
    fn function_keys_decode_to_ss3_and_csi() {
        let layout = us();
        let f1 = KeyReport::single(usage::F1, 0);
        assert_eq!(decode_report(&layout, &f1), Some("\x1bOP".to_string()));
        let f5 = KeyReport::single(usage::F5, 0);
        assert_eq!(decode_report(&layout, &f5), Some("\x1b[15~".to_string()));
    }

    #[test]
    fn gui_chords_have_no_terminal_encoding() {
        let layout = us();
        let gui_r = KeyReport::single(usage::R, MOD_GUI);
        assert_eq!(decode_report(&layout, &gui_r), None);
    }

    #[test]
    fn releases_and_unmapped_usages_decode_to_nothing() {
        let layout = us();
        assert_eq!(decode_report(&layout, &KeyReport::RELEASE), None);
        let unmapped = KeyReport::single(0xee, 0);
        assert_eq!(decode_report(&layout, &unmapped), None);
    }
}
