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

//! Error types for parsing and playback
//!
//! Every playback failure is fatal to the script: the player stops at the
//! first failing instruction and reports its position. Nothing is retried
//! and nothing is swallowed.

use thiserror::Error;

/// Failure modes of a single instruction.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// `layout(...)` named an identifier with no registered character map.
    #[error("unknown layout '{0}'")]
    UnknownLayout(String),

    /// A `press(...)` combo contained a name no key resolves to.
    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    /// A typed character has no key in the active layout.
    #[error("character {0:?} has no mapping in layout '{1}'")]
    UnmappableCharacter(char, String),

    /// `delay(...)` was given a negative duration.
    #[error("delay must be non-negative, got {0} ms")]
    InvalidDelay(i64),

    /// A chord named more than the six keys a boot report can carry.
    #[error("chord presses {0} keys, HID reports carry at most 6")]
    OversizedChord(usize),

    /// The HID sink failed to accept a report.
    #[error("HID sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A script aborted at a specific instruction. `position` is 1-based.
#[derive(Debug, Error)]
#[error("script aborted at instruction {position}: {kind}")]
pub struct ScriptError {
    pub position: usize,
    pub kind: PlaybackError,
}

/// A source line that could not be parsed. `line` is 1-based.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}
