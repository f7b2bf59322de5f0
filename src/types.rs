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

//! Core types for hidcast script execution

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Selects the character map used by subsequent Type/Press
    SetLayout(String),
    // Whitespace-separated key names, pressed and released as one chord
    Press(String),
    // Literal text; embedded '\n' emits the Enter key
    Type(String),
    // Milliseconds; negative values are rejected at playback time
    Delay(i64),
}

#[derive(Debug)]
pub struct Script {
    pub instructions: Vec<Instruction>,
}

impl Script {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PacingConfig {
    // Base time between keystrokes in seconds
    pub keystroke_delay: f64,
    // Jitter as a fraction (0.0 to 1.0) of the keystroke delay
    pub jitter: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            keystroke_delay: 0.0, // device-speed injection
            jitter: 0.0,
        }
    }
}
