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

//! Keyboard layouts: character to usage-ID maps
//!
//! A layout resolves each typed character to a HID usage ID plus the
//! modifier bits needed to produce it (shifted characters reuse the base
//! key's usage with [`MOD_SHIFT`] set, they have no usage of their own).

use std::collections::HashMap;

use crate::hid::{MOD_ALT, MOD_CTRL, MOD_GUI, MOD_SHIFT, usage};

/// A single resolvable keystroke: one usage ID and the modifiers that
/// must be held to produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub usage: u8,
    pub modifiers: u8,
}

#[derive(Debug, Clone)]
pub struct Layout {
    name: String,
    chars: HashMap<char, Keystroke>,
    // (usage, shifted) back to the character, for host-side decoding
    reverse: HashMap<(u8, bool), char>,
}

impl Layout {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chars: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn add(&mut self, c: char, usage: u8, modifiers: u8) {
        self.chars.insert(c, Keystroke { usage, modifiers });
        self.reverse
            .insert((usage, modifiers & MOD_SHIFT != 0), c);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keystroke for a typed character, or `None` when the layout has no
    /// key producing it.
    pub fn keystroke(&self, c: char) -> Option<Keystroke> {
        self.chars.get(&c).copied()
    }

    /// Character produced by a usage ID under this layout, optionally
    /// with shift held.
    pub fn char_for(&self, usage: u8, shifted: bool) -> Option<char> {
        self.reverse.get(&(usage, shifted)).copied()
    }
}

/// The standard US (ANSI) layout.
pub fn us() -> Layout {
    let mut layout = Layout::new("us");

    for (i, c) in ('a'..='z').enumerate() {
        let u = usage::A + i as u8;
        layout.add(c, u, 0);
        layout.add(c.to_ascii_uppercase(), u, MOD_SHIFT);
    }

    // Digit row: usages run 1..9 then 0
    for (i, (plain, shifted)) in "1234567890"
        .chars()
        .zip("!@#$%^&*()".chars())
        .enumerate()
    {
        let u = usage::N1 + i as u8;
        layout.add(plain, u, 0);
        layout.add(shifted, u, MOD_SHIFT);
    }

    let punctuation = [
        ('-', '_', usage::MINUS),
        ('=', '+', usage::EQUAL),
        ('[', '{', usage::LEFT_BRACKET),
        (']', '}', usage::RIGHT_BRACKET),
        ('\\', '|', usage::BACKSLASH),
        (';', ':', usage::SEMICOLON),
        ('\'', '"', usage::QUOTE),
        ('`', '~', usage::GRAVE),
        (',', '<', usage::COMMA),
        ('.', '>', usage::PERIOD),
        ('/', '?', usage::SLASH),
    ];
    for (plain, shifted, u) in punctuation {
        layout.add(plain, u, 0);
        layout.add(shifted, u, MOD_SHIFT);
    }

    layout.add(' ', usage::SPACE, 0);
    layout.add('\t', usage::TAB, 0);
    // Typed newlines are Enter keystrokes, not a line-feed usage
    layout.add('\n', usage::ENTER, 0);
    layout.add('\r', usage::ENTER, 0);

    layout
}

/// Registered layouts, addressed by the identifier `layout(...)` uses.
pub struct LayoutRegistry {
    layouts: HashMap<String, Layout>,
}

impl LayoutRegistry {
    /// Registry preloaded with the built-in layouts.
    pub fn builtin() -> Self {
        let mut registry = Self {
            layouts: HashMap::new(),
        };
        registry.register(us());
        registry
    }

    pub fn register(&mut self, layout: Layout) {
        self.layouts.insert(layout.name().to_string(), layout);
    }

    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }
}

/// What a chord key name resolves to: a modifier bit to hold, or a key
/// to include in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef {
    Modifier(u8),
    Key(Keystroke),
}

/// Resolve one whitespace-separated name from a `press(...)` combo.
///
/// Named keys match case-insensitively; single-character names go
/// through the active layout, so `press("GUI R")` carries shift.
pub fn resolve_key_name(name: &str, layout: &Layout) -> Option<KeyRef> {
    let plain = |usage| Some(KeyRef::Key(Keystroke { usage, modifiers: 0 }));

    match name.to_ascii_uppercase().as_str() {
        "GUI" | "WINDOWS" | "META" | "CMD" | "COMMAND" => Some(KeyRef::Modifier(MOD_GUI)),
        "CTRL" | "CONTROL" => Some(KeyRef::Modifier(MOD_CTRL)),
        "SHIFT" => Some(KeyRef::Modifier(MOD_SHIFT)),
        "ALT" | "OPTION" => Some(KeyRef::Modifier(MOD_ALT)),
        "ENTER" | "RETURN" => plain(usage::ENTER),
        "ESC" | "ESCAPE" => plain(usage::ESC),
        "TAB" => plain(usage::TAB),
        "SPACE" => plain(usage::SPACE),
        "BACKSPACE" | "BS" => plain(usage::BACKSPACE),
        "DELETE" | "DEL" => plain(usage::DELETE),
        "INSERT" | "INS" => plain(usage::INSERT),
        "HOME" => plain(usage::HOME),
        "END" => plain(usage::END),
        "PAGEUP" | "PGUP" => plain(usage::PAGE_UP),
        "PAGEDOWN" | "PGDN" => plain(usage::PAGE_DOWN),
        "UP" | "UPARROW" => plain(usage::UP),
        "DOWN" | "DOWNARROW" => plain(usage::DOWN),
        "LEFT" | "LEFTARROW" => plain(usage::LEFT),
        "RIGHT" | "RIGHTARROW" => plain(usage::RIGHT),
        "CAPSLOCK" => plain(usage::CAPS_LOCK),
        "PRINTSCREEN" => plain(usage::PRINT_SCREEN),
        "SCROLLLOCK" => plain(usage::SCROLL_LOCK),
        "PAUSE" | "BREAK" => plain(usage::PAUSE),
        "MENU" | "APP" => plain(usage::MENU),
        upper => {
            if let Some(n) = upper.strip_prefix('F')
                && let Ok(n) = n.parse::<u8>()
                && (1..=12).contains(&n)
            {
                return plain(usage::F1 + n - 1);
            }

            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => layout.keystroke(c).map(KeyRef::Key),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_resolves_case_via_shift() {
        let layout = us();
        let lower = layout.keystroke('a').unwrap();
        let upper = layout.keystroke('A').unwrap();
        assert_eq!(lower.usage, upper.usage);
        assert_eq!(lower.modifiers, 0);
        assert_eq!(upper.modifiers, MOD_SHIFT);
    }

    #[test]
    fn us_shifted_punctuation_shares_usage() {
        let layout = us();
        assert_eq!(
            layout.keystroke('!').unwrap(),
            Keystroke {
                usage: usage::N1,
                modifiers: MOD_SHIFT
            }
        );
        assert_eq!(layout.keystroke('1').unwrap().usage, usage::N1);
    }

    #[test]
    fn us_newline_is_enter() {
        let layout = us();
        assert_eq!(layout.keystroke('\n').unwrap().usage, usage::ENTER);
        assert_eq!(layout.keystroke('\n').unwrap().modifiers, 0);
    }

    #[test]
    fn reverse_lookup_round_trips() {
        let layout = us();
        assert_eq!(layout.char_for(usage::A, false), Some('a'));
        assert_eq!(layout.char_for(usage::A, true), Some('A'));
        assert_eq!(layout.char_for(usage::N1, true), Some('!'));
        assert_eq!(layout.char_for(0xff, false), None);
    }

    #[test]
    fn key_names_resolve_case_insensitively() {
        let layout = us();
        assert_eq!(
            resolve_key_name("gui", &layout),
            Some(KeyRef::Modifier(MOD_GUI))
        );
        assert_eq!(
            resolve_key_name("GUI", &layout),
            Some(KeyRef::Modifier(MOD_GUI))
        );
        assert_eq!(
            resolve_key_name("enter", &layout),
            Some(KeyRef::Key(Keystroke {
                usage: usage::ENTER,
                modifiers: 0
            }))
        );
    }

    #[test]
    fn single_char_names_go_through_the_layout() {
        let layout = us();
        assert_eq!(
            resolve_key_name("r", &layout),
            Some(KeyRef::Key(Keystroke {
                usage: usage::R,
                modifiers: 0
            }))
        );
        assert_eq!(
            resolve_key_name("R", &layout),
            Some(KeyRef::Key(Keystroke {
                usage: usage::R,
                modifiers: MOD_SHIFT
            }))
        );
    }

    #[test]
    fn function_keys_resolve() {
        let layout = us();
        assert_eq!(
            resolve_key_name("F1", &layout),
            Some(KeyRef::Key(Keystroke {
                usage: usage::F1,
                modifiers: 0
            }))
        );
        assert_eq!(
            resolve_key_name("F12", &layout),
            Some(KeyRef::Key(Keystroke {
                usage: usage::F12,
                modifiers: 0
            }))
        );
        assert_eq!(resolve_key_name("F13", &layout), None);
    }

    #[test]
    fn unknown_names_fail() {
        let layout = us();
        assert_eq!(resolve_key_name("FROBNICATE", &layout), None);
        assert_eq!(resolve_key_name("é", &layout), None);
    }

    #[test]
    fn registry_knows_us() {
        let registry = LayoutRegistry::builtin();
        assert!(registry.get("us").is_some());
        assert!(registry.get("zz").is_none());
    }
}
