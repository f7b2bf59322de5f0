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

//! Playback engine for hidcast scripts
//!
//! Executes instructions strictly in source order against one HID sink.
//! The first failing instruction aborts the rest of the script; reports
//! already sent stay sent. The active layout lives on the player, so
//! unrelated players can run in parallel without sharing state.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{PlaybackError, ScriptError};
use crate::hid::{HidSink, KeyReport};
use crate::layout::{KeyRef, Layout, LayoutRegistry, resolve_key_name};
use crate::types::{Instruction, PacingConfig, Script};

pub struct Player<S: HidSink> {
    sink: S,
    layouts: LayoutRegistry,
    active: Layout,
    pacing: PacingConfig,
}

impl<S: HidSink> Player<S> {
    /// Player with the built-in layouts, `us` active, no pacing.
    #[allow(dead_code)]
    pub fn new(sink: S) -> Self {
        Self::with_pacing(sink, PacingConfig::default())
    }

    pub fn with_pacing(sink: S, pacing: PacingConfig) -> Self {
        let layouts = LayoutRegistry::builtin();
        let active = layouts
            .get("us")
            .cloned()
            .unwrap_or_else(crate::layout::us);
        Self {
            sink,
            layouts,
            active,
            pacing,
        }
    }

    /// Recover the sink, e.g. to inspect captured reports.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn pacing_delay(&self) -> Duration {
        let mut rng = rand::rng();
        let base_ms = (self.pacing.keystroke_delay * 1000.0) as u64;
        let jitter_ms = (base_ms as f64 * self.pacing.jitter) as u64;

        if jitter_ms > 0 {
            let variation = rng.random_range(0..=jitter_ms * 2);
            let delay = base_ms.saturating_add(variation).saturating_sub(jitter_ms);
            Duration::from_millis(delay)
        } else {
            Duration::from_millis(base_ms)
        }
    }

    async fn pace(&self) {
        if self.pacing.keystroke_delay > 0.0 {
            sleep(self.pacing_delay()).await;
        }
    }

    /// Press-and-release one key: the press report, then the release.
    fn tap(&mut self, usage: u8, modifiers: u8) -> Result<(), PlaybackError> {
        self.sink.send(KeyReport::single(usage, modifiers))?;
        self.sink.send(KeyReport::RELEASE)?;
        Ok(())
    }

    async fn execute_instruction(&mut self, instruction: &Instruction) -> Result<(), PlaybackError> {
        match instruction {
            Instruction::SetLayout(code) => {
                let layout = self
                    .layouts
                    .get(code)
                    .ok_or_else(|| PlaybackError::UnknownLayout(code.clone()))?;
                self.active = layout.clone();
            }
            Instruction::Press(combo) => {
                let mut modifiers = 0u8;
                let mut usages = Vec::new();

                for name in combo.split_whitespace() {
                    match resolve_key_name(name, &self.active) {
                        Some(KeyRef::Modifier(bit)) => modifiers |= bit,
                        Some(KeyRef::Key(stroke)) => {
                            modifiers |= stroke.modifiers;
                            usages.push(stroke.usage);
                        }
                        None => return Err(PlaybackError::UnknownKey(name.to_string())),
                    }
                }

                // All keys down in one report, then all released
                let chord = KeyReport::chord(modifiers, &usages)
                    .ok_or(PlaybackError::OversizedChord(usages.len()))?;
                self.sink.send(chord)?;
                self.sink.send(KeyReport::RELEASE)?;
                self.pace().await;
            }
            Instruction::Type(text) => {
                for c in text.chars() {
                    let stroke = self.active.keystroke(c).ok_or_else(|| {
                        PlaybackError::UnmappableCharacter(c, self.active.name().to_string())
                    })?;
                    self.tap(stroke.usage, stroke.modifiers)?;
                    self.pace().await;
                }
            }
            Instruction::Delay(ms) => {
                if *ms < 0 {
                    return Err(PlaybackError::InvalidDelay(*ms));
                }
                sleep(Duration::from_millis(*ms as u64)).await;
            }
        }
        Ok(())
    }

    /// Run a script to completion or to its first failing instruction.
    pub async fn execute(&mut self, script: &Script) -> Result<(), ScriptError> {
        for (index, instruction) in script.instructions.iter().enumerate() {
            debug!(position = index + 1, ?instruction, "executing");

            self.execute_instruction(instruction)
                .await
                .map_err(|kind| ScriptError {
                    position: index + 1,
                    kind,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{CaptureSink, MOD_GUI, MOD_SHIFT, usage};

    fn player() -> Player<CaptureSink> {
        Player::new(CaptureSink::default())
    }

    fn script(instructions: Vec<Instruction>) -> Script {
        Script { instructions }
    }

    #[tokio::test]
    async fn type_resolves_case_via_shift() {
        let mut p = player();
        p.execute(&script(vec![Instruction::Type("AB\n".into())]))
            .await
            .unwrap();

        assert_eq!(
            p.into_sink().reports,
            vec![
                KeyReport::single(usage::A, MOD_SHIFT),
                KeyReport::RELEASE,
                KeyReport::single(usage::B, MOD_SHIFT),
                KeyReport::RELEASE,
                KeyReport::single(usage::ENTER, 0),
                KeyReport::RELEASE,
            ]
        );
    }

    #[tokio::test]
    async fn press_emits_one_atomic_chord() {
        let mut p = player();
        p.execute(&script(vec![Instruction::Press("GUI r".into())]))
            .await
            .unwrap();

        assert_eq!(
            p.into_sink().reports,
            vec![
                KeyReport {
                    modifiers: MOD_GUI,
                    keys: [usage::R, 0, 0, 0, 0, 0],
                },
                KeyReport::RELEASE,
            ]
        );
    }

    #[tokio::test]
    async fn negative_delay_fails_and_emits_nothing() {
        let mut p = player();
        let err = p
            .execute(&script(vec![Instruction::Delay(-1)]))
            .await
            .unwrap_err();

        assert_eq!(err.position, 1);
        assert!(matches!(err.kind, PlaybackError::InvalidDelay(-1)));
        assert!(p.into_sink().reports.is_empty());
    }

    #[tokio::test]
    async fn failure_mid_script_keeps_earlier_emission_only() {
        let mut p = player();
        let err = p
            .execute(&script(vec![
                Instruction::Type("ab".into()),
                Instruction::Delay(0),
                Instruction::SetLayout("nope".into()),
                Instruction::Type("cd".into()),
                Instruction::Press("GUI r".into()),
            ]))
            .await
            .unwrap_err();

        assert_eq!(err.position, 3);
        assert!(matches!(err.kind, PlaybackError::UnknownLayout(_)));

        // Only the two characters of instruction 1 made it out
        let reports = p.into_sink().reports;
        assert_eq!(
            reports,
            vec![
                KeyReport::single(usage::A, 0),
                KeyReport::RELEASE,
                KeyReport::single(usage::B, 0),
                KeyReport::RELEASE,
            ]
        );
    }

    #[tokio::test]
    async fn unknown_key_name_aborts() {
        let mut p = player();
        let err = p
            .execute(&script(vec![Instruction::Press("GUI frobnicate".into())]))
            .await
            .unwrap_err();

        assert_eq!(err.position, 1);
        assert!(matches!(err.kind, PlaybackError::UnknownKey(ref name) if name == "frobnicate"));
        assert!(p.into_sink().reports.is_empty());
    }

    #[tokio::test]
    async fn unmappable_character_aborts() {
        let mut p = player();
        let err = p
            .execute(&script(vec![Instruction::Type("héllo".into())]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind,
            PlaybackError::UnmappableCharacter('é', _)
        ));

        // 'h' was emitted before the failure
        assert_eq!(p.into_sink().reports.len(), 2);
    }

    #[tokio::test]
    async fn oversized_chord_is_rejected() {
        let mut p = player();
        let err = p
            .execute(&script(vec![Instruction::Press("a b c d e f g".into())]))
            .await
            .unwrap_err();

        assert!(matches!(err.kind, PlaybackError::OversizedChord(7)));
    }

    #[tokio::test]
    async fn replay_is_deterministic() {
        let s = script(vec![
            Instruction::SetLayout("us".into()),
            Instruction::Press("CTRL ALT t".into()),
            Instruction::Type("echo hi\n".into()),
        ]);

        let mut first = player();
        first.execute(&s).await.unwrap();
        let mut second = player();
        second.execute(&s).await.unwrap();

        let a = first.into_sink().reports;
        let b = second.into_sink().reports;
        assert_eq!(a, b);
        let bytes_a: Vec<u8> = a.iter().flat_map(|r| r.to_boot_bytes()).collect();
        let bytes_b: Vec<u8> = b.iter().flat_map(|r| r.to_boot_bytes()).collect();
        assert_eq!(bytes_a, bytes_b);
    }

    #[tokio::test]
    async fn layout_starts_as_us_without_set_layout() {
        let mut p = player();
        p.execute(&script(vec![Instruction::Type("a".into())]))
            .await
            .unwrap();
        assert_eq!(
            p.into_sink().reports,
            vec![KeyReport::single(usage::A, 0), KeyReport::RELEASE]
        );
    }
}
