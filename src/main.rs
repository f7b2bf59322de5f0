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

mod error;
mod hid;
mod layout;
mod parser;
mod playback;
mod pty;
mod types;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::hid::{CaptureSink, DeviceSink, HidSink};
use crate::playback::Player;
use crate::pty::PtySink;
use crate::types::{PacingConfig, Script};

#[derive(Parser)]
#[command(
    name = "hidcast",
    about = "Replay keystroke-injection scripts as USB HID keyboard reports"
)]
struct Cli {
    /// Payload script to play
    script: PathBuf,

    /// Parse the script and exit without emitting anything
    #[arg(long)]
    check: bool,

    /// Write boot reports to a HID gadget device (e.g. /dev/hidg0)
    #[arg(long, value_name = "PATH", conflicts_with = "pty")]
    device: Option<PathBuf>,

    /// Replay into a local shell spawned in a PTY
    #[arg(long)]
    pty: bool,

    /// Shell to spawn in --pty mode
    #[arg(long, default_value = "/bin/sh")]
    shell: String,

    /// PTY columns
    #[arg(long, default_value_t = 80)]
    cols: u16,

    /// PTY rows
    #[arg(long, default_value_t = 24)]
    rows: u16,

    /// Base delay between keystrokes in seconds
    #[arg(long, default_value_t = 0.0)]
    keystroke_delay: f64,

    /// Jitter as a fraction (0.0 to 1.0) of the keystroke delay
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,
}

async fn play<S: HidSink>(sink: S, pacing: PacingConfig, script: &Script) -> Result<S> {
    let mut player = Player::with_pacing(sink, pacing);
    player.execute(script).await?;
    Ok(player.into_sink())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read {}", cli.script.display()))?;
    let script = parser::parse_script(&source)
        .with_context(|| format!("failed to parse {}", cli.script.display()))?;

    if script.is_empty() {
        warn!("script contains no instructions");
    }

    if cli.check {
        println!("{}: {} instructions", cli.script.display(), script.len());
        return Ok(());
    }

    // Cancellation stays outside the player: Ctrl-C restores the terminal
    // and ends the process, it never interrupts a running instruction
    ctrlc::set_handler(|| {
        let _ = crossterm::terminal::disable_raw_mode();
        std::process::exit(130);
    })?;

    let pacing = PacingConfig {
        keystroke_delay: cli.keystroke_delay,
        jitter: cli.jitter,
    };

    if let Some(path) = &cli.device {
        info!(device = %path.display(), "playing to HID gadget");
        let sink = DeviceSink::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        play(sink, pacing, &script).await?;
    } else if cli.pty {
        let sink = PtySink::new(&cli.shell, cli.cols, cli.rows, layout::us())?;
        play(sink, pacing, &script).await?;
    } else {
        // Dry run: list the reports the script would emit
        let sink = play(CaptureSink::default(), pacing, &script).await?;
        for report in &sink.reports {
            println!("{report}");
        }
    }

    Ok(())
}
