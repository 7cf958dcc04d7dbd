use std::path::PathBuf;
use std::process::Command;

use crate::alarm::Background;

/// Presentation port: where speed, background color and status lines go.
/// Keeps the core state machine testable without a rendering surface.
pub trait DisplayPort: Send {
    fn show_speed(&mut self, text: &str, background: Background);
    fn show_status(&mut self, message: &str);
}

/// Audio port with ensure-playing semantics: repeated `ensure_playing`
/// calls while the alarm is active must never stack playbacks.
pub trait AudioPort: Send {
    fn ensure_playing(&mut self);
    fn stop_and_rewind(&mut self);
}

/// Console rendering of the speed readout and status line.
pub struct ConsoleDisplay;

impl DisplayPort for ConsoleDisplay {
    fn show_speed(&mut self, text: &str, background: Background) {
        let marker = match background {
            Background::Green => "green",
            Background::Red => "RED",
        };
        println!("[speed] {} ({})", text, marker);
    }

    fn show_status(&mut self, message: &str) {
        println!("[status] {}", message);
    }
}

/// Alarm playback through the Termux:API media player.
///
/// The `playing` flag makes `ensure_playing` idempotent; the player itself
/// restarts the file if invoked again, so playback never stacks either way.
pub struct PlayerAudio {
    sound_file: PathBuf,
    playing: bool,
}

impl PlayerAudio {
    pub fn new(sound_file: PathBuf) -> Self {
        PlayerAudio {
            sound_file,
            playing: false,
        }
    }
}

impl AudioPort for PlayerAudio {
    fn ensure_playing(&mut self) {
        if self.playing {
            return;
        }
        match Command::new("termux-media-player")
            .arg("play")
            .arg(&self.sound_file)
            .output()
        {
            Ok(output) if output.status.success() => self.playing = true,
            Ok(output) => log::warn!(
                "alarm playback failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => log::warn!("alarm playback failed: {}", e),
        }
    }

    fn stop_and_rewind(&mut self) {
        if !self.playing {
            return;
        }
        if let Err(e) = Command::new("termux-media-player").arg("stop").output() {
            log::warn!("stopping alarm playback failed: {}", e);
        }
        self.playing = false;
    }
}

/// Silent audio port for simulate mode and environments without a player.
pub struct NullAudio;

impl AudioPort for NullAudio {
    fn ensure_playing(&mut self) {}
    fn stop_and_rewind(&mut self) {}
}

impl AudioPort for Box<dyn AudioPort> {
    fn ensure_playing(&mut self) {
        (**self).ensure_playing()
    }

    fn stop_and_rewind(&mut self) {
        (**self).stop_and_rewind()
    }
}
