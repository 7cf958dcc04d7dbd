use serde::{Deserialize, Serialize};

/// Alarm sound state. `Alarming` means the alarm sound should be playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmState {
    Idle,
    Alarming,
}

/// Background-color signal for the display surface.
/// Red tracks the limit breach alone; sound additionally requires the
/// sound-enabled flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    Green,
    Red,
}

/// What the audio port should do after an evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundCommand {
    /// Keep the alarm playing; a no-op when playback is already running.
    EnsurePlaying,
    /// Stop playback and rewind to the beginning.
    StopAndRewind,
}

/// Outcome of one alarm evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlarmDecision {
    pub rounded_kmh: i64,
    pub over_limit: bool,
    pub background: Background,
    pub sound: SoundCommand,
    /// True exactly on the Idle -> Alarming edge.
    pub entered_alarm: bool,
    /// True exactly on the Alarming -> Idle edge.
    pub left_alarm: bool,
}

/// State machine deciding sound and background color from the current
/// speed, the limit and the sound-enabled flag. No internal timers.
pub struct AlarmController {
    state: AlarmState,
}

impl AlarmController {
    pub fn new() -> Self {
        AlarmController {
            state: AlarmState::Idle,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Evaluate one speed sample.
    ///
    /// An unavailable speed skips the evaluation entirely: no state change,
    /// no background change, no sound command. Otherwise the speed is
    /// rounded to the nearest integer before the inclusive `>=` comparison
    /// against the limit.
    pub fn evaluate(
        &mut self,
        speed_kmh: Option<f64>,
        limit_kmh: u32,
        sound_enabled: bool,
    ) -> Option<AlarmDecision> {
        let speed = speed_kmh?;
        let rounded = speed.round() as i64;
        let over_limit = rounded >= limit_kmh as i64;

        let next = if over_limit && sound_enabled {
            AlarmState::Alarming
        } else {
            AlarmState::Idle
        };
        let entered_alarm = self.state == AlarmState::Idle && next == AlarmState::Alarming;
        let left_alarm = self.state == AlarmState::Alarming && next == AlarmState::Idle;
        self.state = next;

        Some(AlarmDecision {
            rounded_kmh: rounded,
            over_limit,
            background: if over_limit {
                Background::Red
            } else {
                Background::Green
            },
            sound: match next {
                AlarmState::Alarming => SoundCommand::EnsurePlaying,
                AlarmState::Idle => SoundCommand::StopAndRewind,
            },
            entered_alarm,
            left_alarm,
        })
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_boundary_after_rounding() {
        let mut alarm = AlarmController::new();
        // 54.9 rounds to 55, threshold is inclusive
        let d = alarm.evaluate(Some(54.9), 55, true).unwrap();
        assert_eq!(d.rounded_kmh, 55);
        assert!(d.over_limit);
        assert_eq!(d.background, Background::Red);
        assert_eq!(alarm.state(), AlarmState::Alarming);
    }

    #[test]
    fn test_just_below_boundary_stays_idle() {
        let mut alarm = AlarmController::new();
        let d = alarm.evaluate(Some(54.4), 55, true).unwrap();
        assert_eq!(d.rounded_kmh, 54);
        assert!(!d.over_limit);
        assert_eq!(d.background, Background::Green);
        assert_eq!(d.sound, SoundCommand::StopAndRewind);
        assert_eq!(alarm.state(), AlarmState::Idle);
    }

    #[test]
    fn test_over_limit_with_sound_disabled_is_red_but_silent() {
        let mut alarm = AlarmController::new();
        let d = alarm.evaluate(Some(80.0), 55, false).unwrap();
        assert!(d.over_limit);
        assert_eq!(d.background, Background::Red);
        assert_eq!(d.sound, SoundCommand::StopAndRewind);
        assert_eq!(alarm.state(), AlarmState::Idle);
    }

    #[test]
    fn test_sound_toggle_while_over_limit() {
        let mut alarm = AlarmController::new();
        let d = alarm.evaluate(Some(80.0), 55, true).unwrap();
        assert_eq!(d.sound, SoundCommand::EnsurePlaying);

        // Disabling sound on the next evaluation stops playback but keeps
        // the red background
        let d = alarm.evaluate(Some(80.0), 55, false).unwrap();
        assert_eq!(d.sound, SoundCommand::StopAndRewind);
        assert_eq!(d.background, Background::Red);
        assert!(d.left_alarm);

        // Re-enabling starts it again
        let d = alarm.evaluate(Some(80.0), 55, true).unwrap();
        assert_eq!(d.sound, SoundCommand::EnsurePlaying);
        assert!(d.entered_alarm);
    }

    #[test]
    fn test_alarm_edge_fires_once() {
        let mut alarm = AlarmController::new();
        let d = alarm.evaluate(Some(80.0), 55, true).unwrap();
        assert!(d.entered_alarm);

        // Staying over the limit keeps playing but is not a new edge
        let d = alarm.evaluate(Some(82.0), 55, true).unwrap();
        assert!(!d.entered_alarm);
        assert_eq!(d.sound, SoundCommand::EnsurePlaying);

        let d = alarm.evaluate(Some(30.0), 55, true).unwrap();
        assert!(d.left_alarm);
        assert_eq!(d.sound, SoundCommand::StopAndRewind);
    }

    #[test]
    fn test_unavailable_speed_skips_evaluation() {
        let mut alarm = AlarmController::new();
        alarm.evaluate(Some(80.0), 55, true);
        assert_eq!(alarm.state(), AlarmState::Alarming);

        // No decision, no state change
        assert!(alarm.evaluate(None, 55, true).is_none());
        assert_eq!(alarm.state(), AlarmState::Alarming);
    }
}
