// app.rs — application context for the speedometer
//
// Owns the speed estimator, the alarm state machine and the current
// settings snapshot, and pushes every outcome through the display/audio
// ports. Independent of tokio, the location provider and the dashboard:
// feed it watch events and it produces decisions, which makes the whole
// core testable with recorded fixes.

use crate::alarm::{AlarmController, AlarmDecision, AlarmState, SoundCommand};
use crate::display::{AudioPort, DisplayPort};
use crate::estimator::{SpeedEstimator, SpeedPolicy};
use crate::settings::Settings;
use crate::types::{GeoErrorKind, PositionFix};

/// Observable outcomes of one handler call, for logging and the dashboard.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    SpeedUpdated {
        kmh: f64,
        rounded: i64,
        over_limit: bool,
    },
    SpeedUnavailable,
    AlarmStarted {
        rounded_kmh: i64,
    },
    AlarmStopped,
    WatchError(GeoErrorKind),
    SoundToggled {
        enabled: bool,
    },
}

pub struct SpeedometerApp<D: DisplayPort, A: AudioPort> {
    settings: Settings,
    estimator: SpeedEstimator,
    alarm: AlarmController,
    display: D,
    audio: A,
    fix_count: u64,
    error_count: u64,
    last_speed: Option<f64>,
    last_decision: Option<AlarmDecision>,
    last_status: String,
}

impl<D: DisplayPort, A: AudioPort> SpeedometerApp<D, A> {
    pub fn new(settings: Settings, policy: SpeedPolicy, display: D, audio: A) -> Self {
        SpeedometerApp {
            settings,
            estimator: SpeedEstimator::new(policy),
            alarm: AlarmController::new(),
            display,
            audio,
            fix_count: 0,
            error_count: 0,
            last_speed: None,
            last_decision: None,
            last_status: String::new(),
        }
    }

    /// One position fix from the watch session.
    pub fn handle_fix(&mut self, fix: &PositionFix) -> Vec<AppEvent> {
        self.fix_count += 1;
        let mut events = Vec::new();

        let speed = self.estimator.on_fix(fix);
        self.last_speed = speed;
        match self.alarm.evaluate(
            speed,
            self.settings.speed_limit_kmh,
            self.settings.sound_enabled,
        ) {
            Some(decision) => {
                self.display.show_speed(
                    &format!("{} km/h", decision.rounded_kmh),
                    decision.background,
                );
                match decision.sound {
                    SoundCommand::EnsurePlaying => self.audio.ensure_playing(),
                    SoundCommand::StopAndRewind => self.audio.stop_and_rewind(),
                }

                events.push(AppEvent::SpeedUpdated {
                    kmh: speed.unwrap_or(0.0),
                    rounded: decision.rounded_kmh,
                    over_limit: decision.over_limit,
                });
                if decision.entered_alarm {
                    events.push(AppEvent::AlarmStarted {
                        rounded_kmh: decision.rounded_kmh,
                    });
                }
                if decision.left_alarm {
                    events.push(AppEvent::AlarmStopped);
                }
                self.last_decision = Some(decision);
            }
            None => {
                self.set_status("Speed data is unavailable");
                events.push(AppEvent::SpeedUnavailable);
            }
        }
        events
    }

    /// An error forwarded by the watch session.
    pub fn handle_watch_error(&mut self, kind: GeoErrorKind) -> Vec<AppEvent> {
        self.error_count += 1;
        self.set_status(kind.status_message());
        vec![AppEvent::WatchError(kind)]
    }

    /// Swap in new settings. Returns true when the watch session must be
    /// restarted (the geolocation timeout changed); the estimator history
    /// is only discarded in that case, since a restart tears down the
    /// subscription it belongs to.
    pub fn apply_settings(&mut self, new: Settings) -> bool {
        let restart_watch = new.geo_timeout_ms != self.settings.geo_timeout_ms;
        self.settings = new;
        if restart_watch {
            self.estimator.reset();
        }
        restart_watch
    }

    /// Convenience sound toggle (the 🔊 button). Takes effect on the next
    /// alarm evaluation.
    pub fn set_sound_enabled(&mut self, enabled: bool) -> Vec<AppEvent> {
        self.settings.sound_enabled = enabled;
        self.set_status(if enabled {
            "Sound enabled"
        } else {
            "Sound disabled"
        });
        vec![AppEvent::SoundToggled { enabled }]
    }

    pub fn set_status(&mut self, message: &str) {
        self.display.show_status(message);
        self.last_status = message.to_string();
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    /// Speed from the most recent fix, `None` when it was unavailable.
    pub fn last_speed(&self) -> Option<f64> {
        self.last_speed
    }

    /// Outcome of the last successful alarm evaluation.
    pub fn last_decision(&self) -> Option<AlarmDecision> {
        self.last_decision
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    pub fn fix_count(&self) -> u64 {
        self.fix_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Background;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        speeds: Arc<Mutex<Vec<(String, Background)>>>,
        statuses: Arc<Mutex<Vec<String>>>,
    }

    impl DisplayPort for RecordingDisplay {
        fn show_speed(&mut self, text: &str, background: Background) {
            self.speeds
                .lock()
                .unwrap()
                .push((text.to_string(), background));
        }

        fn show_status(&mut self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }
    }

    /// Emulates a real player: records only actual playback transitions,
    /// so stacked playbacks would show up as consecutive "play" entries.
    #[derive(Clone, Default)]
    struct RecordingAudio {
        log: Arc<Mutex<Vec<&'static str>>>,
        playing: Arc<Mutex<bool>>,
    }

    impl AudioPort for RecordingAudio {
        fn ensure_playing(&mut self) {
            let mut playing = self.playing.lock().unwrap();
            if !*playing {
                *playing = true;
                self.log.lock().unwrap().push("play");
            }
        }

        fn stop_and_rewind(&mut self) {
            let mut playing = self.playing.lock().unwrap();
            if *playing {
                *playing = false;
                self.log.lock().unwrap().push("stop");
            }
        }
    }

    fn fix(t_ms: i64, speed_mps: f64) -> PositionFix {
        PositionFix {
            timestamp_ms: t_ms,
            latitude: 37.0,
            longitude: -122.0,
            reported_speed: Some(speed_mps),
        }
    }

    fn make_app() -> (
        SpeedometerApp<RecordingDisplay, RecordingAudio>,
        RecordingDisplay,
        RecordingAudio,
    ) {
        let display = RecordingDisplay::default();
        let audio = RecordingAudio::default();
        let app = SpeedometerApp::new(
            Settings::default(),
            SpeedPolicy::Reported,
            display.clone(),
            audio.clone(),
        );
        (app, display, audio)
    }

    #[test]
    fn test_fix_drives_display_and_alarm() {
        let (mut app, display, audio) = make_app();

        // 20 m/s = 72 km/h, over the default 55 limit
        let events = app.handle_fix(&fix(0, 20.0));
        assert!(events.contains(&AppEvent::AlarmStarted { rounded_kmh: 72 }));
        assert_eq!(app.alarm_state(), AlarmState::Alarming);

        let speeds = display.speeds.lock().unwrap();
        assert_eq!(speeds[0], ("72 km/h".to_string(), Background::Red));
        drop(speeds);

        // Slowing down stops the alarm
        let events = app.handle_fix(&fix(1000, 10.0));
        assert!(events.contains(&AppEvent::AlarmStopped));
        assert_eq!(audio.log.lock().unwrap().as_slice(), &["play", "stop"]);
    }

    #[test]
    fn test_sustained_alarm_never_stacks_playback() {
        let (mut app, _display, audio) = make_app();
        for i in 0..5 {
            app.handle_fix(&fix(i * 1000, 20.0));
        }
        // One playback start for five over-limit evaluations
        assert_eq!(audio.log.lock().unwrap().as_slice(), &["play"]);
    }

    #[test]
    fn test_unavailable_speed_reports_status_and_keeps_state() {
        let (mut app, display, _audio) = make_app();
        app.handle_fix(&fix(0, 20.0));
        assert_eq!(app.alarm_state(), AlarmState::Alarming);

        let events = app.handle_fix(&PositionFix {
            timestamp_ms: 1000,
            latitude: 37.0,
            longitude: -122.0,
            reported_speed: None,
        });
        assert_eq!(events, vec![AppEvent::SpeedUnavailable]);
        assert_eq!(app.alarm_state(), AlarmState::Alarming);
        assert_eq!(
            display.statuses.lock().unwrap().last().unwrap(),
            "Speed data is unavailable"
        );
    }

    #[test]
    fn test_watch_error_maps_to_status_message() {
        let (mut app, display, _audio) = make_app();
        app.handle_watch_error(GeoErrorKind::PermissionDenied);
        assert_eq!(app.error_count(), 1);
        assert_eq!(
            display.statuses.lock().unwrap().last().unwrap(),
            "Location access was denied by the user."
        );
    }

    #[test]
    fn test_apply_settings_restart_only_on_timeout_change() {
        let (mut app, _display, _audio) = make_app();

        let mut s = app.settings();
        s.speed_limit_kmh = 70;
        assert!(!app.apply_settings(s));

        s.geo_timeout_ms = 9000;
        assert!(app.apply_settings(s));
        assert_eq!(app.settings().geo_timeout_ms, 9000);
    }

    #[test]
    fn test_sound_toggle_silences_but_stays_red() {
        let (mut app, display, audio) = make_app();
        app.handle_fix(&fix(0, 20.0));
        assert_eq!(audio.log.lock().unwrap().last(), Some(&"play"));

        app.set_sound_enabled(false);
        app.handle_fix(&fix(1000, 20.0));
        assert_eq!(audio.log.lock().unwrap().last(), Some(&"stop"));
        assert_eq!(
            display.speeds.lock().unwrap().last().unwrap().1,
            Background::Red
        );
    }
}
