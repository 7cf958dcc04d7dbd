use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::alarm::{AlarmState, Background};
use crate::settings::Settings;
use crate::weather::WeatherReport;

/// Snapshot of everything the display surfaces care about. Written to
/// disk every couple of seconds and pushed to the dashboard as-is.
#[derive(Serialize, Deserialize, Clone)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub speed_kmh: Option<f64>,
    pub speed_rounded: Option<i64>,
    pub speed_available: bool,
    pub over_limit: bool,
    pub alarm_state: AlarmState,
    pub background: Background,
    pub status_message: String,
    pub speed_limit_kmh: u32,
    pub geo_timeout_ms: u64,
    pub sound_enabled: bool,
    pub fix_count: u64,
    pub error_count: u64,
    pub uptime_seconds: u64,
    pub clock: String,
    pub weather: Option<WeatherReport>,
}

impl LiveStatus {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timestamp: current_timestamp(),
            speed_kmh: None,
            speed_rounded: None,
            speed_available: false,
            over_limit: false,
            alarm_state: AlarmState::Idle,
            background: Background::Green,
            status_message: String::new(),
            speed_limit_kmh: settings.speed_limit_kmh,
            geo_timeout_ms: settings.geo_timeout_ms,
            sound_enabled: settings.sound_enabled,
            fix_count: 0,
            error_count: 0,
            uptime_seconds: 0,
            clock: String::new(),
            weather: None,
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub type SharedStatus = Arc<RwLock<LiveStatus>>;

pub fn shared(status: LiveStatus) -> SharedStatus {
    Arc::new(RwLock::new(status))
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
