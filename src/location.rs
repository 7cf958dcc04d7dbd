use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::types::{GeoErrorKind, PositionFix, WatchEvent};
use crate::watch::{LocationSource, WatchOptions};

/// Location source backed by the Termux:API `termux-location` command.
///
/// Each watch cycle requests one fresh fix (satisfying maximum_age = 0) and
/// races it against the configured timeout. Provider failures are classified
/// into the four `GeoErrorKind`s before they reach the channel.
pub struct TermuxLocationSource;

#[derive(Deserialize)]
struct TermuxLocation {
    latitude: f64,
    longitude: f64,
    speed: Option<f64>,
}

impl TermuxLocationSource {
    pub fn new() -> Self {
        TermuxLocationSource
    }

    /// Whether the termux-location binary can be spawned at all.
    pub fn available() -> bool {
        std::process::Command::new("termux-location")
            .arg("-h")
            .output()
            .is_ok()
    }

    fn provider_for(opts: &WatchOptions) -> &'static str {
        if opts.high_accuracy {
            "gps"
        } else {
            "network"
        }
    }
}

impl Default for TermuxLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for TermuxLocationSource {
    fn spawn_watch(&self, opts: WatchOptions, tx: Sender<WatchEvent>) -> JoinHandle<()> {
        let provider = Self::provider_for(&opts);
        tokio::spawn(async move {
            let mut fix_count = 0u64;
            loop {
                let event = match request_fix(provider, opts.timeout).await {
                    Ok(fix) => {
                        fix_count += 1;
                        if fix_count % 10 == 0 {
                            eprintln!("[location] {} fixes", fix_count);
                        }
                        WatchEvent::Fix(fix)
                    }
                    Err(kind) => WatchEvent::Error(kind),
                };
                match tx.try_send(event) {
                    Ok(_) => {}
                    Err(TrySendError::Closed(_)) => {
                        eprintln!("[location] Channel closed after {} fixes", fix_count);
                        break;
                    }
                    Err(TrySendError::Full(_)) => {
                        // Channel full, drop this sample
                    }
                }
            }
        })
    }
}

async fn request_fix(provider: &str, timeout: Duration) -> Result<PositionFix, GeoErrorKind> {
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("termux-location")
            .arg("-p")
            .arg(provider)
            .output(),
    )
    .await
    .map_err(|_| GeoErrorKind::Timeout)?
    .map_err(|_| GeoErrorKind::Unknown)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("permission") || stderr.contains("denied") {
            return Err(GeoErrorKind::PermissionDenied);
        }
        return Err(GeoErrorKind::PositionUnavailable);
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_location_output(&text).ok_or(GeoErrorKind::PositionUnavailable)
}

fn parse_location_output(text: &str) -> Option<PositionFix> {
    let loc: TermuxLocation = serde_json::from_str(text.trim()).ok()?;
    Some(PositionFix {
        timestamp_ms: now_ms(),
        latitude: loc.latitude,
        longitude: loc.longitude,
        reported_speed: loc.speed,
    })
}

/// Synthetic location source for bench runs and demos.
///
/// Drives a vehicle along a line of constant latitude with a slowly
/// oscillating speed, so the alarm threshold is crossed and released
/// periodically. Fix positions stay consistent with the generated speed,
/// which keeps the differenced-position policy meaningful.
#[derive(Clone)]
pub struct SimulatedLocationSource {
    pub start_lat: f64,
    pub start_lon: f64,
    pub base_speed_mps: f64,
    pub speed_amplitude_mps: f64,
    pub fix_interval: Duration,
    /// Attach the generated speed to each fix as the platform-reported
    /// value. Disable to exercise the differenced fallback.
    pub report_speed: bool,
}

impl Default for SimulatedLocationSource {
    fn default() -> Self {
        SimulatedLocationSource {
            start_lat: 37.7749,
            start_lon: -122.4194,
            base_speed_mps: 14.0,
            speed_amplitude_mps: 5.0,
            fix_interval: Duration::from_secs(1),
            report_speed: true,
        }
    }
}

const METERS_PER_DEG_LAT: f64 = 111_194.9;

impl LocationSource for SimulatedLocationSource {
    fn spawn_watch(&self, _opts: WatchOptions, tx: Sender<WatchEvent>) -> JoinHandle<()> {
        let sim = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(sim.fix_interval);
            let dt = sim.fix_interval.as_secs_f64();
            let meters_per_deg_lon = METERS_PER_DEG_LAT * sim.start_lat.to_radians().cos();
            let mut lon = sim.start_lon;
            let mut seq = 0u64;

            loop {
                ticker.tick().await;
                let speed_mps =
                    sim.base_speed_mps + (seq as f64 * 0.05).sin() * sim.speed_amplitude_mps;
                lon += speed_mps * dt / meters_per_deg_lon;
                seq += 1;

                let fix = PositionFix {
                    timestamp_ms: now_ms(),
                    latitude: sim.start_lat,
                    longitude: lon,
                    reported_speed: if sim.report_speed {
                        Some(speed_mps)
                    } else {
                        None
                    },
                };
                match tx.try_send(WatchEvent::Fix(fix)) {
                    Ok(_) => {}
                    Err(TrySendError::Closed(_)) => {
                        eprintln!("[location] Channel closed after {} simulated fixes", seq);
                        break;
                    }
                    Err(TrySendError::Full(_)) => {
                        // Channel full, drop this sample
                    }
                }
            }
        })
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_termux_location_json() {
        let json = r#"{
            "latitude": 52.5200,
            "longitude": 13.4050,
            "altitude": 35.0,
            "accuracy": 4.9,
            "bearing": 90.0,
            "speed": 12.5,
            "provider": "gps"
        }"#;
        let fix = parse_location_output(json).unwrap();
        assert!((fix.latitude - 52.52).abs() < 1e-9);
        assert!((fix.longitude - 13.405).abs() < 1e-9);
        assert_eq!(fix.reported_speed, Some(12.5));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_location_output("not json").is_none());
        assert!(parse_location_output("{\"latitude\": 1.0}").is_none());
    }

    #[test]
    fn test_provider_selection_follows_accuracy_flag() {
        let high = WatchOptions::default();
        assert_eq!(TermuxLocationSource::provider_for(&high), "gps");

        let low = WatchOptions {
            high_accuracy: false,
            ..WatchOptions::default()
        };
        assert_eq!(TermuxLocationSource::provider_for(&low), "network");
    }

    #[tokio::test]
    async fn test_simulated_source_produces_consistent_fixes() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let source = SimulatedLocationSource {
            fix_interval: Duration::from_millis(10),
            report_speed: true,
            ..SimulatedLocationSource::default()
        };
        let handle = source.spawn_watch(WatchOptions::default(), tx);

        let mut fixes = Vec::new();
        while fixes.len() < 3 {
            match rx.recv().await {
                Some(WatchEvent::Fix(fix)) => fixes.push(fix),
                Some(WatchEvent::Error(e)) => panic!("unexpected error: {:?}", e),
                None => panic!("channel closed early"),
            }
        }
        handle.abort();

        // Longitude advances monotonically and speeds stay plausible
        assert!(fixes[1].longitude > fixes[0].longitude);
        assert!(fixes[2].longitude > fixes[1].longitude);
        for fix in &fixes {
            let speed = fix.reported_speed.unwrap();
            assert!(speed > 0.0 && speed < 30.0);
        }
    }
}
