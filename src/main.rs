use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use speedometer_rs::app::{AppEvent, SpeedometerApp};
use speedometer_rs::clock;
use speedometer_rs::dashboard::{start_dashboard, DashboardState};
use speedometer_rs::display::{AudioPort, ConsoleDisplay, DisplayPort, NullAudio, PlayerAudio};
use speedometer_rs::estimator::SpeedPolicy;
use speedometer_rs::location::{SimulatedLocationSource, TermuxLocationSource};
use speedometer_rs::settings::{FileKvStore, Settings, SettingsStore, SETTINGS_KEY};
use speedometer_rs::status::{self, LiveStatus};
use speedometer_rs::types::WatchEvent;
use speedometer_rs::wake_lock::{TermuxWakeLock, UnsupportedWakeLock, WakeLock, WakeLockSession};
use speedometer_rs::watch::{LocationSource, PositionWatchSession, WatchOptions};
use speedometer_rs::weather::{weather_loop, WeatherClient};

#[derive(Parser, Debug)]
#[command(name = "speedometer")]
#[command(about = "GPS vehicle speedometer with speed-limit alarm", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Use the simulated location source instead of termux-location
    #[arg(long)]
    simulate: bool,

    /// Speed source policy (reported, differenced, prefer-reported)
    #[arg(long, default_value = "prefer-reported")]
    policy: String,

    /// Data directory for settings and live status
    #[arg(long, default_value = "speedometer_data")]
    data_dir: PathBuf,

    /// Dashboard port
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Speed limit in km/h used until settings are persisted
    #[arg(long, default_value = "55")]
    default_limit: u32,

    /// Alarm sound file for termux-media-player
    #[arg(long, default_value = "alarm.mp3")]
    sound_file: PathBuf,

    /// Weather widget city (requires --weather-api-key)
    #[arg(long)]
    weather_city: Option<String>,

    /// OpenWeatherMap API key
    #[arg(long)]
    weather_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let policy = parse_policy(&args.policy)?;

    println!("[{}] Speedometer starting", ts_now());
    println!("  Policy: {:?}", policy);
    println!("  Data dir: {:?}", args.data_dir);
    println!("  Dashboard: http://0.0.0.0:{}", args.port);

    std::fs::create_dir_all(&args.data_dir)?;

    let kv = FileKvStore::new(&args.data_dir);
    let settings_path = kv.path_for(SETTINGS_KEY);
    let mut store = SettingsStore::new(kv, Settings::with_default_limit(args.default_limit));
    let settings = store.load();
    // Materialize defaults on first run so the settings file is there to edit
    if !settings_path.exists() {
        store.save(&settings)?;
    }

    let audio: Box<dyn AudioPort> = if args.simulate {
        Box::new(NullAudio)
    } else {
        Box::new(PlayerAudio::new(args.sound_file.clone()))
    };
    let mut app = SpeedometerApp::new(settings, policy, ConsoleDisplay, audio);

    // Location watch session
    let (event_tx, mut event_rx) = mpsc::channel::<WatchEvent>(100);
    let source: Box<dyn LocationSource> = if args.simulate {
        println!("[{}] Using simulated location source", ts_now());
        Box::new(SimulatedLocationSource::default())
    } else if TermuxLocationSource::available() {
        Box::new(TermuxLocationSource::new())
    } else {
        app.set_status("Geolocation is not supported on this device; running simulated.");
        Box::new(SimulatedLocationSource::default())
    };
    let mut session = PositionWatchSession::new(source, event_tx);
    session
        .start(WatchOptions::with_timeout_ms(settings.geo_timeout_ms))
        .await;

    // Wake lock
    let lock: Box<dyn WakeLock> = if !args.simulate && TermuxWakeLock::available() {
        Box::new(TermuxWakeLock::new())
    } else {
        Box::new(UnsupportedWakeLock)
    };
    let mut wake = WakeLockSession::new(lock);
    match wake.acquire() {
        Ok(()) => app.set_status("Screen wake lock acquired"),
        Err(e) => app.set_status(&e.to_string()),
    }

    // Shared status, dashboard and widgets
    let shared = status::shared(LiveStatus::new(&settings));
    let (visibility_tx, mut visibility_rx) = mpsc::channel::<bool>(8);
    let (settings_tx, mut settings_rx) = mpsc::channel::<Settings>(8);
    tokio::spawn(start_dashboard(
        DashboardState {
            status: shared.clone(),
            visibility_tx,
            settings_tx,
        },
        args.port,
    ));
    tokio::spawn(clock::clock_loop(shared.clone()));
    if let (Some(city), Some(key)) = (&args.weather_city, &args.weather_api_key) {
        tokio::spawn(weather_loop(
            WeatherClient::new(city, key),
            shared.clone(),
            Duration::from_secs(600),
        ));
    }

    let start = Utc::now();
    let mut last_status_write = Utc::now();
    let mut settings_mtime = file_mtime(&settings_path);
    let status_path = args.data_dir.join("live_status.json");

    println!("[{}] Watching for position fixes...", ts_now());

    loop {
        if args.duration > 0 {
            let elapsed = Utc::now().signed_duration_since(start);
            if elapsed.num_seconds() as u64 >= args.duration {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
        }

        // Drain watch events
        while let Ok(event) = event_rx.try_recv() {
            let events = match event {
                WatchEvent::Fix(fix) => app.handle_fix(&fix),
                WatchEvent::Error(kind) => app.handle_watch_error(kind),
            };
            for event in &events {
                match event {
                    AppEvent::AlarmStarted { rounded_kmh } => eprintln!(
                        "[ALARM] {} km/h exceeds the {} km/h limit",
                        rounded_kmh,
                        app.settings().speed_limit_kmh
                    ),
                    AppEvent::AlarmStopped => eprintln!("[ALARM] Back under the limit"),
                    AppEvent::WatchError(kind) => log::warn!("geolocation error: {}", kind),
                    _ => {}
                }
            }
        }

        // Page-visibility notifications from the dashboard drive the
        // wake-lock re-acquire
        while let Ok(visible) = visibility_rx.try_recv() {
            if let Some(result) = wake.on_visibility(visible) {
                match result {
                    Ok(()) => app.set_status("Screen wake lock re-acquired"),
                    Err(e) => app.set_status(&e.to_string()),
                }
            }
        }

        // Settings submitted through the dashboard form are only persisted
        // here; the file watcher below picks them up like any other edit
        while let Ok(submitted) = settings_rx.try_recv() {
            if submitted.speed_limit_kmh == 0 || submitted.geo_timeout_ms == 0 {
                log::warn!("ignoring settings with zero limit or timeout");
                continue;
            }
            if let Err(e) = store.save(&submitted) {
                log::warn!("failed to persist settings: {}", e);
            }
        }

        // Hot-reload the settings file when it changes on disk
        let mtime = file_mtime(&settings_path);
        if mtime != settings_mtime {
            settings_mtime = mtime;
            let new_settings = store.load();
            if new_settings != app.settings() {
                println!(
                    "[{}] Settings changed: limit {} km/h, timeout {} ms, sound {}",
                    ts_now(),
                    new_settings.speed_limit_kmh,
                    new_settings.geo_timeout_ms,
                    new_settings.sound_enabled
                );
                if app.apply_settings(new_settings) {
                    session
                        .restart(WatchOptions::with_timeout_ms(new_settings.geo_timeout_ms))
                        .await;
                }
            }
        }

        // Publish live status every 2 seconds
        let now = Utc::now();
        if now.signed_duration_since(last_status_write).num_seconds() >= 2 {
            let uptime = now.signed_duration_since(start).num_seconds().max(0) as u64;
            let snapshot = {
                let mut s = shared.write().await;
                refresh_status(&mut s, &app, uptime);
                s.clone()
            };
            if let Err(e) = snapshot.save(&status_path.to_string_lossy()) {
                log::warn!("failed to write live status: {}", e);
            }
            last_status_write = now;
        }

        sleep(Duration::from_millis(10)).await;
    }

    session.stop().await;
    wake.release();

    println!("\n=== Final Stats ===");
    println!("Fixes processed: {}", app.fix_count());
    println!("Geolocation errors: {}", app.error_count());
    println!("Alarm state at shutdown: {:?}", app.alarm_state());

    Ok(())
}

fn parse_policy(name: &str) -> Result<SpeedPolicy> {
    match name {
        "reported" => Ok(SpeedPolicy::Reported),
        "differenced" => Ok(SpeedPolicy::Differenced),
        "prefer-reported" => Ok(SpeedPolicy::PreferReported),
        other => bail!(
            "unknown policy '{}' (expected reported, differenced or prefer-reported)",
            other
        ),
    }
}

fn refresh_status<D: DisplayPort, A: AudioPort>(
    s: &mut LiveStatus,
    app: &SpeedometerApp<D, A>,
    uptime: u64,
) {
    let settings = app.settings();
    s.timestamp = status::current_timestamp();
    s.speed_kmh = app.last_speed();
    s.speed_available = app.last_speed().is_some();
    s.alarm_state = app.alarm_state();
    s.status_message = app.last_status().to_string();
    s.speed_limit_kmh = settings.speed_limit_kmh;
    s.geo_timeout_ms = settings.geo_timeout_ms;
    s.sound_enabled = settings.sound_enabled;
    s.fix_count = app.fix_count();
    s.error_count = app.error_count();
    s.uptime_seconds = uptime;
    if let Some(d) = app.last_decision() {
        s.speed_rounded = Some(d.rounded_kmh);
        s.over_limit = d.over_limit;
        s.background = d.background;
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
