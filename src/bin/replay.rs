use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use speedometer_rs::alarm::AlarmController;
use speedometer_rs::estimator::{SpeedEstimator, SpeedPolicy};
use speedometer_rs::types::PositionFix;

/// Replay a recorded fix log through the estimator and alarm state machine.
/// Useful for tuning the speed limit and comparing source policies offline.
#[derive(Parser, Debug)]
#[command(name = "replay")]
struct Args {
    /// Path to a JSON array of position fixes
    #[arg(long)]
    log: PathBuf,

    /// Speed limit in km/h
    #[arg(long, default_value = "55")]
    limit: u32,

    /// Speed source policy (reported, differenced, prefer-reported)
    #[arg(long, default_value = "prefer-reported")]
    policy: String,

    /// Evaluate with the alarm sound disabled
    #[arg(long)]
    no_sound: bool,

    /// Print every fix instead of just the summary
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let policy = match args.policy.as_str() {
        "reported" => SpeedPolicy::Reported,
        "differenced" => SpeedPolicy::Differenced,
        _ => SpeedPolicy::PreferReported,
    };

    let content = fs::read_to_string(&args.log)
        .with_context(|| format!("reading fix log {:?}", args.log))?;
    let fixes: Vec<PositionFix> =
        serde_json::from_str(&content).context("fix log must be a JSON array of fixes")?;

    let mut estimator = SpeedEstimator::new(policy);
    let mut alarm = AlarmController::new();

    let mut available = 0u64;
    let mut unavailable = 0u64;
    let mut over_limit_count = 0u64;
    let mut alarm_starts = 0u64;
    let mut max_speed: f64 = 0.0;

    for fix in &fixes {
        let speed = estimator.on_fix(fix);
        match alarm.evaluate(speed, args.limit, !args.no_sound) {
            Some(d) => {
                available += 1;
                max_speed = max_speed.max(speed.unwrap_or(0.0));
                if d.over_limit {
                    over_limit_count += 1;
                }
                if d.entered_alarm {
                    alarm_starts += 1;
                }
                if args.verbose {
                    println!(
                        "t={} {:>4} km/h {}{}",
                        fix.timestamp_ms,
                        d.rounded_kmh,
                        if d.over_limit { "OVER " } else { "ok   " },
                        if d.entered_alarm { "<- alarm" } else { "" },
                    );
                }
            }
            None => {
                unavailable += 1;
                if args.verbose {
                    println!("t={}   -- speed unavailable", fix.timestamp_ms);
                }
            }
        }
    }

    println!("\n=== Replay Summary ===");
    println!("Fixes: {} ({} without speed)", fixes.len(), unavailable);
    println!("Policy: {:?}, limit {} km/h", policy, args.limit);
    println!("Max speed: {:.1} km/h", max_speed);
    println!(
        "Over limit: {}/{} evaluations, {} alarm activation(s)",
        over_limit_count, available, alarm_starts
    );

    Ok(())
}
