use chrono::{DateTime, Local};
use tokio::time::{interval, Duration};

use crate::status::SharedStatus;

/// Digital clock text, HH:MM:SS in local time.
pub fn format_clock(t: &DateTime<Local>) -> String {
    t.format("%H:%M:%S").to_string()
}

pub fn now_clock() -> String {
    format_clock(&Local::now())
}

/// Updates the shared status clock once per second.
pub async fn clock_loop(status: SharedStatus) {
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        status.write().await.clock = now_clock();
    }
}
