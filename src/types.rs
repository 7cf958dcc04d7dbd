use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One reported device location sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Instantaneous speed in m/s when the platform reports one.
    pub reported_speed: Option<f64>,
}

/// Geolocation provider errors, classified at the watch boundary.
/// Nothing else crosses it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

impl GeoErrorKind {
    /// Status-surface message for this error kind.
    pub fn status_message(&self) -> &'static str {
        match self {
            GeoErrorKind::PermissionDenied => "Location access was denied by the user.",
            GeoErrorKind::PositionUnavailable => "Location information is unavailable.",
            GeoErrorKind::Timeout => "Timed out waiting for a location fix.",
            GeoErrorKind::Unknown => "An unknown geolocation error occurred.",
        }
    }
}

impl Display for GeoErrorKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.status_message())
    }
}

/// Event stream delivered by a watch session.
#[derive(Clone, Debug)]
pub enum WatchEvent {
    Fix(PositionFix),
    Error(GeoErrorKind),
}
