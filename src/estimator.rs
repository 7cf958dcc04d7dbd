use crate::geo::distance_meters;
use crate::types::PositionFix;

pub const MPS_TO_KMH: f64 = 3.6;

/// Which speed source to trust.
///
/// `Reported` and `Differenced` match the two strategies found in GPS
/// speedometer frontends: either the platform's instantaneous velocity is
/// used as-is, or speed is derived by differencing consecutive fixes.
/// `PreferReported` combines them with an explicit order: reported speed
/// when present, position differencing otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedPolicy {
    Reported,
    Differenced,
    PreferReported,
}

/// Converts a stream of raw position fixes into speed values in km/h.
///
/// Returns `None` when no speed can be derived this cycle: missing reported
/// speed in `Reported` mode, no previous fix or a non-positive elapsed time
/// in `Differenced` mode, or a negative/NaN result from either source.
pub struct SpeedEstimator {
    policy: SpeedPolicy,
    last_fix: Option<PositionFix>,
}

impl SpeedEstimator {
    pub fn new(policy: SpeedPolicy) -> Self {
        SpeedEstimator {
            policy,
            last_fix: None,
        }
    }

    pub fn policy(&self) -> SpeedPolicy {
        self.policy
    }

    /// Feed one fix, get the current speed in km/h if available.
    ///
    /// `last_fix` is overwritten on every call, success or not, so the next
    /// differencing step always compares against the most recent fix.
    pub fn on_fix(&mut self, fix: &PositionFix) -> Option<f64> {
        let speed = match self.policy {
            SpeedPolicy::Reported => Self::from_reported(fix),
            SpeedPolicy::Differenced => self.from_difference(fix),
            SpeedPolicy::PreferReported => {
                Self::from_reported(fix).or_else(|| self.from_difference(fix))
            }
        };
        self.last_fix = Some(*fix);
        speed.filter(|v| v.is_finite() && *v >= 0.0)
    }

    /// Forget the previous fix. Called when the watch session restarts.
    pub fn reset(&mut self) {
        self.last_fix = None;
    }

    fn from_reported(fix: &PositionFix) -> Option<f64> {
        fix.reported_speed.map(|mps| mps * MPS_TO_KMH)
    }

    fn from_difference(&self, fix: &PositionFix) -> Option<f64> {
        let last = self.last_fix?;
        let elapsed_secs = (fix.timestamp_ms - last.timestamp_ms) as f64 / 1000.0;
        // Out-of-order or duplicate timestamps must never divide
        if elapsed_secs <= 0.0 {
            return None;
        }
        Some(distance_meters(&last, fix) / elapsed_secs * MPS_TO_KMH)
    }
}
