//! crates/bbq_core/src/pipeline/eta.rs
//!
//! Linear extrapolation of the cook rate to the target temperature.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time remaining until the food reaches its target.
///
/// Only finite estimates are kept: a zero rate (or a zero rate with the food
/// already at target) yields "no estimate". Negative estimates are kept as-is;
/// they mean the temperature is moving away from the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    eta_seconds: Option<f64>,
    eta_is_finite: bool,
}

impl Prediction {
    pub const NONE: Prediction = Prediction {
        eta_seconds: None,
        eta_is_finite: false,
    };

    fn from_seconds(eta: f64) -> Self {
        if eta.is_finite() {
            Self {
                eta_seconds: Some(eta),
                eta_is_finite: true,
            }
        } else {
            Self::NONE
        }
    }

    pub fn eta_seconds(&self) -> Option<f64> {
        self.eta_seconds
    }

    pub fn eta_is_finite(&self) -> bool {
        self.eta_is_finite
    }

    /// The target is behind us: the rate points away from it.
    pub fn is_receding(&self) -> bool {
        matches!(self.eta_seconds, Some(eta) if eta < 0.0)
    }

    /// Projected completion instant, `None` without an estimate or when the
    /// estimate does not fit in a timestamp.
    pub fn done_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let millis = (self.eta_seconds? * 1000.0).round() as i64;
        now.checked_add_signed(Duration::try_milliseconds(millis)?)
    }
}

/// `current` is the latest smoothed temperature, `rate_per_min` the latest
/// smoothed cook rate in degrees per minute.
pub fn predict(current: f64, rate_per_min: f64, target: f64) -> Prediction {
    let delta_minutes = (target - current) / rate_per_min;
    // `+ 0.0` folds -0.0 (on target, falling rate) into 0.0.
    Prediction::from_seconds(delta_minutes * 60.0 + 0.0)
}

/// Predicts from the tails of index-aligned smoothed-food and rate series.
/// Needs at least two points and a target.
pub fn predict_latest(smoothed_food: &[f64], cook_rate: &[f64], target: Option<f64>) -> Prediction {
    match (smoothed_food.last(), cook_rate.last(), target) {
        (Some(&current), Some(&rate), Some(target)) if smoothed_food.len() >= 2 => {
            predict(current, rate, target)
        }
        _ => Prediction::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn linear_extrapolation() {
        let p = predict(100.0, 2.0, 212.0);
        assert_eq!(p.eta_seconds(), Some(3360.0));
        assert!(p.eta_is_finite());
        assert!(!p.is_receding());
    }

    #[test]
    fn zero_rate_is_no_estimate() {
        assert_eq!(predict(100.0, 0.0, 212.0), Prediction::NONE);
        assert_eq!(predict(212.0, 0.0, 212.0), Prediction::NONE);
    }

    #[test]
    fn wrong_direction_is_receding_not_clamped() {
        let p = predict(150.0, -1.0, 200.0);
        assert_eq!(p.eta_seconds(), Some(-3000.0));
        assert!(p.is_receding());
    }

    #[test]
    fn on_target_with_falling_rate_is_plain_zero() {
        let p = predict(200.0, -1.0, 200.0);
        let eta = p.eta_seconds().unwrap();
        assert_eq!(eta, 0.0);
        assert!(eta.is_sign_positive());
        assert!(!p.is_receding());
    }

    #[test]
    fn single_point_has_no_estimate() {
        assert_eq!(predict_latest(&[100.0], &[0.0], Some(200.0)), Prediction::NONE);
        assert_eq!(predict_latest(&[100.0, 101.0], &[1.0, 1.0], None), Prediction::NONE);
    }

    #[test]
    fn done_at_adds_the_estimate() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let p = predict(100.0, 2.0, 212.0);
        assert_eq!(p.done_at(now), Some(Utc.timestamp_opt(4_360, 0).unwrap()));
        assert_eq!(Prediction::NONE.done_at(now), None);
    }

    #[test]
    fn absurd_estimates_have_no_completion_time() {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(predict(0.0, 1e-300, 1.0).done_at(now), None);
    }
}
