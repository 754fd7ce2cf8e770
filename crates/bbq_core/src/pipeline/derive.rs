//! crates/bbq_core/src/pipeline/derive.rs
//!
//! Runs the full derivation over a reading log.

use serde::{Deserialize, Serialize};

use super::eta::{predict_latest, Prediction};
use super::rate::first_difference;
use super::smoother::smooth;
use crate::domain::Sample;

/// Time constants (seconds) for each smoothed channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    pub ambient_tau_secs: f64,
    pub food_tau_secs: f64,
    pub rate_tau_secs: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            ambient_tau_secs: 20.0,
            food_tau_secs: 100.0,
            rate_tau_secs: 500.0,
        }
    }
}

/// Chart-ready columns, index-aligned to the reading log they came from.
/// All columns have the same length; all are empty iff the log is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    /// Seconds since the Unix epoch.
    pub time: Vec<f64>,
    pub smoothed_ambient: Vec<f64>,
    pub smoothed_food: Vec<f64>,
    /// Smoothed cook rate in °F per minute.
    pub cook_rate: Vec<f64>,
}

impl DerivedSeries {
    /// `samples` must already be sorted ascending by time.
    pub fn compute(samples: &[Sample], config: &SmoothingConfig) -> Self {
        let time: Vec<f64> = samples.iter().map(Sample::time_secs).collect();
        let ambient: Vec<f64> = samples.iter().map(|s| s.ambient_temp_f).collect();
        let food: Vec<f64> = samples.iter().map(|s| s.food_temp_f).collect();

        let smoothed_ambient = smooth(&time, &ambient, config.ambient_tau_secs);
        let smoothed_food = smooth(&time, &food, config.food_tau_secs);

        let raw_rate: Vec<f64> = first_difference(&time, &smoothed_food)
            .into_iter()
            .map(|per_sec| per_sec * 60.0)
            .collect();
        let cook_rate = smooth(&time, &raw_rate, config.rate_tau_secs);

        Self {
            time,
            smoothed_ambient,
            smoothed_food,
            cook_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn predict(&self, food_target: Option<f64>) -> Prediction {
        predict_latest(&self.smoothed_food, &self.cook_rate, food_target)
    }
}
