//! crates/bbq_core/src/domain.rs
//!
//! Defines the pure, core data structures for the cook dashboard.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One timestamped observation from the pit controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub ambient_temp_f: f64,
    pub food_temp_f: f64,
    pub duty_pct: f64,
}

impl Sample {
    /// Seconds since the Unix epoch, with millisecond resolution.
    pub fn time_secs(&self) -> f64 {
        self.time.timestamp_millis() as f64 / 1000.0
    }
}

/// One cook run. Created implicitly by the first posted reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub last_update: DateTime<Utc>,
    /// `None` until the user sets a target; no estimate is produced without one.
    pub food_target: Option<f64>,
}

/// The measurement part of an ingested reading. The store stamps the time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub ambient_temp_f: f64,
    pub food_temp_f: f64,
    pub duty_pct: f64,
}

impl NewReading {
    pub fn at(self, time: DateTime<Utc>) -> Sample {
        Sample {
            time,
            ambient_temp_f: self.ambient_temp_f,
            food_temp_f: self.food_temp_f,
            duty_pct: self.duty_pct,
        }
    }
}

//=========================================================================================
// Stored Reading Documents
//=========================================================================================

/// A reading as it sits in the store. Every field may be absent, so a record
/// only becomes a `Sample` once it has been checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub time: Option<DateTime<Utc>>,
    pub ambient_temp_f: Option<f64>,
    pub food_temp_f: Option<f64>,
    pub duty_pct: Option<f64>,
}

/// Why a stored record could not be turned into a `Sample`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` is not a finite number")]
    NotFinite(&'static str),
}

fn finite(value: Option<f64>, field: &'static str) -> Result<f64, RecordError> {
    match value {
        None => Err(RecordError::Missing(field)),
        Some(v) if !v.is_finite() => Err(RecordError::NotFinite(field)),
        Some(v) => Ok(v),
    }
}

impl TryFrom<ReadingRecord> for Sample {
    type Error = RecordError;

    fn try_from(record: ReadingRecord) -> Result<Self, Self::Error> {
        Ok(Sample {
            time: record.time.ok_or(RecordError::Missing("time"))?,
            ambient_temp_f: finite(record.ambient_temp_f, "ambient_temp_f")?,
            food_temp_f: finite(record.food_temp_f, "food_temp_f")?,
            duty_pct: finite(record.duty_pct, "duty_pct")?,
        })
    }
}

impl From<Sample> for ReadingRecord {
    fn from(sample: Sample) -> Self {
        Self {
            time: Some(sample.time),
            ambient_temp_f: Some(sample.ambient_temp_f),
            food_temp_f: Some(sample.food_temp_f),
            duty_pct: Some(sample.duty_pct),
        }
    }
}

/// Converts stored records into the canonical reading log: malformed records
/// are skipped and the rest are sorted ascending by time. The sort is stable,
/// so readings sharing a timestamp keep their arrival order.
pub fn samples_from_records<I>(session_id: &str, records: I) -> Vec<Sample>
where
    I: IntoIterator<Item = ReadingRecord>,
{
    let mut samples: Vec<Sample> = records
        .into_iter()
        .filter_map(|record| match Sample::try_from(record) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Skipping malformed reading in session {}: {}", session_id, e);
                None
            }
        })
        .collect();
    samples.sort_by_key(|s| s.time);
    samples
}
