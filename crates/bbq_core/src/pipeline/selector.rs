//! crates/bbq_core/src/pipeline/selector.rs
//!
//! Picks the live session and flags views of older ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The id with the greatest `last_update`. Ties go to the lexicographically
/// greatest id so every caller agrees on the answer.
pub fn latest_session<'a, I>(sessions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, DateTime<Utc>)>,
{
    sessions
        .into_iter()
        .max_by(|(a_id, a_time), (b_id, b_time)| a_time.cmp(b_time).then_with(|| a_id.cmp(b_id)))
        .map(|(id, _)| id)
}

/// Passive notice that the viewed session is not the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleNotice {
    pub latest_id: String,
    /// Display text, including the link to the latest session.
    pub message: String,
}

/// `None` while the latest id is unknown or equals the viewed id.
pub fn stale_notice(viewing: &str, latest: Option<&str>) -> Option<StaleNotice> {
    match latest {
        Some(latest) if latest != viewing => Some(StaleNotice {
            latest_id: latest.to_string(),
            message: format!(
                "This is not the latest session. Go to latest session: /sessions/{}",
                latest
            ),
        }),
        _ => None,
    }
}
