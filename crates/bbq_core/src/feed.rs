//! crates/bbq_core/src/feed.rs
//!
//! Change notifications and the complete-state feeds built on top of them.
//!
//! Stores publish a lightweight `Change` whenever a session's metadata or its
//! reading log is written. Subscribers never see deltas: every relevant
//! notification triggers a fresh read, and the feed yields the whole current
//! state.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::BoxStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::domain::{Sample, Session};
use crate::pipeline::selector::latest_session;
use crate::ports::{PortResult, SampleStore};

/// What changed in the store, and for which session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// `last_update` or `food_target` was written.
    Meta(String),
    /// A reading was appended.
    Readings(String),
    /// Notifications may have been missed (e.g. the upstream listener
    /// reconnected). Every feed re-reads.
    Resync,
}

impl Change {
    /// Wire form used for cross-process notification payloads, e.g. `meta:42`.
    pub fn encode(&self) -> String {
        match self {
            Change::Meta(id) => format!("meta:{}", id),
            Change::Readings(id) => format!("readings:{}", id),
            Change::Resync => "resync".to_string(),
        }
    }

    pub fn decode(payload: &str) -> Option<Self> {
        if payload == "resync" {
            return Some(Change::Resync);
        }
        let (kind, id) = payload.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "meta" => Some(Change::Meta(id.to_string())),
            "readings" => Some(Change::Readings(id.to_string())),
            _ => None,
        }
    }
}

//=========================================================================================
// ChangeFeed (the in-process fan-out used by every store)
//=========================================================================================

/// Broadcast fan-out of change notifications.
#[derive(Clone, Debug)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

//=========================================================================================
// Complete-State Feeds
//=========================================================================================

/// Waits for the next notification matching `relevant`. Returns `false` once
/// the channel is closed. A lagged receiver and `Change::Resync` always count
/// as relevant: feeds carry full state, so a re-read recovers whatever was
/// skipped.
async fn wait_for<F>(changes: &mut broadcast::Receiver<Change>, relevant: F) -> bool
where
    F: Fn(&Change) -> bool,
{
    loop {
        match changes.recv().await {
            Ok(Change::Resync) => return true,
            Ok(change) if relevant(&change) => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!("Change feed lagged by {} notifications; re-reading", skipped);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

/// The session's metadata record, now and after every metadata change.
pub fn watch_session(
    store: Arc<dyn SampleStore>,
    session_id: String,
) -> BoxStream<'static, PortResult<Option<Session>>> {
    let mut changes = store.changes();
    Box::pin(stream! {
        yield store.find_session(&session_id).await;
        while wait_for(&mut changes, |c| matches!(c, Change::Meta(id) if *id == session_id)).await {
            yield store.find_session(&session_id).await;
        }
    })
}

/// The session's full reading log, now and after every append.
pub fn watch_readings(
    store: Arc<dyn SampleStore>,
    session_id: String,
) -> BoxStream<'static, PortResult<Vec<Sample>>> {
    let mut changes = store.changes();
    Box::pin(stream! {
        yield store.read_all(&session_id).await;
        while wait_for(&mut changes, |c| matches!(c, Change::Readings(id) if *id == session_id)).await {
            yield store.read_all(&session_id).await;
        }
    })
}

/// The id of the most recently updated session, now and after any metadata
/// change in any session.
pub fn watch_latest(store: Arc<dyn SampleStore>) -> BoxStream<'static, PortResult<Option<String>>> {
    let mut changes = store.changes();
    Box::pin(stream! {
        yield latest_id(store.as_ref()).await;
        while wait_for(&mut changes, |c| matches!(c, Change::Meta(_))).await {
            yield latest_id(store.as_ref()).await;
        }
    })
}

async fn latest_id(store: &dyn SampleStore) -> PortResult<Option<String>> {
    let sessions = store.list_sessions().await?;
    Ok(latest_session(
        sessions.iter().map(|s| (s.id.as_str(), s.last_update)),
    )
    .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_payload_round_trips() {
        for change in [Change::Meta("42".into()), Change::Readings("7".into()), Change::Resync] {
            assert_eq!(Change::decode(&change.encode()), Some(change));
        }
    }

    #[test]
    fn bad_payloads_are_ignored() {
        assert_eq!(Change::decode("meta"), None);
        assert_eq!(Change::decode("meta:"), None);
        assert_eq!(Change::decode("target:42"), None);
    }

    #[test]
    fn ids_may_contain_colons() {
        assert_eq!(
            Change::decode("readings:a:b"),
            Some(Change::Readings("a:b".into()))
        );
    }

    #[tokio::test]
    async fn resync_wakes_every_feed() {
        let feed = ChangeFeed::default();
        let mut changes = feed.subscribe();
        feed.publish(Change::Resync);
        assert!(wait_for(&mut changes, |_| false).await);
    }

    #[tokio::test]
    async fn irrelevant_changes_are_skipped_until_close() {
        let feed = ChangeFeed::default();
        let mut changes = feed.subscribe();
        feed.publish(Change::Meta("1".into()));
        drop(feed);
        assert!(!wait_for(&mut changes, |c| matches!(c, Change::Readings(_))).await);
    }
}
