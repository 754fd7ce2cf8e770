//! crates/bbq_core/src/memory.rs
//!
//! An in-process `SampleStore`. Readings are kept as loosely-typed records so
//! the same malformed-document handling applies as with a real database.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{samples_from_records, NewReading, ReadingRecord, Sample, Session};
use crate::feed::{Change, ChangeFeed};
use crate::ports::{validate_target, PortError, PortResult, SampleStore};

#[derive(Debug, Default)]
struct StoredSession {
    last_update: Option<DateTime<Utc>>,
    food_target: Option<f64>,
    readings: Vec<ReadingRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    feed: ChangeFeed,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw record without touching `last_update`. Lets callers seed
    /// documents the ingestion path would never produce.
    pub fn insert_record(&self, session_id: &str, record: ReadingRecord) -> PortResult<()> {
        self.write()?
            .entry(session_id.to_string())
            .or_default()
            .readings
            .push(record);
        self.feed.publish(Change::Readings(session_id.to_string()));
        Ok(())
    }

    fn write(&self) -> PortResult<std::sync::RwLockWriteGuard<'_, HashMap<String, StoredSession>>> {
        self.sessions
            .write()
            .map_err(|_| PortError::Unexpected("session map lock poisoned".to_string()))
    }

    fn read(&self) -> PortResult<std::sync::RwLockReadGuard<'_, HashMap<String, StoredSession>>> {
        self.sessions
            .read()
            .map_err(|_| PortError::Unexpected("session map lock poisoned".to_string()))
    }
}

fn to_domain(id: &str, stored: &StoredSession) -> Option<Session> {
    Some(Session {
        id: id.to_string(),
        last_update: stored.last_update?,
        food_target: stored.food_target,
    })
}

#[async_trait]
impl SampleStore for InMemoryStore {
    async fn append_reading(
        &self,
        session_id: &str,
        reading: NewReading,
        at: DateTime<Utc>,
    ) -> PortResult<Sample> {
        let sample = reading.at(at);
        {
            let mut sessions = self.write()?;
            let stored = sessions.entry(session_id.to_string()).or_default();
            stored.last_update = Some(at);
            stored.readings.push(sample.into());
        }
        debug!("Appended reading to session {}", session_id);
        self.feed.publish(Change::Meta(session_id.to_string()));
        self.feed.publish(Change::Readings(session_id.to_string()));
        Ok(sample)
    }

    async fn find_session(&self, session_id: &str) -> PortResult<Option<Session>> {
        Ok(self
            .read()?
            .get(session_id)
            .and_then(|stored| to_domain(session_id, stored)))
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .read()?
            .iter()
            .filter_map(|(id, stored)| to_domain(id, stored))
            .collect();
        sessions.sort_by(|a, b| b.last_update.cmp(&a.last_update).then_with(|| b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn update_target(&self, session_id: &str, food_target: f64) -> PortResult<()> {
        validate_target(food_target)?;
        {
            let mut sessions = self.write()?;
            match sessions.get_mut(session_id) {
                Some(stored) if stored.last_update.is_some() => stored.food_target = Some(food_target),
                _ => return Err(PortError::NotFound(format!("Session {} not found", session_id))),
            }
        }
        self.feed.publish(Change::Meta(session_id.to_string()));
        Ok(())
    }

    async fn read_all(&self, session_id: &str) -> PortResult<Vec<Sample>> {
        let records = self
            .read()?
            .get(session_id)
            .map(|stored| stored.readings.clone())
            .unwrap_or_default();
        Ok(samples_from_records(session_id, records))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}
