//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SampleStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Writes announce themselves with `pg_notify`; a background `PgListener` feeds
//! those notifications into the adapter's `ChangeFeed`, so every server
//! instance sharing the database sees every change.

use async_trait::async_trait;
use bbq_core::{
    samples_from_records, Change, ChangeFeed, NewReading, PortError, PortResult, ReadingRecord, Sample,
    SampleStore, Session,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPool};
use sqlx::{FromRow, PgConnection};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The Postgres notification channel carrying encoded `Change`s.
pub const CHANGE_CHANNEL: &str = "bbq_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SampleStore` port.
#[derive(Clone)]
pub struct PgSampleStore {
    pool: PgPool,
    feed: ChangeFeed,
}

impl PgSampleStore {
    /// Creates a new `PgSampleStore`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::default(),
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Starts forwarding database notifications into the change feed. Until
    /// this runs, subscribers only ever see their initial state.
    pub async fn listen(&self) -> Result<JoinHandle<()>, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!("Listening for store changes on channel '{}'", CHANGE_CHANNEL);

        let feed = self.feed.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => match Change::decode(notification.payload()) {
                        Some(change) => feed.publish(change),
                        None => warn!("Ignoring malformed change payload: {}", notification.payload()),
                    },
                    Err(e) => {
                        // The listener reconnects on the next `recv`.
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        on_listener_error(&feed, &e);
                    }
                }
            }
        }))
    }
}

/// Notifications sent while the listener was down are lost, so every feed
/// is told to re-read.
fn on_listener_error(feed: &ChangeFeed, e: &sqlx::Error) {
    error!("Change listener error: {:?}", e);
    feed.publish(Change::Resync);
}

async fn notify(conn: &mut PgConnection, change: Change) -> PortResult<()> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(CHANGE_CHANNEL)
        .bind(change.encode())
        .execute(conn)
        .await
        .map_err(unexpected)?;
    Ok(())
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    last_update: DateTime<Utc>,
    food_target: Option<f64>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            last_update: self.last_update,
            food_target: self.food_target,
        }
    }
}

#[derive(FromRow)]
struct ReadingRow {
    time: Option<DateTime<Utc>>,
    ambient_temp_f: Option<f64>,
    food_temp_f: Option<f64>,
    duty_pct: Option<f64>,
}
impl ReadingRow {
    fn to_domain(self) -> ReadingRecord {
        ReadingRecord {
            time: self.time,
            ambient_temp_f: self.ambient_temp_f,
            food_temp_f: self.food_temp_f,
            duty_pct: self.duty_pct,
        }
    }
}

//=========================================================================================
// `SampleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SampleStore for PgSampleStore {
    async fn append_reading(
        &self,
        session_id: &str,
        reading: NewReading,
        at: DateTime<Utc>,
    ) -> PortResult<Sample> {
        let sample = reading.at(at);
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO sessions (id, last_update) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET last_update = EXCLUDED.last_update",
        )
        .bind(session_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO readings (session_id, time, ambient_temp_f, food_temp_f, duty_pct) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session_id)
        .bind(sample.time)
        .bind(sample.ambient_temp_f)
        .bind(sample.food_temp_f)
        .bind(sample.duty_pct)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        // Delivered on commit, together with the rows they announce.
        notify(&mut *tx, Change::Meta(session_id.to_string())).await?;
        notify(&mut *tx, Change::Readings(session_id.to_string())).await?;
        tx.commit().await.map_err(unexpected)?;

        debug!("Appended reading to session {}", session_id);
        Ok(sample)
    }

    async fn find_session(&self, session_id: &str) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, last_update, food_target FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, last_update, food_target FROM sessions ORDER BY last_update DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_target(&self, session_id: &str, food_target: f64) -> PortResult<()> {
        bbq_core::ports::validate_target(food_target)?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let result = sqlx::query("UPDATE sessions SET food_target = $1 WHERE id = $2")
            .bind(food_target)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }

        notify(&mut *tx, Change::Meta(session_id.to_string())).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn read_all(&self, session_id: &str) -> PortResult<Vec<Sample>> {
        let rows = sqlx::query_as::<_, ReadingRow>(
            "SELECT time, ambient_temp_f, food_temp_f, duty_pct FROM readings \
             WHERE session_id = $1 ORDER BY time ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(samples_from_records(
            session_id,
            rows.into_iter().map(ReadingRow::to_domain),
        ))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_errors_trigger_a_resync() {
        let feed = ChangeFeed::default();
        let mut changes = feed.subscribe();
        on_listener_error(&feed, &sqlx::Error::PoolTimedOut);
        assert_eq!(changes.recv().await.unwrap(), Change::Resync);
    }
}
