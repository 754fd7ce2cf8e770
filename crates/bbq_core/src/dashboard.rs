//! crates/bbq_core/src/dashboard.rs
//!
//! The dashboard controller. It listens to the session's metadata, its reading
//! log and the "latest session" feed, and publishes an immutable
//! `DashboardView` after every notification.

use std::sync::Arc;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::stream::{select_all, BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Sample, Session};
use crate::feed::{watch_latest, watch_readings, watch_session};
use crate::pipeline::{latest_session, stale_notice, DerivedSeries, Prediction, SmoothingConfig, StaleNotice};
use crate::ports::{PortResult, SampleStore};

//=========================================================================================
// View Model
//=========================================================================================

/// The textual summary shown above the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub eta_seconds: Option<f64>,
    pub receding: bool,
    pub done_at: Option<DateTime<Utc>>,
    pub ambient_f: Option<f64>,
    pub food_f: Option<f64>,
}

impl Summary {
    fn new(series: &DerivedSeries, prediction: &Prediction, now: DateTime<Utc>) -> Self {
        Self {
            eta_seconds: prediction.eta_seconds(),
            receding: prediction.is_receding(),
            done_at: prediction.done_at(now),
            ambient_f: series.smoothed_ambient.last().copied(),
            food_f: series.smoothed_food.last().copied(),
        }
    }

    /// Display lines: time left, completion time, ambient and food.
    pub fn lines(&self) -> Vec<String> {
        let time_left = match self.eta_seconds {
            Some(eta) => format!("{:.0} seconds", eta),
            None => "no estimate".to_string(),
        };
        let done_at = match self.done_at {
            Some(at) => at.to_rfc2822(),
            None => "--".to_string(),
        };
        let temp = |t: Option<f64>| match t {
            Some(t) => format!("{:.1}°F", t),
            None => "--".to_string(),
        };
        vec![
            format!("Time left: {}", time_left),
            format!("Done at: {}", done_at),
            format!("Ambient: {}", temp(self.ambient_f)),
            format!("Food: {}", temp(self.food_f)),
        ]
    }
}

/// Everything the rendering layer needs, computed from scratch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub session_id: String,
    pub food_target: Option<f64>,
    pub chart: DerivedSeries,
    pub prediction: Prediction,
    pub summary: Summary,
    /// `summary` rendered for display.
    pub summary_lines: Vec<String>,
    pub stale: Option<StaleNotice>,
    pub computed_at: DateTime<Utc>,
}

//=========================================================================================
// Feed Merge State
//=========================================================================================

enum FeedEvent {
    Session(PortResult<Option<Session>>),
    Readings(PortResult<Vec<Sample>>),
    Latest(PortResult<Option<String>>),
}

/// Latest known state of the three feeds plus the derivation built from it.
struct ViewState {
    session_id: String,
    config: SmoothingConfig,
    session: Option<Session>,
    samples: Vec<Sample>,
    latest: Option<String>,
    derived: DerivedSeries,
    prediction: Prediction,
    seen_session: bool,
    seen_readings: bool,
}

impl ViewState {
    fn new(session_id: String, config: SmoothingConfig) -> Self {
        Self {
            session_id,
            config,
            session: None,
            samples: Vec::new(),
            latest: None,
            derived: DerivedSeries::default(),
            prediction: Prediction::NONE,
            seen_session: false,
            seen_readings: false,
        }
    }

    fn target(&self) -> Option<f64> {
        self.session.as_ref().and_then(|s| s.food_target)
    }

    /// Merges one notification. Returns `false` when nothing changed. Feed
    /// errors leave the previous state in place.
    fn apply(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Session(Ok(session)) => {
                self.session = session;
                self.seen_session = true;
                self.recompute();
            }
            FeedEvent::Readings(Ok(mut samples)) => {
                samples.sort_by_key(|s| s.time);
                self.samples = samples;
                self.seen_readings = true;
                self.recompute();
            }
            FeedEvent::Latest(Ok(latest)) => {
                if self.latest == latest {
                    return false;
                }
                self.latest = latest;
            }
            FeedEvent::Session(Err(e)) | FeedEvent::Readings(Err(e)) | FeedEvent::Latest(Err(e)) => {
                warn!("Dashboard feed error for session {}: {}", self.session_id, e);
                return false;
            }
        }
        true
    }

    fn recompute(&mut self) {
        self.derived = DerivedSeries::compute(&self.samples, &self.config);
        self.prediction = self.derived.predict(self.target());
        debug!(
            "Recomputed session {} over {} readings",
            self.session_id,
            self.derived.len()
        );
    }

    fn is_primed(&self) -> bool {
        self.seen_session && self.seen_readings
    }

    fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let summary = Summary::new(&self.derived, &self.prediction, now);
        DashboardView {
            session_id: self.session_id.clone(),
            food_target: self.target(),
            chart: self.derived.clone(),
            prediction: self.prediction,
            summary_lines: summary.lines(),
            summary,
            stale: stale_notice(&self.session_id, self.latest.as_deref()),
            computed_at: now,
        }
    }
}

//=========================================================================================
// DashboardController
//=========================================================================================

/// Drives the derivation for one session. The store handle is injected; the
/// controller keeps no process-wide state.
#[derive(Clone)]
pub struct DashboardController {
    store: Arc<dyn SampleStore>,
    session_id: String,
    config: SmoothingConfig,
}

impl DashboardController {
    pub fn new(store: Arc<dyn SampleStore>, session_id: impl Into<String>, config: SmoothingConfig) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            config,
        }
    }

    /// A one-shot view. `None` when the session does not exist.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> PortResult<Option<DashboardView>> {
        let Some(session) = self.store.find_session(&self.session_id).await? else {
            return Ok(None);
        };
        let samples = self.store.read_all(&self.session_id).await?;
        let sessions = self.store.list_sessions().await?;

        let mut state = ViewState::new(self.session_id.clone(), self.config);
        state.apply(FeedEvent::Session(Ok(Some(session))));
        state.apply(FeedEvent::Readings(Ok(samples)));
        state.latest = latest_session(sessions.iter().map(|s| (s.id.as_str(), s.last_update)))
            .map(str::to_string);
        Ok(Some(state.view(now)))
    }

    /// A view after every notification on any feed, once both the metadata
    /// and the reading log have been seen. Readings and target changes trigger
    /// a full recompute; a new latest-session id only refreshes the notice.
    pub fn into_views(self) -> BoxStream<'static, DashboardView> {
        let feeds = vec![
            watch_session(self.store.clone(), self.session_id.clone())
                .map(FeedEvent::Session)
                .boxed(),
            watch_readings(self.store.clone(), self.session_id.clone())
                .map(FeedEvent::Readings)
                .boxed(),
            watch_latest(self.store.clone()).map(FeedEvent::Latest).boxed(),
        ];
        let mut events = select_all(feeds);
        let mut state = ViewState::new(self.session_id, self.config);

        Box::pin(stream! {
            while let Some(event) = events.next().await {
                if state.apply(event) && state.is_primed() {
                    yield state.view(Utc::now());
                }
            }
        })
    }
}
