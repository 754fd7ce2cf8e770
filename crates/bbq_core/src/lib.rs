pub mod dashboard;
pub mod domain;
pub mod feed;
pub mod memory;
pub mod pipeline;
pub mod ports;

pub use dashboard::{DashboardController, DashboardView, Summary};
pub use domain::{samples_from_records, NewReading, ReadingRecord, RecordError, Sample, Session};
pub use feed::{watch_latest, watch_readings, watch_session, Change, ChangeFeed};
pub use memory::InMemoryStore;
pub use pipeline::{DerivedSeries, Prediction, SmoothingConfig, StaleNotice};
pub use ports::{PortError, PortResult, SampleStore};
