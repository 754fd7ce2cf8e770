//! crates/bbq_core/src/pipeline/mod.rs
//!
//! The derivation pipeline: raw readings in, display curves and an ETA out.
//! Every function here is pure; callers own all state.

pub mod derive;
pub mod eta;
pub mod rate;
pub mod selector;
pub mod smoother;

pub use derive::{DerivedSeries, SmoothingConfig};
pub use eta::Prediction;
pub use selector::{latest_session, stale_notice, StaleNotice};
