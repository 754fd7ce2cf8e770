pub mod db;

pub use db::PgSampleStore;
