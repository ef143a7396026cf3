//! Record-once, replay-with-data browser automation for hotel partner extranets.
//!
//! A capture turns an operator's clicks, typing, selections and navigations
//! into a stored [`models::Recording`]. A replay runs that recording against a
//! fresh browser session, substituting `{{placeholders}}` from run data.

pub mod api;
pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod recording;
pub mod replay;
pub mod store;

pub use engine::{CaptureInfo, RecordingEngine};
pub use error::{AppError, EngineError, EngineResult};
