//! Analyzer module orchestrating end-to-end runs
//!
//! This module contains:
//! - `orchestrator`: the single-flight [`Analyzer`] state machine
//! - `progress`: a channel-backed progress callback
//! - `types`: options, settings and results

mod orchestrator;
mod progress;
mod types;

pub use orchestrator::{share_storage, Analyzer, SharedStorage};
pub use progress::progress_channel;
pub use types::{AnalysisResult, AnalyzeOptions, AnalyzerSettings, ProgressCallback};
