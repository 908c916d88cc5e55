//! State module for tracking analysis progress
//!
//! This module provides the run lifecycle state observed by status callers.
//!
//! # Components
//!
//! - `AnalysisPhase`: the phase a run is in (scraping, normalizing, saving, complete, failed)
//! - `AnalysisProgress`: a point-in-time progress snapshot
//! - `StatusSlot`: the single-flight "current status" guarded by a read/write lock

mod phase;
mod status;

// Re-export main types
pub use phase::AnalysisPhase;
pub use status::{AnalysisProgress, AnalysisStatus, StatusGuard, StatusSlot};
