//! Run-level status shared between the analyzer and its observers

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::phase::AnalysisPhase;

/// Point-in-time progress snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisProgress {
    pub phase: AnalysisPhase,
    pub pages_scraped: u32,
    pub sales_found: usize,
    pub products_matched: usize,
    /// Fraction of the run completed, in [0, 1]
    pub percent_complete: f64,
    pub message: String,
}

impl AnalysisProgress {
    pub fn new(phase: AnalysisPhase, percent_complete: f64, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent_complete: percent_complete.clamp(0.0, 1.0),
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Run-level state as seen by observers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStatus {
    pub running: bool,
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: Option<AnalysisProgress>,
}

impl AnalysisStatus {
    /// Status reported when nothing is running
    pub fn idle() -> Self {
        Self::default()
    }
}

/// The guarded "current status" of one analyzer
///
/// At most one status is held at a time. Readers take the read lock, the
/// run lifecycle takes the write lock.
#[derive(Debug, Default)]
pub struct StatusSlot {
    current: RwLock<Option<AnalysisStatus>>,
}

impl StatusSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for a new run
    ///
    /// Returns `None` without touching the held status if a run is already
    /// active. The returned guard clears the slot when dropped.
    pub fn try_begin(&self, run_id: &str, started_at: DateTime<Utc>) -> Option<StatusGuard<'_>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|s| s.running) {
            return None;
        }

        *current = Some(AnalysisStatus {
            running: true,
            run_id: Some(run_id.to_string()),
            started_at: Some(started_at),
            progress: None,
        });
        Some(StatusGuard { slot: self })
    }

    pub fn is_running(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| s.running)
    }

    /// Copy of the held status, if any
    pub fn snapshot(&self) -> Option<AnalysisStatus> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records the latest progress; ignored when no run holds the slot
    pub fn update(&self, progress: AnalysisProgress) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = current.as_mut() {
            status.progress = Some(progress);
        }
    }

    fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Clears its [`StatusSlot`] on drop, including during unwinding
#[derive(Debug)]
pub struct StatusGuard<'a> {
    slot: &'a StatusSlot,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let slot = StatusSlot::new();
        let guard = slot.try_begin("run-1", Utc::now());
        assert!(guard.is_some());
        assert!(slot.is_running());

        assert!(slot.try_begin("run-2", Utc::now()).is_none());
        let held = slot.snapshot().unwrap();
        assert_eq!(held.run_id.as_deref(), Some("run-1"));

        drop(guard);
        assert!(!slot.is_running());
        assert!(slot.snapshot().is_none());
        assert!(slot.try_begin("run-3", Utc::now()).is_some());
    }

    #[test]
    fn test_update_progress() {
        let slot = StatusSlot::new();

        // No run: update is a no-op
        slot.update(AnalysisProgress::new(AnalysisPhase::Scraping, 0.1, "ignored"));
        assert!(slot.snapshot().is_none());

        let _guard = slot.try_begin("run-1", Utc::now()).unwrap();
        slot.update(AnalysisProgress::new(AnalysisPhase::Saving, 0.5, "halfway"));

        let progress = slot.snapshot().unwrap().progress.unwrap();
        assert_eq!(progress.phase, AnalysisPhase::Saving);
        assert_eq!(progress.message, "halfway");
    }

    #[test]
    fn test_guard_clears_on_panic() {
        let slot = StatusSlot::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = slot.try_begin("run-1", Utc::now()).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!slot.is_running());
    }

    #[test]
    fn test_progress_percent_clamped() {
        let progress = AnalysisProgress::new(AnalysisPhase::Complete, 1.5, "done");
        assert_eq!(progress.percent_complete, 1.0);
    }
}
