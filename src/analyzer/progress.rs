use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::types::ProgressCallback;
use crate::state::AnalysisProgress;

/// A progress callback backed by a bounded channel
///
/// The callback never blocks: when the receiver falls behind, events are
/// dropped. The terminal event of a run can be lost this way, so consumers
/// should also check the run result.
pub fn progress_channel(capacity: usize) -> (ProgressCallback, mpsc::Receiver<AnalysisProgress>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let callback: ProgressCallback = Arc::new(move |progress: &AnalysisProgress| {
        match tx.try_send(progress.clone()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!(phase = %progress.phase, "Progress event dropped");
            }
        }
    });

    (callback, rx)
}
