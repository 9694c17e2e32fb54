use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rethink_auditor::AuditVerdict;

/// Mutable state of a single generation iteration.
///
/// Rebuilt from scratch every time the engine loops back to generating,
/// including after a takeover. Shared between the producer task, the audit
/// tasks and the takeover coordinator; the verdict map and the two flags are
/// the only state touched by more than one task at once.
pub(crate) struct IterationState {
    /// Cumulative text of the current streaming call
    pub buffer: Mutex<String>,
    /// Verdicts keyed by unit index; BTreeMap order gives the
    /// smallest-index tie-break for free
    pub verdicts: Mutex<BTreeMap<usize, AuditVerdict>>,
    /// Handles of all audit tasks spawned this iteration
    pub handles: Mutex<Vec<JoinHandle<()>>>,
    /// Set exactly once by the winning takeover caller
    pub takeover: AtomicBool,
    /// Set when the terminal-output marker first appears in the buffer
    pub final_marker_seen: AtomicBool,
    /// Cooperative cancellation for the producer and every audit task
    pub cancel: CancellationToken,
}

impl IterationState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(String::new()),
            verdicts: Mutex::new(BTreeMap::new()),
            handles: Mutex::new(Vec::new()),
            takeover: AtomicBool::new(false),
            final_marker_seen: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    pub fn takeover_triggered(&self) -> bool {
        self.takeover.load(Ordering::SeqCst)
    }

    pub async fn has_outstanding_audits(&self) -> bool {
        !self.handles.lock().await.is_empty()
    }

    /// Wait for every outstanding audit task to complete or be cancelled.
    pub async fn join_audits(&self) {
        let drained: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in drained {
            let _ = handle.await;
        }
    }

    /// Earliest-discovered rejection, if any.
    ///
    /// Selection is by smallest unit index, never by verdict arrival time,
    /// so the choice is deterministic under any network latency.
    pub async fn earliest_rejection(&self) -> Option<(usize, AuditVerdict)> {
        self.verdicts
            .lock()
            .await
            .iter()
            .find(|(_, verdict)| verdict.is_fail())
            .map(|(index, verdict)| (*index, verdict.clone()))
    }
}
