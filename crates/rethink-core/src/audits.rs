use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use rethink_auditor::{AuditOutcome, AuditVerdict, UnitAuditor};
use rethink_logging::{LogEvent, Logger};

use crate::scanner::Unit;
use crate::state::IterationState;
use crate::takeover::TakeoverCoordinator;

const FIX_PREVIEW_LEN: usize = 80;

/// Shared handles every audit task needs
pub(crate) struct AuditContext {
    pub auditor: UnitAuditor,
    pub task_context: String,
    pub logger: Arc<Logger>,
    pub restarts: Arc<AtomicU32>,
}

/// Spawn one independent audit task for a freshly detected unit.
///
/// The task records a pending verdict, runs the judgment, then records the
/// final verdict exactly once. A rejection discovered before the terminal
/// marker requests a takeover directly (the fast path); after the marker the
/// verdict is left for the guardrail, which owns the single takeover
/// decision of the terminal phase. A task cancelled by someone else's
/// takeover exits without recording anything and without triggering another
/// takeover.
pub(crate) fn spawn_audit(
    ctx: Arc<AuditContext>,
    iteration: Arc<IterationState>,
    coordinator: Arc<TakeoverCoordinator>,
    unit: Unit,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        ctx.logger.log(&LogEvent::AuditStarted { index: unit.index });
        iteration
            .verdicts
            .lock()
            .await
            .insert(unit.index, AuditVerdict::pending(unit.start));

        let outcome = tokio::select! {
            _ = iteration.cancel.cancelled() => {
                debug!(index = unit.index, "audit cancelled before completion");
                return;
            }
            result = ctx.auditor.audit(&ctx.task_context, &unit.body) => result,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // Judge transport failure: the unit ends up neither accepted
                // nor rejected, and the guardrail must not wait on it.
                ctx.logger.log(&LogEvent::AuditErrored {
                    index: unit.index,
                    error: e.to_string(),
                });
                return;
            }
        };

        if iteration.cancel.is_cancelled() {
            return;
        }

        match outcome {
            AuditOutcome::Unparseable { preview } => {
                ctx.logger.log(&LogEvent::AuditUnparseable {
                    index: unit.index,
                    preview,
                });
                iteration
                    .verdicts
                    .lock()
                    .await
                    .insert(unit.index, AuditVerdict::pass(unit.start));
            }
            AuditOutcome::Pass => {
                // A clean validation indicates recovery
                ctx.restarts.store(0, Ordering::SeqCst);
                ctx.logger.log(&LogEvent::AuditPassed { index: unit.index });
                iteration
                    .verdicts
                    .lock()
                    .await
                    .insert(unit.index, AuditVerdict::pass(unit.start));
            }
            AuditOutcome::Fail { fix } => {
                ctx.logger.log(&LogEvent::AuditFailed {
                    index: unit.index,
                    fix_preview: preview_of(&fix),
                });
                iteration
                    .verdicts
                    .lock()
                    .await
                    .insert(unit.index, AuditVerdict::fail(fix.clone(), unit.start));

                if !iteration.final_marker_seen.load(Ordering::SeqCst) {
                    coordinator.request(&iteration, unit.start, &fix).await;
                }
            }
        }
    })
}

fn preview_of(text: &str) -> String {
    if text.len() <= FIX_PREVIEW_LEN {
        text.to_string()
    } else {
        let mut end = FIX_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
