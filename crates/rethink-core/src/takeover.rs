use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use rethink_logging::{LogEvent, Logger};

use crate::history::History;
use crate::prompts::EnginePrompts;
use crate::state::IterationState;

const FIX_PREVIEW_LEN: usize = 60;

/// Single point of truth for "a restart is happening now".
///
/// Takeovers race: several rejecting audits, or an audit and the guardrail,
/// may all decide to restart at once. The compare-and-set on the iteration's
/// takeover flag lets exactly one caller through; everyone else observes
/// "already triggered" and returns as a no-op.
pub(crate) struct TakeoverCoordinator {
    history: Arc<Mutex<History>>,
    restarts: Arc<AtomicU32>,
    original_task: String,
    logger: Arc<Logger>,
}

impl TakeoverCoordinator {
    pub fn new(
        history: Arc<Mutex<History>>,
        restarts: Arc<AtomicU32>,
        original_task: String,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            history,
            restarts,
            original_task,
            logger,
        }
    }

    /// Execute a takeover using the append-only correction strategy.
    ///
    /// The flawed generation is committed to history truncated at the
    /// failure offset, followed by an intervention message carrying the fix
    /// and a verbatim restatement of the original task. Existing history
    /// entries are never edited or removed; in-place slicing would risk
    /// corrupting the fixed preamble and losing context after truncation.
    ///
    /// Returns `true` for the winning caller, `false` for the losers.
    pub async fn request(&self, iteration: &IterationState, offset: usize, fix: &str) -> bool {
        if iteration
            .takeover
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.restarts.fetch_add(1, Ordering::SeqCst);

        // Stops the producer and cooperatively cancels every audit task
        // still in flight for this iteration.
        iteration.cancel.cancel();

        let buffer = iteration.buffer.lock().await.clone();
        let mut history = self.history.lock().await;

        let mut committed_chars = 0;
        if !buffer.is_empty() {
            // Keep only the text before the failure point; offset zero or
            // out of range falls back to the full buffer.
            let committed = if offset > 0 && offset <= buffer.len() {
                &buffer[..offset]
            } else {
                buffer.as_str()
            };
            history.push_assistant(committed);
            committed_chars = committed.len();
        }

        history.push_user(EnginePrompts::build_intervention(fix, &self.original_task));
        drop(history);

        info!(offset, committed_chars, "takeover executed");
        self.logger.log(&LogEvent::TakeoverTriggered {
            offset,
            committed_chars,
            fix_preview: preview(fix),
        });

        true
    }
}

fn preview(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use rethink_logging::LogFormat;
    use rethink_provider::Role;

    fn coordinator(history: Arc<Mutex<History>>, restarts: Arc<AtomicU32>) -> TakeoverCoordinator {
        TakeoverCoordinator::new(
            history,
            restarts,
            "original task".to_string(),
            Arc::new(Logger::new(LogFormat::Json)),
        )
    }

    #[tokio::test]
    async fn test_winner_truncates_buffer_at_offset() {
        let history = Arc::new(Mutex::new(History::seeded("directive", "original task")));
        let restarts = Arc::new(AtomicU32::new(0));
        let coordinator = coordinator(history.clone(), restarts.clone());

        let iteration = IterationState::new();
        *iteration.buffer.lock().await = "good part<idea>bad</idea>".to_string();

        assert!(coordinator.request(&iteration, 9, "the fix").await);
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
        assert!(iteration.cancel.is_cancelled());

        let history = history.lock().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history.messages()[2].role, Role::Assistant);
        assert_eq!(history.messages()[2].content, "good part");
        assert_eq!(history.messages()[3].role, Role::User);
        assert!(history.messages()[3].content.contains("the fix"));
        assert!(history.messages()[3].content.contains("original task"));
    }

    #[tokio::test]
    async fn test_zero_offset_commits_full_buffer() {
        let history = Arc::new(Mutex::new(History::seeded("directive", "original task")));
        let restarts = Arc::new(AtomicU32::new(0));
        let coordinator = coordinator(history.clone(), restarts);

        let iteration = IterationState::new();
        *iteration.buffer.lock().await = "<idea>bad</idea>".to_string();

        coordinator.request(&iteration, 0, "the fix").await;

        let history = history.lock().await;
        assert_eq!(history.messages()[2].content, "<idea>bad</idea>");
    }

    #[tokio::test]
    async fn test_empty_buffer_appends_only_intervention() {
        let history = Arc::new(Mutex::new(History::seeded("directive", "original task")));
        let restarts = Arc::new(AtomicU32::new(0));
        let coordinator = coordinator(history.clone(), restarts);

        let iteration = IterationState::new();
        coordinator.request(&iteration, 0, "the fix").await;

        let history = history.lock().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[2].role, Role::User);
    }

    #[tokio::test]
    async fn test_racing_callers_resolve_to_one_takeover() {
        let history = Arc::new(Mutex::new(History::seeded("directive", "original task")));
        let restarts = Arc::new(AtomicU32::new(0));
        let coordinator = Arc::new(coordinator(history.clone(), restarts.clone()));

        let iteration = IterationState::new();
        *iteration.buffer.lock().await = "text".to_string();

        let mut winners = 0;
        let mut tasks = Vec::new();
        for i in 0..8 {
            let coordinator = coordinator.clone();
            let iteration = iteration.clone();
            tasks.push(tokio::spawn(async move {
                coordinator
                    .request(&iteration, i, &format!("fix {}", i))
                    .await
            }));
        }
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
        // Preamble plus exactly one assistant commit and one intervention
        assert_eq!(history.lock().await.len(), 4);
    }
}
