use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rethink_auditor::{UnitAuditor, NO_FIX_PLACEHOLDER};
use rethink_logging::{LogEvent, Logger};
use rethink_provider::{CompletionSource, Message};

use crate::audits::{spawn_audit, AuditContext};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::History;
use crate::outcome::RunOutcome;
use crate::prompts::EnginePrompts;
use crate::scanner::UnitScanner;
use crate::state::IterationState;
use crate::takeover::TakeoverCoordinator;

const TASK_PREVIEW_LEN: usize = 80;

/// Orchestrates speculative generation with concurrent audits.
///
/// One engine owns one run at a time: a streaming generation feeds the unit
/// scanner, each completed unit is audited in the background, and a rejection
/// rolls the run back through the takeover coordinator until the generation
/// survives every audit or the takeover budget runs out.
pub struct Engine {
    generator: Arc<dyn CompletionSource>,
    auditor: Arc<dyn CompletionSource>,
    config: EngineConfig,
    logger: Arc<Logger>,
    history: Arc<Mutex<History>>,
    restarts: Arc<AtomicU32>,
    task: String,
}

impl Engine {
    pub fn new(
        generator: Arc<dyn CompletionSource>,
        auditor: Arc<dyn CompletionSource>,
        config: EngineConfig,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            auditor,
            config,
            logger,
            history: Arc::new(Mutex::new(History::seeded(
                EnginePrompts::generator_system_prompt(),
                "",
            ))),
            restarts: Arc::new(AtomicU32::new(0)),
            task: String::new(),
        }
    }

    /// The task text of the most recent run.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Read-only copy of the conversation log, for transcript tooling.
    pub async fn transcript(&self) -> Vec<Message> {
        self.history.lock().await.messages().to_vec()
    }

    /// Drive the full generate / audit / takeover loop for one task.
    ///
    /// Returns the tagged outcome; only a generator-side transport failure
    /// surfaces as an error.
    pub async fn run(&mut self, task: &str) -> Result<RunOutcome, EngineError> {
        self.task = task.to_string();
        self.history = Arc::new(Mutex::new(History::seeded(
            EnginePrompts::generator_system_prompt(),
            task,
        )));
        self.restarts = Arc::new(AtomicU32::new(0));

        self.logger.log(&LogEvent::RunStarted {
            task_preview: preview(task),
        });

        let ctx = Arc::new(AuditContext {
            auditor: UnitAuditor::new(self.auditor.clone()),
            task_context: task.to_string(),
            logger: self.logger.clone(),
            restarts: self.restarts.clone(),
        });
        let coordinator = Arc::new(TakeoverCoordinator::new(
            self.history.clone(),
            self.restarts.clone(),
            task.to_string(),
            self.logger.clone(),
        ));

        let mut takeovers: u32 = 0;
        loop {
            let iteration = IterationState::new();
            self.stream_generation(&ctx, &coordinator, &iteration)
                .await?;

            // Audits may still be settling after a stream that ended on its
            // own; a late rejection here still routes through the coordinator.
            if !iteration.takeover_triggered() && iteration.has_outstanding_audits().await {
                self.logger.log(&LogEvent::AwaitingTailAudits);
                iteration.join_audits().await;
            }

            if !iteration.takeover_triggered() {
                self.logger.log(&LogEvent::GenerationClean);
                let answer = match self.history.lock().await.final_answer() {
                    Some(answer) => answer,
                    None => iteration.buffer.lock().await.clone(),
                };
                self.logger.log(&LogEvent::RunCompleted { takeovers });
                return Ok(RunOutcome::Completed { answer, takeovers });
            }

            takeovers += 1;
            if takeovers >= self.config.max_takeovers {
                warn!(takeovers, "takeover budget exhausted");
                self.logger.log(&LogEvent::RetryBudgetExhausted {
                    takeovers,
                    max_takeovers: self.config.max_takeovers,
                });
                return Ok(RunOutcome::RetriesExhausted {
                    takeovers,
                    max_takeovers: self.config.max_takeovers,
                });
            }

            self.logger.log(&LogEvent::IterationRestarted {
                takeovers,
                max_takeovers: self.config.max_takeovers,
                temperature: self.exploration_temperature(),
            });
        }
    }

    /// Consume one streaming generation, dispatching audits as units close.
    async fn stream_generation(
        &self,
        ctx: &Arc<AuditContext>,
        coordinator: &Arc<TakeoverCoordinator>,
        iteration: &Arc<IterationState>,
    ) -> Result<(), EngineError> {
        let temperature = self.exploration_temperature();
        self.logger.log(&LogEvent::GeneratorStarted { temperature });

        let messages = self.history.lock().await.messages().to_vec();
        let mut stream = self.generator.stream_chat(&messages, temperature).await?;
        let mut scanner = UnitScanner::new();

        loop {
            let delta = tokio::select! {
                _ = iteration.cancel.cancelled() => {
                    self.logger.log(&LogEvent::GeneratorInterrupted);
                    return Ok(());
                }
                delta = stream.next() => delta,
            };

            let Some(delta) = delta else {
                break;
            };
            let delta = match delta {
                Ok(delta) => delta,
                Err(e) => {
                    iteration.cancel.cancel();
                    return Err(e.into());
                }
            };

            let units = {
                let mut buffer = iteration.buffer.lock().await;
                buffer.push_str(&delta);
                scanner.scan(&buffer)
            };
            self.logger.log(&LogEvent::StreamDelta { text: delta });

            for unit in units {
                debug!(index = unit.index, start = unit.start, "unit detected");
                let handle = spawn_audit(
                    ctx.clone(),
                    iteration.clone(),
                    coordinator.clone(),
                    unit,
                );
                iteration.handles.lock().await.push(handle);
            }

            if scanner.final_marker().is_some()
                && !iteration.final_marker_seen.swap(true, Ordering::SeqCst)
            {
                self.guardrail(coordinator, iteration).await;
                if iteration.takeover_triggered() {
                    return Ok(());
                }
            }
        }

        // Commit the full response only when no takeover interrupted it
        if !iteration.takeover_triggered() {
            let buffer = iteration.buffer.lock().await.clone();
            if !buffer.is_empty() {
                self.history.lock().await.push_assistant(buffer);
            }
        }

        Ok(())
    }

    /// Terminal-output guardrail.
    ///
    /// Runs once per iteration, on the first appearance of the terminal
    /// marker: blocks until every outstanding audit settles, then either
    /// lets the final answer proceed or discards it and requests the single
    /// takeover of the terminal phase, keyed to the earliest rejection.
    async fn guardrail(
        &self,
        coordinator: &Arc<TakeoverCoordinator>,
        iteration: &Arc<IterationState>,
    ) {
        self.logger.log(&LogEvent::FinalAnswerPending);
        iteration.join_audits().await;

        match iteration.earliest_rejection().await {
            None => {
                info!("all audits passed at the terminal gate");
                self.logger.log(&LogEvent::AuditsClean);
            }
            Some((index, verdict)) => {
                self.logger.log(&LogEvent::FinalAnswerDiscarded { index });
                let fix = verdict
                    .fix
                    .unwrap_or_else(|| NO_FIX_PLACEHOLDER.to_string());
                coordinator
                    .request(iteration, verdict.start_offset, &fix)
                    .await;
            }
        }
    }

    /// Exploration temperature for the next generation.
    ///
    /// Grows with consecutive restarts so a stuck run explores alternative
    /// paths; a single clean validation resets the streak.
    fn exploration_temperature(&self) -> f32 {
        let restarts = self.restarts.load(Ordering::SeqCst);
        let increment = restarts.saturating_sub(1) as f32 * self.config.temperature_step;
        (self.config.base_temperature + increment).min(self.config.max_temperature)
    }
}

fn preview(text: &str) -> String {
    if text.len() <= TASK_PREVIEW_LEN {
        text.to_string()
    } else {
        let mut end = TASK_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
