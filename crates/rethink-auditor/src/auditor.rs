use std::sync::Arc;

use tracing::debug;

use rethink_provider::{CompletionSource, ProviderError};

use crate::{AuditJudgment, AuditorPrompts};

/// Audits run cold regardless of the generator's exploration temperature.
pub const AUDIT_TEMPERATURE: f32 = 0.1;

const PREVIEW_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Auditor call failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Outcome of a single audit call, after fail-open normalization
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Pass,
    Fail { fix: String },
    /// Reply carried no parseable status marker; counts as a pass.
    Unparseable { preview: String },
}

/// Runs one independent judgment per unit against the auditor model.
pub struct UnitAuditor {
    source: Arc<dyn CompletionSource>,
}

impl UnitAuditor {
    pub fn new(source: Arc<dyn CompletionSource>) -> Self {
        Self { source }
    }

    /// Judge one unit of reasoning against the original task context.
    ///
    /// Transport failures propagate; an unparseable reply is reported as
    /// [`AuditOutcome::Unparseable`] so the caller can log the fail-open.
    pub async fn audit(
        &self,
        task_context: &str,
        unit_body: &str,
    ) -> Result<AuditOutcome, AuditError> {
        let prompt = AuditorPrompts::build_audit_prompt(task_context, unit_body);

        let reply = self
            .source
            .complete(AuditorPrompts::system_prompt(), &prompt, AUDIT_TEMPERATURE)
            .await?;

        match AuditJudgment::parse(&reply) {
            Ok(AuditJudgment::Pass) => Ok(AuditOutcome::Pass),
            Ok(AuditJudgment::Fail { fix }) => Ok(AuditOutcome::Fail { fix }),
            Err(e) => {
                debug!(error = %e, "treating unparseable auditor reply as a pass");
                Ok(AuditOutcome::Unparseable {
                    preview: truncate(&reply, PREVIEW_LEN),
                })
            }
        }
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
