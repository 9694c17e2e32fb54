use serde::{Deserialize, Serialize};

/// The final outcome of an engine run.
///
/// Retry-budget exhaustion is an expected terminal state, not an error, so
/// callers branch on it with ordinary control flow; only transport failures
/// surface as [`crate::EngineError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Generation finished with every audit passing
    Completed { answer: String, takeovers: u32 },
    /// The takeover budget ran out before a clean generation
    RetriesExhausted { takeovers: u32, max_takeovers: u32 },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Final answer text, when the run produced one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Completed { answer, .. } => Some(answer),
            Self::RetriesExhausted { .. } => None,
        }
    }

    pub fn takeovers(&self) -> u32 {
        match self {
            Self::Completed { takeovers, .. } => *takeovers,
            Self::RetriesExhausted { takeovers, .. } => *takeovers,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::RetriesExhausted { .. } => 1,
        }
    }
}
