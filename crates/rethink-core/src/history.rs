use rethink_provider::{Message, Role};

use crate::scanner::{FINAL_ANSWER_CLOSE, FINAL_ANSWER_OPEN};

/// Append-only conversation log; the sole state carried across restart
/// iterations within one run.
///
/// The first two entries (system directive, original task) are fixed at
/// construction. Everything after them is appended and never mutated,
/// reordered or removed - a takeover marks a flawed generation complete by
/// appending newer entries, it never rewrites older ones.
#[derive(Debug, Clone)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Seed the log with the system directive and the original task.
    pub fn seeded(system_prompt: &str, task: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(task)],
        }
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Read-only view of the full log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Terminal answer extracted from the last assistant message.
    ///
    /// Returns the body of the final-answer block when present, otherwise
    /// the whole message; `None` when no assistant message exists yet.
    pub fn final_answer(&self) -> Option<String> {
        let content = self.last_assistant()?;

        let answer = content
            .find(FINAL_ANSWER_OPEN)
            .map(|start| start + FINAL_ANSWER_OPEN.len())
            .and_then(|body_start| {
                content[body_start..]
                    .find(FINAL_ANSWER_CLOSE)
                    .map(|rel| content[body_start..body_start + rel].trim().to_string())
            });

        Some(answer.unwrap_or_else(|| content.to_string()))
    }
}
