use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events emitted over the run of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        task_preview: String,
    },
    GeneratorStarted {
        temperature: f32,
    },
    /// Raw text fragment from the generator stream
    StreamDelta {
        text: String,
    },
    GeneratorInterrupted,
    AuditStarted {
        index: usize,
    },
    AuditPassed {
        index: usize,
    },
    AuditFailed {
        index: usize,
        fix_preview: String,
    },
    AuditUnparseable {
        index: usize,
        preview: String,
    },
    AuditErrored {
        index: usize,
        error: String,
    },
    AwaitingTailAudits,
    FinalAnswerPending,
    AuditsClean,
    FinalAnswerDiscarded {
        index: usize,
    },
    TakeoverTriggered {
        offset: usize,
        committed_chars: usize,
        fix_preview: String,
    },
    IterationRestarted {
        takeovers: u32,
        max_takeovers: u32,
        temperature: f32,
    },
    GenerationClean,
    RunCompleted {
        takeovers: u32,
    },
    RetryBudgetExhausted {
        takeovers: u32,
        max_takeovers: u32,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable colored transcript
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for engine events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with a JSONL file sink in addition to console output
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File sink is always JSON regardless of console format
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted { task_preview } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[SYSTEM] Engine starting: {}", task_preview).cyan()
                );
            }
            LogEvent::GeneratorStarted { temperature } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[SYSTEM] Generator: starting stream [temp: {:.2}]", temperature)
                        .cyan()
                );
            }
            LogEvent::StreamDelta { text } => {
                // Deltas render inline to reproduce the live transcript
                let _ = write!(stderr, "{}", text.blue());
                let _ = stderr.flush();
            }
            LogEvent::GeneratorInterrupted => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    "[WARNING] Stream interrupted by takeover".yellow()
                );
            }
            LogEvent::AuditStarted { index } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[AUDIT] Auditing idea #{}...", index + 1).yellow()
                );
            }
            LogEvent::AuditPassed { index } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[AUDIT] Idea #{}: OK ✓", index + 1).green()
                );
            }
            LogEvent::AuditFailed { index, .. } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[ERROR] Idea #{}: FAIL ✗", index + 1).red()
                );
            }
            LogEvent::AuditUnparseable { preview, .. } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[WARNING] Auditor returned invalid format: {}", preview).yellow()
                );
            }
            LogEvent::AuditErrored { error, .. } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[ERROR] Error in audit: {}", error).red()
                );
            }
            LogEvent::AwaitingTailAudits => {
                let _ = writeln!(stderr, "\n{}", "[SYSTEM] Waiting for final audits...".cyan());
            }
            LogEvent::FinalAnswerPending => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    "[SYSTEM] Final answer detected. Blocking until pending audits resolve..."
                        .cyan()
                );
            }
            LogEvent::AuditsClean => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    "[AUDIT] All pending audits passed. Proceeding with final answer.".green()
                );
            }
            LogEvent::FinalAnswerDiscarded { index } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!(
                        "[ERROR] Audit failure detected during final answer. Idea #{} failed. Discarding final answer attempt.",
                        index + 1
                    )
                    .red()
                );
            }
            LogEvent::TakeoverTriggered {
                committed_chars,
                fix_preview,
                ..
            } => {
                let bar = "═══════════════════════════════════════";
                let _ = writeln!(stderr, "\n{}", format!("[TAKEOVER] {}", bar).magenta().bold());
                let _ = writeln!(
                    stderr,
                    "{}",
                    "[TAKEOVER] TAKEOVER INITIATED (Append-Only Strategy)"
                        .magenta()
                        .bold()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    format!(
                        "[TAKEOVER] Committing truncated response ({} chars) to history.",
                        committed_chars
                    )
                    .magenta()
                    .bold()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    format!("[TAKEOVER] Intervention appended with fix: {}", fix_preview)
                        .magenta()
                        .bold()
                );
                let _ = writeln!(stderr, "{}", format!("[TAKEOVER] {}", bar).magenta().bold());
            }
            LogEvent::IterationRestarted {
                takeovers,
                max_takeovers,
                temperature,
            } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!(
                        "[SYSTEM] Restarting after Takeover ({}/{}) [Temp: {:.2}]...",
                        takeovers, max_takeovers, temperature
                    )
                    .cyan()
                );
            }
            LogEvent::GenerationClean => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    "[SYSTEM] Generation completed without errors.".cyan()
                );
            }
            LogEvent::RunCompleted { takeovers } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!("[SYSTEM] Run complete after {} takeover(s).", takeovers).cyan()
                );
            }
            LogEvent::RetryBudgetExhausted {
                takeovers,
                max_takeovers,
            } => {
                let _ = writeln!(
                    stderr,
                    "\n{}",
                    format!(
                        "[ERROR] Aborting process. The logical path is unstable and exceeds error limits. (Retries: {}/{})",
                        takeovers, max_takeovers
                    )
                    .red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { .. } => format!("[{}] run:start", timestamp),
            LogEvent::GeneratorStarted { temperature } => {
                format!("[{}] gen:start temp={:.2}", timestamp, temperature)
            }
            LogEvent::StreamDelta { .. } => return, // Too noisy for compact mode
            LogEvent::GeneratorInterrupted => format!("[{}] gen:interrupted", timestamp),
            LogEvent::AuditStarted { index } => {
                format!("[{}] audit:start:{}", timestamp, index + 1)
            }
            LogEvent::AuditPassed { index } => format!("[{}] audit:ok:{}", timestamp, index + 1),
            LogEvent::AuditFailed { index, .. } => {
                format!("[{}] audit:fail:{}", timestamp, index + 1)
            }
            LogEvent::AuditUnparseable { index, .. } => {
                format!("[{}] audit:unparseable:{}", timestamp, index + 1)
            }
            LogEvent::AuditErrored { index, error } => {
                format!("[{}] audit:error:{} {}", timestamp, index + 1, error)
            }
            LogEvent::AwaitingTailAudits => format!("[{}] tail:wait", timestamp),
            LogEvent::FinalAnswerPending => format!("[{}] guardrail:wait", timestamp),
            LogEvent::AuditsClean => format!("[{}] guardrail:clean", timestamp),
            LogEvent::FinalAnswerDiscarded { index } => {
                format!("[{}] guardrail:discard:{}", timestamp, index + 1)
            }
            LogEvent::TakeoverTriggered {
                offset,
                committed_chars,
                ..
            } => format!(
                "[{}] takeover offset={} committed={}",
                timestamp, offset, committed_chars
            ),
            LogEvent::IterationRestarted {
                takeovers,
                max_takeovers,
                temperature,
            } => format!(
                "[{}] restart:{}/{} temp={:.2}",
                timestamp, takeovers, max_takeovers, temperature
            ),
            LogEvent::GenerationClean => format!("[{}] gen:clean", timestamp),
            LogEvent::RunCompleted { takeovers } => {
                format!("[{}] run:done takeovers={}", timestamp, takeovers)
            }
            LogEvent::RetryBudgetExhausted {
                takeovers,
                max_takeovers,
            } => format!("[{}] run:aborted {}/{}", timestamp, takeovers, max_takeovers),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}
