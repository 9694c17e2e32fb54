use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback corrective text when a FAIL reply carries no `<fix>` block.
pub const NO_FIX_PLACEHOLDER: &str = "[No fix provided]";

/// Lifecycle of a unit's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Pass,
    Fail,
}

/// Verdict recorded for a single unit, keyed by its discovery index.
///
/// `start_offset` is the unit's start position in the generation buffer,
/// kept so a takeover can truncate the committed text at the failure point.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditVerdict {
    pub status: AuditStatus,
    pub fix: Option<String>,
    pub start_offset: usize,
}

impl AuditVerdict {
    pub fn pending(start_offset: usize) -> Self {
        Self {
            status: AuditStatus::Pending,
            fix: None,
            start_offset,
        }
    }

    pub fn pass(start_offset: usize) -> Self {
        Self {
            status: AuditStatus::Pass,
            fix: None,
            start_offset,
        }
    }

    pub fn fail(fix: String, start_offset: usize) -> Self {
        Self {
            status: AuditStatus::Fail,
            fix: Some(fix),
            start_offset,
        }
    }

    pub fn is_fail(&self) -> bool {
        self.status == AuditStatus::Fail
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum JudgmentParseError {
    #[error("No status marker found in auditor reply")]
    NoStatusMarker,

    #[error("Unrecognized status value: {0}")]
    InvalidStatus(String),
}

/// Binary outcome parsed from an auditor reply
#[derive(Debug, Clone, PartialEq)]
pub enum AuditJudgment {
    Pass,
    Fail { fix: String },
}

impl AuditJudgment {
    /// Parse an auditor reply.
    ///
    /// Expected format:
    /// ```text
    /// <status>OK</status>
    /// ```
    /// or
    /// ```text
    /// <status>FAIL</status>
    /// <fix>The corrected thought.</fix>
    /// ```
    ///
    /// A missing or unrecognized status marker is an error; callers treat it
    /// as an implicit pass so a malformed reply can never stall the run.
    pub fn parse(reply: &str) -> Result<Self, JudgmentParseError> {
        let status = extract_block(reply, "<status>", "</status>")
            .ok_or(JudgmentParseError::NoStatusMarker)?;

        match status.trim() {
            "OK" => Ok(AuditJudgment::Pass),
            "FAIL" => {
                let fix = extract_block(reply, "<fix>", "</fix>")
                    .map(|f| f.trim().to_string())
                    .unwrap_or_else(|| NO_FIX_PLACEHOLDER.to_string());
                Ok(AuditJudgment::Fail { fix })
            }
            other => Err(JudgmentParseError::InvalidStatus(other.trim().to_string())),
        }
    }
}

fn extract_block<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = start + text[start..].find(close)?;
    Some(&text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_reply() {
        let judgment = AuditJudgment::parse("<status>OK</status>").unwrap();
        assert_eq!(judgment, AuditJudgment::Pass);
    }

    #[test]
    fn test_parse_fail_reply_with_fix() {
        let reply = "<status>FAIL</status>\n<fix>\nThe word 'Elephant' contains 'E'. Use 'Jumbo' instead.\n</fix>";
        let judgment = AuditJudgment::parse(reply).unwrap();
        assert_eq!(
            judgment,
            AuditJudgment::Fail {
                fix: "The word 'Elephant' contains 'E'. Use 'Jumbo' instead.".to_string()
            }
        );
    }

    #[test]
    fn test_parse_fail_reply_without_fix_uses_placeholder() {
        let judgment = AuditJudgment::parse("<status>FAIL</status>").unwrap();
        assert_eq!(
            judgment,
            AuditJudgment::Fail {
                fix: NO_FIX_PLACEHOLDER.to_string()
            }
        );
    }

    #[test]
    fn test_parse_reply_with_surrounding_prose() {
        let reply = "Reviewing the step now.\n<status>OK</status>\nLooks sound to me.";
        assert_eq!(AuditJudgment::parse(reply).unwrap(), AuditJudgment::Pass);
    }

    #[test]
    fn test_parse_missing_marker() {
        let result = AuditJudgment::parse("The step seems fine.");
        assert_eq!(result, Err(JudgmentParseError::NoStatusMarker));
    }

    #[test]
    fn test_parse_unrecognized_status() {
        let result = AuditJudgment::parse("<status>MAYBE</status>");
        assert_eq!(
            result,
            Err(JudgmentParseError::InvalidStatus("MAYBE".to_string()))
        );
    }

    #[test]
    fn test_verdict_transitions() {
        let pending = AuditVerdict::pending(42);
        assert_eq!(pending.status, AuditStatus::Pending);
        assert_eq!(pending.start_offset, 42);

        let fail = AuditVerdict::fail("use A2".to_string(), 42);
        assert!(fail.is_fail());
        assert_eq!(fail.fix.as_deref(), Some("use A2"));
    }
}
