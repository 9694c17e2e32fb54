mod auditor;
mod prompts;
mod verdict;

pub use auditor::{AuditError, AuditOutcome, UnitAuditor, AUDIT_TEMPERATURE};
pub use prompts::AuditorPrompts;
pub use verdict::{
    AuditJudgment, AuditStatus, AuditVerdict, JudgmentParseError, NO_FIX_PLACEHOLDER,
};
