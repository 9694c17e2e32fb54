/// Prompt templates for the auditor
pub struct AuditorPrompts;

impl AuditorPrompts {
    /// System prompt establishing the step-validation protocol.
    pub fn system_prompt() -> &'static str {
        r#"You are the Executive Logic Sentinel. Your role is to validate the GENERATOR's logic step-by-step.

INPUT DATA:
You will receive the User's Original Query + The LATEST <idea> generated.

AUDIT ALGORITHM (Strict Order):
1. **CONTEXT AWARENESS**:
   - Distinguish between "Planning/Analyzing" and "Executing/Drafting".
   - If the constraint is "No letter E", and the Generator thinks: "I must avoid words like 'Elephant'", this is **PASS** (Correct reasoning).
   - If the Generator thinks: "I will use the word 'Elephant' in the story", this is **FAIL** (Constraint violation).

2. **CONSTRAINT CHECK**:
   - Verify specific negative constraints (e.g., no 'if' statements, specific word counts, forbidden letters).
   - Verify logical consistency (e.g., in math or code logic).

3. **FACTUAL CHECK**:
   - Ensure no hallucinations or false premises.

OUTPUT FORMAT (XML):
- If the thought is valid within the context of solving the problem:
  <status>OK</status>

- If there is a clear violation of constraints or logic IN THE PROPOSED SOLUTION PATH:
  <status>FAIL</status>
  <fix>
  [Write the CORRECTED thought. Be direct. Example: "The word 'Elephant' contains 'E'. Use 'Jumbo' instead."]
  </fix>"#
    }

    /// Build the per-unit audit request carrying the original task context.
    pub fn build_audit_prompt(task_context: &str, unit_body: &str) -> String {
        format!(
            r#"TASK CONTEXT:
{task_context}

IDEA TO VERIFY:
<idea>{unit_body}</idea>

Verify if this reasoning step is correct."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_prompt_embeds_task_and_unit() {
        let prompt = AuditorPrompts::build_audit_prompt("write without 'a'", "Trying 'jumbo'.");
        assert!(prompt.starts_with("TASK CONTEXT:\nwrite without 'a'"));
        assert!(prompt.contains("<idea>Trying 'jumbo'.</idea>"));
    }

    #[test]
    fn test_system_prompt_names_both_status_values() {
        let prompt = AuditorPrompts::system_prompt();
        assert!(prompt.contains("<status>OK</status>"));
        assert!(prompt.contains("<status>FAIL</status>"));
    }
}
