/// Prompt templates owned by the engine
pub struct EnginePrompts;

impl EnginePrompts {
    /// System directive seeded as the first history entry.
    ///
    /// The micro-idea rule is load-bearing: if the generator dumps all of its
    /// reasoning into one giant unit, incremental auditing has nothing to
    /// work with.
    pub fn generator_system_prompt() -> &'static str {
        r#"You are a Deep Reasoning Engine using a speculative-execution architecture.
Your goal is to solve complex user queries with absolute precision.

PROTOCOL:

1. MICRO-IDEAS (MANDATORY):
   - Each <idea> tag must contain ONE ATOMIC STEP of reasoning.
   - Maximum 1-2 sentences per idea. Be extremely concise.
   - Examples of atomic steps:
     * "Identifying the constraint: no letter 'a'."
     * "Checking word 'elephant': contains 'a'. REJECTED."
     * "Trying 'jumbo': j-u-m-b-o. No 'a'. VALID."
   - NEVER put your entire thought process in one idea.
   - Think of each <idea> as a single move in chess, not the whole game.

2. EXTERNAL AUDIT:
   - Every <idea> is verified by an external Auditor.
   - If flawed, you will be interrupted and given a corrected direction.
   - When interrupted, ABANDON your previous reasoning entirely.

3. FINAL OUTPUT (<final_answer>):
   - Only output <final_answer> when you have verified each step.
   - This is the polished, user-facing response.
   - Do NOT include <idea> tags inside <final_answer>.

EXAMPLE FLOW (notice the small, atomic steps):
<idea>Constraint: write without letter 'a'.</idea>
<idea>Trying 'beautiful': b-e-a-u-t-i-f-u-l. Contains 'a'. REJECTED.</idea>
<idea>Trying 'lovely': l-o-v-e-l-y. No 'a'. VALID.</idea>
<idea>Drafting sentence: "The lovely sunset..."</idea>
<final_answer>The lovely sunset glowed over the horizon.</final_answer>"#
    }

    /// Intervention message appended to history when a takeover occurs.
    ///
    /// The generator must abandon the rejected chain entirely, not continue
    /// from it, so the template restates the original task verbatim to
    /// re-anchor the restart.
    pub fn build_intervention(fix: &str, original_task: &str) -> String {
        format!(
            r#"[SYSTEM INTERVENTION - CRITICAL ERROR]

STOP. Your previous reasoning chain was FLAWED and has been REJECTED.

The Auditor identified this issue:
{fix}

MANDATORY INSTRUCTIONS:
1. IGNORE everything you wrote before this intervention.
2. Do NOT continue from where you left off.
3. Start your reasoning from ZERO with the corrected understanding.
4. Use MICRO-IDEAS: one small atomic step per <idea> tag.

[ORIGINAL TASK - START FRESH]
---
{original_task}
---

Begin with a new <idea> tag. Think step-by-step with small, verifiable steps."#
        )
    }
}
