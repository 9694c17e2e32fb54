//! Terminal presentation for the chat front end.

use colored::Colorize;
use std::io::Write;

use rethink_core::RunOutcome;

pub fn print_banner() {
    eprintln!("{}", "╔═══════════════════════════════════════════╗".cyan().bold());
    eprintln!("{}", "║            Chat with rethink              ║".cyan().bold());
    eprintln!("{}", "╚═══════════════════════════════════════════╝".cyan().bold());
    eprintln!();
}

pub fn print_color_legend() {
    eprintln!("{}", "Color Legend:".dimmed());
    eprintln!("  {} Generated Text (Streaming)", "■ Blue:".blue());
    eprintln!("  {} Audit in Progress", "■ Yellow:".yellow());
    eprintln!("  {} Validated Idea (OK)", "■ Green:".green());
    eprintln!("  {} Takeover (Correction)", "■ Magenta:".magenta());
    eprintln!("  {} Error Detected", "■ Red:".red());
    eprintln!();
}

/// Partial key echo so the user can verify which credential loaded.
pub fn masked_key(api_key: &str) -> String {
    let visible = api_key.len().saturating_sub(4).min(4);
    format!("{}...", &api_key[..visible])
}

/// Prompt on the terminal until a non-empty API key is entered.
pub fn prompt_for_api_key() -> anyhow::Result<String> {
    eprintln!("{}", "API key not found (flag or RETHINK_API_KEY)".yellow());
    eprintln!("{}", "You can set it permanently via --api-key or the environment".dimmed());
    eprintln!();

    loop {
        eprint!("{}", "Enter your API Key: ".bold());
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let key = input.trim();

        if key.is_empty() {
            eprintln!("{}", "Error: API Key cannot be empty.".red());
            continue;
        }

        eprintln!("{}", "✓ Valid API Key provided".green());
        eprintln!();
        return Ok(key.to_string());
    }
}

/// Render the final answer inside a framed block on stdout.
pub fn print_final_answer(answer: &str) {
    eprintln!();
    eprintln!("{}", "╔════════════════════════════════════════════════════════════╗".green().bold());
    eprintln!("{}", "║                    FINAL RESULT                            ║".green().bold());
    eprintln!("{}", "╚════════════════════════════════════════════════════════════╝".green().bold());
    println!("{}", answer);
    println!();
}

pub fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { answer, .. } => print_final_answer(answer),
        RunOutcome::RetriesExhausted {
            takeovers,
            max_takeovers,
        } => {
            eprintln!();
            eprintln!(
                "{}",
                format!(
                    "The logical path is unstable and exceeds error limits. (Retries: {}/{})",
                    takeovers, max_takeovers
                )
                .red()
            );
        }
    }
}
