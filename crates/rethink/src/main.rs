mod config;
mod ui;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use rethink_core::{Engine, EngineConfig, EngineError, RunOutcome};
use rethink_logging::{LogFormat, Logger};
use rethink_provider::OpenAiCompatSource;

use config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rethink",
    about = "Speculative reasoning engine with concurrent auditing",
    version
)]
struct Cli {
    /// Task to run once (omit for interactive chat)
    #[arg(short, long)]
    task: Option<String>,

    /// API key (falls back to the RETHINK_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Model to use for the generator role
    #[arg(long)]
    generator_model: Option<String>,

    /// Model to use for the auditor role
    #[arg(long)]
    auditor_model: Option<String>,

    /// Maximum takeovers before aborting a run
    #[arg(short = 'n', long)]
    max_takeovers: Option<u32>,

    /// Base generation temperature
    #[arg(long)]
    base_temperature: Option<f32>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Append structured events to a JSONL file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output the final outcome as JSON on stdout
    #[arg(long)]
    json_output: bool,

    /// Working directory holding rethink.toml (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    rethink_logging::init_tracing("warn", log_format);

    let working_dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let api_key = resolve_api_key(&cli)?;
    eprintln!(
        "{}",
        format!("✓ API Key loaded ({})", ui::masked_key(&api_key)).green()
    );

    let base_url = cli
        .base_url
        .as_deref()
        .unwrap_or_else(|| project.base_url());
    let generator_model = cli
        .generator_model
        .as_deref()
        .unwrap_or_else(|| project.generator_model());
    let auditor_model = cli
        .auditor_model
        .as_deref()
        .unwrap_or_else(|| project.auditor_model());

    let generator = Arc::new(
        OpenAiCompatSource::new(base_url, generator_model, api_key.clone())
            .context("Failed to build the generator source")?,
    );
    let auditor = Arc::new(
        OpenAiCompatSource::new(base_url, auditor_model, api_key)
            .context("Failed to build the auditor source")?,
    );

    let mut engine_config = EngineConfig::default();
    if let Some(max) = cli.max_takeovers.or(project.max_takeovers) {
        engine_config = engine_config.with_max_takeovers(max);
    }
    if let Some(temperature) = cli.base_temperature.or(project.base_temperature) {
        engine_config = engine_config.with_base_temperature(temperature);
    }

    let logger = match &cli.log_file {
        Some(path) => {
            Logger::with_file(log_format, path).context("Failed to open the log file")?
        }
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    match cli.task {
        Some(ref task) => {
            let mut engine = Engine::new(generator, auditor, engine_config, logger);
            let outcome = run_once(&mut engine, task, cli.json_output).await?;
            std::process::exit(outcome.exit_code());
        }
        None => chat_loop(generator, auditor, engine_config, logger, cli.json_output).await,
    }
}

fn resolve_api_key(cli: &Cli) -> Result<String> {
    if let Some(ref key) = cli.api_key {
        if !key.trim().is_empty() {
            return Ok(key.clone());
        }
    }

    if let Ok(key) = std::env::var("RETHINK_API_KEY") {
        if !key.trim().is_empty() {
            return Ok(key);
        }
    }

    // One-shot runs cannot prompt; interactive mode asks on the terminal
    if cli.task.is_some() {
        anyhow::bail!("No API key provided. Use --api-key or set RETHINK_API_KEY.");
    }
    ui::prompt_for_api_key()
}

async fn run_once(engine: &mut Engine, task: &str, json_output: bool) -> Result<RunOutcome> {
    let outcome = engine.run(task).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        ui::print_outcome(&outcome);
    }

    Ok(outcome)
}

/// Interactive front end: each message runs a fresh, stateless engine.
async fn chat_loop(
    generator: Arc<OpenAiCompatSource>,
    auditor: Arc<OpenAiCompatSource>,
    engine_config: EngineConfig,
    logger: Arc<Logger>,
    json_output: bool,
) -> Result<()> {
    ui::print_banner();
    ui::print_color_legend();

    loop {
        eprintln!("{}", "Enter your message (or 'exit' to quit):".cyan());
        eprint!("{}", "> ".bold());
        std::io::stderr().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();

        if matches!(message, "exit" | "quit" | "q") {
            eprintln!("{}", "Exiting chat...".yellow());
            break;
        }
        if message.is_empty() {
            eprintln!("{}", "Error: Empty input.".red());
            continue;
        }
        eprintln!();

        let mut engine = Engine::new(
            generator.clone(),
            auditor.clone(),
            engine_config.clone(),
            logger.clone(),
        );

        match run_once(&mut engine, message, json_output).await {
            Ok(_) => {}
            Err(e) => match e.downcast_ref::<EngineError>() {
                // Transport failures end the run, not the chat session
                Some(_) => {
                    eprintln!("{}", format!("Error: {}", e).red());
                    eprintln!("{}", "You can try again with a different message.".dimmed());
                }
                None => return Err(e),
            },
        }
    }

    Ok(())
}
