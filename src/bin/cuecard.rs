//! cuecard: command-line front end for the analysis core.
//!
//! Runs one analysis against the configured providers, mostly useful for
//! checking credentials and prompt output without the desktop app.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use cuecard::{AnalyzeOptions, Config, Cuecard, Secrets, StructuredContext};

/// Cuecard analysis CLI
#[derive(Parser)]
#[command(name = "cuecard")]
#[command(version)]
#[command(about = "Analyze interview conversations with an LLM")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "CUECARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a conversation (argument or stdin)
    Analyze {
        /// Conversation text (or omit to read from stdin)
        text: Option<String>,
        /// File holding OCR text captured from the screen
        #[arg(long, conflicts_with_all = ["title", "description", "code_file"])]
        ocr_file: Option<PathBuf>,
        /// Problem title
        #[arg(long)]
        title: Option<String>,
        /// Problem description
        #[arg(long)]
        description: Option<String>,
        /// File holding starter code for the problem
        #[arg(long)]
        code_file: Option<PathBuf>,
        /// Provider to switch to before analysing
        #[arg(short, long)]
        provider: Option<String>,
        /// Bypass the response cache
        #[arg(long)]
        force: bool,
        /// Print the full result envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let analyzer = Cuecard::builder()
        .config(Config::load(args.config.as_deref())?)
        .secrets(Secrets::load()?)
        .build()?;

    match args.command {
        Command::Providers => {
            let active = analyzer.current_provider_info();
            for key in analyzer.available_providers() {
                let marker = if key == active.key { "*" } else { " " };
                match analyzer.registry().descriptor(&key) {
                    Some(d) => println!("{marker} {key} ({}, {})", d.info().name, d.info().model),
                    None => println!("{marker} {key}"),
                }
            }
        }

        Command::Analyze {
            text,
            ocr_file,
            title,
            description,
            code_file,
            provider,
            force,
            json,
        } => {
            if let Some(key) = provider
                && !analyzer.switch_provider(&key)
            {
                return Err(format!("provider '{key}' not available").into());
            }

            let context = structured_context(ocr_file, title, description, code_file)?;
            let buffer = resolve_text(text, context.is_some())?;

            let cancel = CancellationToken::new();
            let options = AnalyzeOptions::new().cancel_on(cancel.clone());
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let result = analyzer
                .analyze_with_options(&buffer, context.as_ref(), force, &options)
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if let Some(response) = &result.response {
                println!("{response}");
            }

            if !result.success {
                return Err(result
                    .error
                    .unwrap_or_else(|| "analysis failed".to_string())
                    .into());
            }
        }
    }

    Ok(())
}

fn structured_context(
    ocr_file: Option<PathBuf>,
    title: Option<String>,
    description: Option<String>,
    code_file: Option<PathBuf>,
) -> Result<Option<StructuredContext>, Box<dyn std::error::Error>> {
    if let Some(path) = ocr_file {
        return Ok(Some(StructuredContext::ocr(fs::read_to_string(path)?)));
    }
    if title.is_none() && description.is_none() && code_file.is_none() {
        return Ok(None);
    }
    let mut context =
        StructuredContext::problem(title.unwrap_or_default(), description.unwrap_or_default());
    if let Some(path) = code_file {
        context = context.with_code(fs::read_to_string(path)?);
    }
    Ok(Some(context))
}

/// Resolve the conversation from an optional argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → empty when structured context is given, else an error
fn resolve_text(
    arg: Option<String>,
    has_context: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) if has_context => Ok(String::new()),
        (None, None) => {
            Err("analyze: no input provided (pass text as argument or via stdin)".into())
        }
    }
}
