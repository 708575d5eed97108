// ABOUTME: Entry point for the deckfix binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs the agent review, the offline correction or inspection.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deckfix_agent::providers::openai::OpenAIRuntime;
use deckfix_agent::{Agent, AgentConfig, RunOutcome};
use deckfix_core::{CorrectionStore, Deck, DocumentAdapter, alignment, corrected_path, rules};
use deckfix_pptx::PptxDocument;

const DEFAULT_INPUT: &str = "Test deck.pptx";

/// Find and fix spelling, grammar and alignment errors in PowerPoint decks.
#[derive(Parser, Debug)]
#[command(name = "deckfix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Let a language model review the deck and save a corrected copy
    Review {
        /// Presentation to review
        #[arg(default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Maximum number of model calls (overrides DECKFIX_MAX_ITERATIONS)
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Model name (overrides OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Per model call timeout in seconds (overrides DECKFIX_CALL_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Fix common misspellings and alignment without a model
    Correct {
        /// Presentation to correct
        #[arg(default_value = DEFAULT_INPUT)]
        input: PathBuf,
    },

    /// Print the slides, shapes and paragraphs of a deck
    Inspect {
        /// Presentation to inspect
        #[arg(default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Print the deck as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckfix=info,deckfix_agent=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Review {
            input,
            max_iterations,
            model,
            timeout_secs,
        } => review(&input, max_iterations, model, timeout_secs).await,
        Command::Correct { input } => correct(&input).map(|()| true),
        Command::Inspect { input, json } => inspect(&input, json).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Run the agent. Returns false when the run failed.
async fn review(
    input: &Path,
    max_iterations: Option<u32>,
    model: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    let mut config = AgentConfig::from_env().context("invalid configuration")?;
    if let Some(max_iterations) = max_iterations {
        anyhow::ensure!(max_iterations > 0, "--max-iterations must be positive");
        config.max_iterations = max_iterations;
    }
    if let Some(secs) = timeout_secs {
        anyhow::ensure!(secs > 0, "--timeout-secs must be positive");
        config.call_timeout = Duration::from_secs(secs);
    }

    let mut runtime = OpenAIRuntime::from_env().context("failed to configure the OpenAI client")?;
    if let Some(model) = model {
        runtime = runtime.with_model(model);
    }

    println!("Reviewing: {}", input.display());
    let agent = Agent::new(Arc::new(runtime), Arc::new(PptxDocument::new()), config);
    let outcome = agent.run(input, config.max_iterations).await;

    match outcome {
        RunOutcome::Success {
            output_path,
            corrections_applied,
            conflicts,
            iterations,
        } => {
            println!(
                "Review complete after {} iterations: {} corrections applied.",
                iterations, corrections_applied
            );
            print_conflicts(&conflicts);
            println!("Saved to: {}", output_path.display());
            Ok(true)
        }
        RunOutcome::Capped {
            output_path,
            corrections_applied,
            conflicts,
            iterations,
        } => {
            println!(
                "Warning: stopped after {} iterations without the review being marked complete.",
                iterations
            );
            println!("{} corrections applied.", corrections_applied);
            print_conflicts(&conflicts);
            println!("Saved to: {}", output_path.display());
            Ok(true)
        }
        RunOutcome::Failure {
            reason,
            iteration,
            state,
        } => {
            eprintln!("Review failed at iteration {}: {}", iteration, reason);
            eprintln!(
                "{} corrections were pending and have not been saved.",
                state.corrections.pending_count()
            );
            Ok(false)
        }
    }
}

/// Apply the built-in spelling rules and the deck's alignment standard.
fn correct(input: &Path) -> Result<()> {
    let document = PptxDocument::new();
    let mut deck = document
        .read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let mut store = CorrectionStore::new();
    let proposals = rules::propose_corrections(&deck)
        .into_iter()
        .chain(alignment::propose(&deck, None));
    for proposal in proposals {
        let target = proposal.target;
        if let Err(err) = store.add(proposal) {
            tracing::warn!(target = %target, error = %err, "skipping proposal");
        }
    }

    let pending: Vec<String> = store.pending().iter().map(|c| c.to_string()).collect();
    let report = store.apply(&mut deck);

    let output = corrected_path(input);
    document
        .write(&deck, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    for line in &pending {
        println!("  {}", line);
    }
    println!("{} corrections applied, {} values changed.", report.processed, report.writes);
    print_conflicts(&report.conflicts);
    println!("Saved to: {}", output.display());
    Ok(())
}

fn inspect(input: &Path, json: bool) -> Result<()> {
    let deck = PptxDocument::new()
        .read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&deck)?);
    } else {
        print_deck(&deck);
    }
    Ok(())
}

fn print_deck(deck: &Deck) {
    println!("{}: {} slides", deck.source.display(), deck.slide_count());
    for slide in &deck.slides {
        println!();
        println!("Slide {} ({})", slide.index, slide.part);
        for shape in &slide.shapes {
            let geometry = match shape.bounds {
                Some(b) => format!("at {},{} size {}x{}", b.x, b.y, b.width, b.height),
                None => "inherited geometry".to_string(),
            };
            println!("  [{}] {} ({:?}, {})", shape.id, shape.name, shape.role(), geometry);
            let shape_id = shape.id;
            for element in slide.elements.iter().filter(|e| e.id.shape_id() == shape_id) {
                println!("    [{}] {}", element.id, element.text.replace('\n', " / "));
            }
        }
    }
}

fn print_conflicts(conflicts: &[deckfix_core::Conflict]) {
    if conflicts.is_empty() {
        return;
    }
    println!("{} conflicts:", conflicts.len());
    for conflict in conflicts {
        println!("  {}", conflict);
    }
}
