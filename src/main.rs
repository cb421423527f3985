//! Tryon - virtual try-on from the terminal.
//!
//! A minimal presentation shell over the workflow orchestrator: it collects
//! image files, raises intents into a session, and prints every state change.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tryon::core::{SessionError, SubmitOutcome, WorkflowError, WorkflowSnapshot};
use tryon::{
    generation, ChannelObserver, Config, ImageData, Session, SessionHandle, WorkflowEvent,
    WorkflowMachine, WorkflowStep,
};

/// Virtual try-on: your photo, a garment photo, one composited result
#[derive(Parser)]
#[command(name = "tryon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole workflow once from two image files
    Run {
        /// Photo of the person
        #[arg(short, long)]
        subject: PathBuf,

        /// Photo of the garment
        #[arg(short, long)]
        garment: PathBuf,

        /// Where to write the result
        #[arg(short, long, default_value = "tryon-result.png")]
        output: PathBuf,

        /// Accept the premium offer up front
        #[arg(long)]
        premium: bool,
    },

    /// Interactive session reading intents from stdin
    Shell,

    /// Show quota and generation provider status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    // API keys may live in a local .env
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Run { subject, garment, output, premium } => {
            cmd_run(&subject, &garment, &output, premium)?;
        }
        Commands::Shell => {
            cmd_shell()?;
        }
        Commands::Status { json } => {
            cmd_status(json)?;
        }
        Commands::Config { path } => {
            cmd_config(path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// Start a session wired to the configured provider.
fn start_session(config: &Config) -> Result<(SessionHandle, UnboundedReceiver<WorkflowEvent>)> {
    let client = generation::client_from_config(&config.generation)?;
    let (observer, events) = ChannelObserver::channel();
    let machine = WorkflowMachine::from_config(config, observer);

    let (session, handle) = Session::new(machine, client);
    session.spawn();

    Ok((handle, events))
}

/// Run the workflow once.
fn cmd_run(subject: &Path, garment: &Path, output: &Path, premium: bool) -> Result<()> {
    let config = Config::load()?;
    let subject = ImageData::from_file(subject)
        .with_context(|| format!("Failed to load subject image {}", subject.display()))?;
    let garment = ImageData::from_file(garment)
        .with_context(|| format!("Failed to load garment image {}", garment.display()))?;

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let (handle, mut events) = start_session(&config)?;

        if premium {
            handle.grant_premium()?;
        }
        handle.provide_subject_image(subject)?;
        handle.advance_to_garment_step()?;
        handle.provide_garment_image(garment)?;

        match handle.submit_generation().await {
            Ok(SubmitOutcome::Started(ticket)) => {
                println!("Generating your new look (attempt {})...", ticket.id());
            }
            Ok(outcome) => anyhow::bail!("Submission was not started: {outcome:?}"),
            Err(SessionError::Workflow(WorkflowError::QuotaExceeded { .. })) => {
                println!("You have used all free attempts. Re-run with --premium to subscribe.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        while let Some(event) = events.recv().await {
            let Some(snapshot) = event.snapshot() else {
                continue;
            };

            match (&snapshot.state.step, &snapshot.state.last_error) {
                (WorkflowStep::ShowingResult, _) => {
                    if let Some(result) = &snapshot.state.result_image {
                        result.write_to(output)?;
                        println!("Result written to {}", output.display());
                    }
                    print_quota(snapshot);
                    return Ok(());
                }
                (WorkflowStep::AwaitingGarmentImage, Some(error)) => {
                    anyhow::bail!("{error}");
                }
                _ => {}
            }
        }

        anyhow::bail!("Session ended before a result was produced")
    })
}

/// Interactive session.
fn cmd_shell() -> Result<()> {
    let config = Config::load()?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let (handle, mut events) = start_session(&config)?;

        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    WorkflowEvent::StateChanged(snapshot) => print_snapshot(&snapshot),
                    WorkflowEvent::QuotaExceeded(entitlement) => println!(
                        "  ! Free attempts used up ({}/{}). Type `subscribe` to go premium or `dismiss`.",
                        entitlement.free_attempts_used, entitlement.free_limit
                    ),
                }
            }
        });

        print_shell_help();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            let (command, argument) = match line.split_once(char::is_whitespace) {
                Some((command, argument)) => (command, argument.trim()),
                None => (line, ""),
            };

            let result = match command {
                "" => continue,
                "subject" => load_image(argument)
                    .and_then(|image| handle.provide_subject_image(image).map_err(Into::into)),
                "next" => handle.advance_to_garment_step().map_err(Into::into),
                "garment" => load_image(argument)
                    .and_then(|image| handle.provide_garment_image(image).map_err(Into::into)),
                // Quota denials are reported through the observer.
                "generate" => match handle.submit_generation().await {
                    Ok(_) | Err(SessionError::Workflow(WorkflowError::QuotaExceeded { .. })) => Ok(()),
                    Err(e) => Err(e.into()),
                },
                "reset" => handle.reset().map_err(Into::into),
                "subscribe" => handle.grant_premium().map_err(Into::into),
                "dismiss" => handle.dismiss_offer().map_err(Into::into),
                "save" => save_result(&handle, argument).await,
                "help" => {
                    print_shell_help();
                    Ok(())
                }
                "quit" | "exit" => break,
                other => Err(anyhow::anyhow!("Unknown command: {other} (type `help`)")),
            };

            if let Err(e) = result {
                println!("  ! {e}");
            }
        }

        drop(handle);
        printer.await?;
        Ok(())
    })
}

fn load_image(path: &str) -> Result<ImageData> {
    if path.is_empty() {
        anyhow::bail!("Expected a file path");
    }
    ImageData::from_file(path).with_context(|| format!("Failed to load {path}"))
}

async fn save_result(handle: &SessionHandle, path: &str) -> Result<()> {
    let path = if path.is_empty() { "tryon-result.png" } else { path };
    let snapshot = handle.snapshot().await?;

    let result = snapshot
        .state
        .result_image
        .ok_or_else(|| anyhow::anyhow!("No result to save yet"))?;
    result.write_to(path)?;
    println!("  Saved {path}");
    Ok(())
}

fn print_shell_help() {
    println!("Commands:");
    println!("  subject <file>   Upload your photo");
    println!("  next             Continue to the garment step");
    println!("  garment <file>   Upload the garment photo");
    println!("  generate         Create the try-on image");
    println!("  save [file]      Write the result to disk");
    println!("  reset            Start over");
    println!("  subscribe        Accept the premium offer");
    println!("  dismiss          Close the premium offer");
    println!("  quit             Leave");
}

fn print_snapshot(snapshot: &WorkflowSnapshot) {
    let step = snapshot.state.step;
    let label = match step {
        WorkflowStep::AwaitingSubjectImage => "Upload your photo",
        WorkflowStep::AwaitingGarmentImage => "Upload the garment photo",
        WorkflowStep::Generating => "Creating your new look...",
        WorkflowStep::ShowingResult => "Your result is ready (`save` to write it)",
    };
    println!("[step {}/4] {label}", step.number());

    if let Some(error) = &snapshot.state.last_error {
        println!("  ! {error}");
    }
    print_quota(snapshot);
}

fn print_quota(snapshot: &WorkflowSnapshot) {
    if let Some(remaining) = snapshot.entitlement.remaining {
        println!("  {remaining} free attempt(s) left");
    }
}

/// Show quota and provider status.
fn cmd_status(json: bool) -> Result<()> {
    let config = Config::load()?;
    let key_set = std::env::var(&config.generation.api_key_env).is_ok_and(|key| !key.is_empty());

    if json {
        let status = serde_json::json!({
            "free_limit": config.entitlement.free_limit,
            "provider": config.generation.provider,
            "model": config.generation.model,
            "api_key_env": config.generation.api_key_env,
            "api_key_set": key_set,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Free attempts per session: {}", config.entitlement.free_limit);
    println!("Provider: {} ({})", config.generation.provider, config.generation.model);
    println!(
        "API key ({}): {}",
        config.generation.api_key_env,
        if key_set { "set" } else { "not set" }
    );

    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tryon", &mut io::stdout());
}
