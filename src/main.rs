mod api;
mod config;
mod engine;
mod logging;
mod markdown;
mod routes;
mod session;
mod sse;
mod transcript;
mod tui;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use tokio::sync::{mpsc, oneshot};

use api::ApiClient;
use config::{ConfigFile, ResolvedConfig};
use engine::TurnEvent;

#[derive(Parser, Debug)]
#[command(
    name = "banter",
    about = "A terminal client for streaming chat conversations",
    long_about = None,
)]
struct Args {
    /// Message to send directly (omit to enter interactive TUI mode)
    message: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "BANTER_PROFILE")]
    profile: Option<String>,

    /// Override server base URL
    #[arg(short, long, env = "BANTER_SERVER")]
    server: Option<String>,

    /// Conversation to enter — a bare id or a /conversation/{id} path
    #[arg(short, long)]
    conversation: Option<String>,

    /// Start a fresh conversation, ignoring the saved one
    #[arg(long)]
    new: bool,

    /// Seconds to wait for stream data before giving up on a reply
    #[arg(long, env = "BANTER_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Upload a document to the server and exit
    #[arg(long, value_name = "FILE")]
    upload: Option<std::path::PathBuf>,

    /// Log at debug level (see the log file under the data dir)
    #[arg(short, long)]
    verbose: bool,

    /// Write a default config file to ~/.config/banter/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: banter");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.server.as_deref(),
        args.idle_timeout,
    );

    let data_dir = session::data_dir()?;
    logging::init(&data_dir, args.verbose)?;

    let api = ApiClient::new(&resolved.server);
    api.health()
        .await
        .context("is the chat server running? (--server or BANTER_SERVER to point elsewhere)")?;

    // ── --upload ──────────────────────────────────────────────────────────────
    if let Some(path) = &args.upload {
        api.upload(path).await?;
        println!("✓ uploaded {}", path.display());
        return Ok(());
    }

    let conversation_id = session::resolve_conversation(
        &api,
        &data_dir,
        args.conversation.as_deref(),
        args.new,
    )
    .await?;

    // ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────
    if let Some(message) = args.message {
        return run_single_shot(api, conversation_id, message, &resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(api, resolved, conversation_id, data_dir).await
}

// ── Single-shot mode ──────────────────────────────────────────────────────────

/// Drive one turn and print fragments to stdout as they arrive. Output is the
/// reply text only, so it pipes cleanly.
async fn run_single_shot(
    api: ApiClient,
    conversation_id: String,
    message: String,
    resolved: &ResolvedConfig,
) -> Result<()> {
    use std::io::Write;

    if message.trim().is_empty() {
        bail!("refusing to send an empty message");
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<TurnEvent>();
    // The sender half is held for the whole turn; dropping it would read as a
    // cancellation to the driver.
    let (_cancel_guard, cancel_rx) = oneshot::channel::<()>();

    let driver = tokio::spawn(engine::run_turn(
        api,
        conversation_id,
        message,
        Duration::from_secs(resolved.idle_timeout_secs),
        tx,
        cancel_rx,
    ));

    let mut failure = None;
    while let Some(ev) = rx.recv().await {
        match ev {
            TurnEvent::Fragment(fragment) => {
                print!("{fragment}");
                std::io::stdout().flush()?;
            }
            TurnEvent::End => {
                println!();
            }
            TurnEvent::Failed(err) => {
                failure = Some(err);
            }
        }
    }
    driver.await?;

    if let Some(err) = failure {
        eprintln!();
        return Err(err.into());
    }
    Ok(())
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, u64)> = file
        .profiles
        .iter()
        .map(|(name, p)| (name.clone(), p.server.clone(), p.idle_timeout_secs))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    for (name, server, idle) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    server        {server}");
        println!("    idle timeout  {idle}s");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "banter", &mut std::io::stdout());
    Ok(())
}
