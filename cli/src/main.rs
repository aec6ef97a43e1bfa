//! sealtrail: operator CLI for tamper-evident audit trails.
//!
//! Every `record` issues a signed consent token and appends it, chained, to
//! the JSONL store.  `verify` re-checks both the hash chain and every token.
//!
//! Usage:
//!   sealtrail init
//!   sealtrail record data_write --payload '{"rows": 3}' --ethics-verified --approval true
//!   sealtrail log --operation data_write --limit 10 --verbose
//!   sealtrail verify --detailed
//!   sealtrail export --output snapshot.json
//!   sealtrail keygen --output trust_root.key
//!
//! Exit status: 0 on success, 1 when `verify` finds the trail untrusted,
//! 2 on any error (unreadable config, corrupted store, I/O failure).

mod commands;
mod config;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sealtrail_consent::ConsentTokenAuthority;
use sealtrail_contracts::{error::SealResult, token::HumanApproval};

use commands::{Console, Context, LogArgs, Outcome, RecordArgs};
use config::CliConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Tamper-evident audit trail of consented operations.
#[derive(Parser)]
#[command(
    name = "sealtrail",
    version,
    about = "Tamper-evident, hash-chained audit trail with signed consent tokens",
    long_about = "Records operations together with HMAC-signed consent tokens in an\n\
                  append-only, SHA-256 hash-chained JSONL store, and verifies both."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(Args)]
struct GlobalArgs {
    /// Path to a sealtrail.toml configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Audit store location (overrides the config file).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Read the trust root key from this file (overrides the config file).
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Fail instead of generating an ephemeral key when none is configured.
    #[arg(long, global = true)]
    require_key: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the audit store with its genesis entry.
    Init,
    /// Issue a consent token for an operation and append it to the trail.
    Record {
        /// Operation name, e.g. `data_write`.
        operation: String,
        /// Operation data as a JSON object.
        #[arg(long)]
        payload: Option<String>,
        /// Mark the operation as having passed ethics checks.
        #[arg(long)]
        ethics_verified: bool,
        /// Human decision: `true`, `false`, or a free-text rationale.
        #[arg(long, value_parser = commands::parse_approval)]
        approval: Option<HumanApproval>,
        /// Acting principal (defaults to $USER).
        #[arg(long)]
        subject: Option<String>,
    },
    /// List entries with their token status.
    Log {
        /// Only show entries with this operation name.
        #[arg(long)]
        operation: Option<String>,
        /// Only show the last N entries.
        #[arg(long)]
        limit: Option<usize>,
        /// Include each entry's payload.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Verify the hash chain and every consent token.
    Verify {
        /// List each entry whose token fails verification.
        #[arg(long)]
        detailed: bool,
    },
    /// Write a sealed JSON snapshot of the whole trail.
    Export {
        /// Destination file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a new base64 trust root key.
    Keygen {
        /// Write the key to this file (mode 0600) instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let mut stdout = std::io::stdout().lock();
    let mut console = Console::new(&mut stdout);

    match run(cli, &mut console) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Untrusted) => ExitCode::from(1),
        Err(e) if e.is_corruption() => {
            eprintln!("sealtrail: audit store is CORRUPTED: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("sealtrail: {}", e);
            ExitCode::from(2)
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

fn run(cli: Cli, console: &mut Console<'_>) -> SealResult<Outcome> {
    let global = &cli.global;
    match cli.command {
        Command::Keygen { output } => commands::keygen(output.as_deref(), console),
        Command::Init => commands::init(&context(global)?, console),
        Command::Record { operation, payload, ethics_verified, approval, subject } => {
            let args = RecordArgs { operation, payload, ethics_verified, approval, subject };
            commands::record(&context(global)?, args, console)
        }
        Command::Log { operation, limit, verbose } => {
            commands::log(&context(global)?, LogArgs { operation, limit, verbose }, console)
        }
        Command::Verify { detailed } => commands::verify(&context(global)?, detailed, console),
        Command::Export { output } => {
            commands::export(&context(global)?, output.as_deref(), console)
        }
    }
}

/// Merge the config file with command-line overrides and build the
/// authority.
fn context(global: &GlobalArgs) -> SealResult<Context> {
    let mut config = CliConfig::load(global.config.as_deref())?;

    if let Some(store) = &global.store {
        config.store.path = store.clone();
    }
    if let Some(key_file) = &global.key_file {
        config.authority.key = None;
        config.authority.key_file = Some(key_file.clone());
    }
    if global.require_key {
        config.authority.allow_ephemeral = false;
    }

    let authority = ConsentTokenAuthority::from_config(&config.authority)?;
    debug!(
        store = %config.store.path.display(),
        key_source = ?authority.key_source(),
        "configuration loaded"
    );
    Ok(Context { store_path: config.store.path, authority })
}
