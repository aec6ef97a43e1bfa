//! Command implementations.
//!
//! Each command writes its human-readable output to a caller-supplied sink
//! and returns an [`Outcome`]; `main` maps that to the process exit status.

use std::{
    fmt::Display,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use sealtrail_audit::{AuditTrail, ChainedEntry};
use sealtrail_consent::{generate_trust_root_key, ConsentTokenAuthority, DEFAULT_KEY_ENV};
use sealtrail_contracts::{
    error::{SealError, SealResult},
    token::{HumanApproval, Payload, DEFAULT_SUBJECT},
};
use sealtrail_verify::IntegrityVerifier;

/// Hex characters of a signature shown in listings.
const SIGNATURE_PREVIEW: usize = 12;

const RULE: &str = "================================================================";

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The trail was read but is not trustworthy.
    Untrusted,
}

/// Everything the store-facing commands need.
pub struct Context {
    pub store_path: PathBuf,
    pub authority: ConsentTokenAuthority,
}

impl Context {
    /// Open the store, creating it with a genesis entry if needed.
    fn open(&self) -> SealResult<AuditTrail> {
        AuditTrail::open_or_initialize(&self.store_path, &self.authority)
    }

    /// Open a store that must already exist, without writing to it.
    ///
    /// A wiped (zero-byte) store is `SealError::CorruptedStore`, never
    /// re-initialized.
    fn open_existing(&self) -> SealResult<AuditTrail> {
        if !self.store_path.exists() {
            return Err(SealError::StorageError {
                reason: format!(
                    "no audit trail at '{}'; run `sealtrail init` first",
                    self.store_path.display()
                ),
            });
        }
        AuditTrail::open_existing(&self.store_path)
    }

    /// Open the store for appending, creating it only if it does not exist.
    fn open_for_append(&self) -> SealResult<AuditTrail> {
        if self.store_path.exists() {
            self.open_existing()
        } else {
            self.open()
        }
    }
}

/// Line-oriented output sink.
pub struct Console<'a> {
    out: &'a mut dyn Write,
}

impl<'a> Console<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    fn line(&mut self, text: impl Display) -> SealResult<()> {
        writeln!(self.out, "{}", text).map_err(|e| SealError::StorageError {
            reason: format!("failed to write output: {}", e),
        })
    }

    fn blank(&mut self) -> SealResult<()> {
        self.line("")
    }
}

// ── init ──────────────────────────────────────────────────────────────────────

pub fn init(ctx: &Context, console: &mut Console<'_>) -> SealResult<Outcome> {
    let existed = ctx.store_path.exists();
    let trail = ctx.open()?;

    if existed && trail.entry_count() > 1 {
        console.line(format_args!(
            "Audit trail already initialized at {} ({} entries).",
            trail.describe(),
            trail.entry_count()
        ))?;
        return Ok(Outcome::Success);
    }

    console.line(format_args!("Initialized audit trail at {}", trail.describe()))?;
    console.line(format_args!("Entry count: {}", trail.entry_count()))?;
    console.line(format_args!("Genesis hash: {}", trail.last_hash()))?;
    if ctx.authority.key_source().is_ephemeral() {
        console.line(format_args!(
            "WARNING: using an ephemeral key; set {} or configure a key file so \
             tokens stay verifiable.",
            DEFAULT_KEY_ENV
        ))?;
    }
    Ok(Outcome::Success)
}

// ── record ────────────────────────────────────────────────────────────────────

/// Arguments of `sealtrail record`.
#[derive(Debug, Clone)]
pub struct RecordArgs {
    pub operation: String,
    pub payload: Option<String>,
    pub ethics_verified: bool,
    pub approval: Option<HumanApproval>,
    pub subject: Option<String>,
}

/// Interpret `--approval`: `true`/`false` are decisions, anything else is a
/// free-text rationale.
pub fn parse_approval(raw: &str) -> Result<HumanApproval, String> {
    match raw.trim() {
        "" => Err("approval must not be empty".to_string()),
        "true" => Ok(HumanApproval::Decision(true)),
        "false" => Ok(HumanApproval::Decision(false)),
        text => Ok(HumanApproval::Rationale(text.to_string())),
    }
}

fn parse_payload(raw: Option<&str>) -> SealResult<Payload> {
    let Some(raw) = raw else {
        return Ok(Payload::new());
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(SealError::ConfigError {
            reason: "payload must be a JSON object".to_string(),
        }),
        Err(e) => Err(SealError::ConfigError {
            reason: format!("payload is not valid JSON: {}", e),
        }),
    }
}

fn default_subject() -> String {
    std::env::var("USER").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string())
}

pub fn record(ctx: &Context, args: RecordArgs, console: &mut Console<'_>) -> SealResult<Outcome> {
    let payload = parse_payload(args.payload.as_deref())?;
    let subject = args.subject.unwrap_or_else(default_subject);

    let trail = ctx.open_for_append()?;
    let token = ctx
        .authority
        .issue(&args.operation, args.ethics_verified, args.approval, &subject)?;
    let entry = trail.append(&args.operation, payload, token)?;

    console.line(format_args!(
        "Recorded entry {} ({}) in {}",
        entry.sequence_number(),
        entry.operation(),
        trail.describe()
    ))?;
    console.line(format_args!("Entry hash: {}", entry.entry_hash()))?;
    print_token_summary(ctx, &entry, console)?;
    Ok(Outcome::Success)
}

fn print_token_summary(
    ctx: &Context,
    entry: &ChainedEntry,
    console: &mut Console<'_>,
) -> SealResult<()> {
    let token = entry.consent_token();
    console.blank()?;
    console.line(RULE)?;
    console.line("CONSENT TOKEN")?;
    console.line(RULE)?;
    console.line(format_args!("Operation:        {}", token.operation))?;
    console.line(format_args!("Ethics Verified:  {}", token.ethics_verified))?;
    console.line(format_args!("Human Approval:   {}", approval_label(&token.human_approval)))?;
    console.line(format_args!("Issued At:        {}", token.issued_at.to_rfc3339()))?;
    console.line(format_args!("Subject:          {}", token.subject))?;
    console.line(format_args!("Signature:        {}", token.truncated_signature(SIGNATURE_PREVIEW)))?;
    console.line(format_args!("Status:           {}", validity_label(ctx.authority.verify(token))))?;
    console.line(RULE)
}

fn approval_label(approval: &Option<HumanApproval>) -> String {
    approval
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

fn validity_label(valid: bool) -> &'static str {
    if valid {
        "VALID"
    } else {
        "INVALID"
    }
}

// ── log ───────────────────────────────────────────────────────────────────────

/// Arguments of `sealtrail log`.
#[derive(Debug, Clone, Default)]
pub struct LogArgs {
    pub operation: Option<String>,
    pub limit: Option<usize>,
    pub verbose: bool,
}

pub fn log(ctx: &Context, args: LogArgs, console: &mut Console<'_>) -> SealResult<Outcome> {
    let trail = ctx.open_existing()?;

    let mut entries = match &args.operation {
        Some(name) => trail.filter_by_operation(name)?,
        None => trail.read_all()?,
    };
    if let Some(limit) = args.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    console.line(format_args!("AUDIT TRAIL {}", trail.describe()))?;
    console.line(RULE)?;
    if let Some(name) = &args.operation {
        console.line(format_args!("Operation filter: {}", name))?;
    }
    console.line(format_args!("Showing {} entries", entries.len()))?;
    console.blank()?;

    for entry in &entries {
        let token = entry.consent_token();
        console.line(format_args!("[{}] {}", entry.sequence_number(), entry.operation()))?;
        console.line(format_args!("  Timestamp:       {}", entry.timestamp().to_rfc3339()))?;
        console.line(format_args!("  Subject:         {}", token.subject))?;
        console.line(format_args!("  Ethics Verified: {}", token.ethics_verified))?;
        console.line(format_args!("  Human Approval:  {}", approval_label(&token.human_approval)))?;
        console.line(format_args!(
            "  Token:           {}",
            validity_label(ctx.authority.verify(token))
        ))?;
        console.line(format_args!(
            "  Signature:       {}",
            token.truncated_signature(SIGNATURE_PREVIEW)
        ))?;
        if args.verbose {
            let pretty = serde_json::to_string_pretty(entry.payload()).map_err(|e| {
                SealError::Serialization {
                    reason: format!("failed to render payload: {}", e),
                }
            })?;
            console.line(format_args!("  Payload:         {}", pretty))?;
        }
        console.blank()?;
    }
    Ok(Outcome::Success)
}

// ── verify ────────────────────────────────────────────────────────────────────

pub fn verify(ctx: &Context, detailed: bool, console: &mut Console<'_>) -> SealResult<Outcome> {
    let trail = ctx.open_existing()?;
    let report = IntegrityVerifier::new().audit(&trail, &ctx.authority)?;

    console.line(format_args!("VERIFYING AUDIT TRAIL {}", trail.describe()))?;
    console.line(RULE)?;
    console.line(format_args!("Entries: {}", report.tokens.entries_checked))?;
    console.blank()?;

    match &report.chain.failure {
        None => console.line(format_args!(
            "Hash chain:     valid ({} entries)",
            report.chain.entries_checked
        ))?,
        Some(failure) => console.line(format_args!(
            "Hash chain:     INVALID at entry {} ({}): {}",
            failure.index, failure.kind, failure.message
        ))?,
    }

    let invalid = &report.tokens.invalid_indices;
    if invalid.is_empty() {
        console.line(format_args!(
            "Consent tokens: all {} valid",
            report.tokens.entries_checked
        ))?;
    } else {
        console.line(format_args!(
            "Consent tokens: {} INVALID, at entries {:?}",
            invalid.len(),
            invalid
        ))?;
        if detailed {
            for index in invalid {
                console.line(format_args!("  entry {}: invalid token signature", index))?;
            }
        }
    }

    console.blank()?;
    if report.is_trusted() {
        console.line("Result: TRUSTED")?;
        Ok(Outcome::Success)
    } else {
        console.line("Result: NOT TRUSTED")?;
        Ok(Outcome::Untrusted)
    }
}

// ── export ────────────────────────────────────────────────────────────────────

pub fn export(ctx: &Context, output: Option<&Path>, console: &mut Console<'_>) -> SealResult<Outcome> {
    let trail = ctx.open_existing()?;
    let snapshot = trail.export()?;
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| SealError::Serialization {
        reason: format!("failed to serialize export: {}", e),
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, json + "\n").map_err(|e| SealError::StorageError {
                reason: format!("failed to write export '{}': {}", path.display(), e),
            })?;
            console.line(format_args!(
                "Exported {} entries to {} (terminal hash {})",
                snapshot.entries.len(),
                path.display(),
                snapshot.terminal_hash
            ))?;
        }
        None => console.line(json)?,
    }
    Ok(Outcome::Success)
}

// ── keygen ────────────────────────────────────────────────────────────────────

pub fn keygen(output: Option<&Path>, console: &mut Console<'_>) -> SealResult<Outcome> {
    let encoded = STANDARD.encode(generate_trust_root_key());

    match output {
        Some(path) => {
            write_secret_key(path, &encoded)?;
            console.line(format_args!("Trust root key written to {}", path.display()))?;
            console.line("Reference it from sealtrail.toml:")?;
            console.line("  [authority]")?;
            console.line(format_args!("  key_file = \"{}\"", path.display()))?;
        }
        None => {
            console.line(&encoded)?;
            console.blank()?;
            console.line(format_args!("export {}={}", DEFAULT_KEY_ENV, encoded))?;
        }
    }
    Ok(Outcome::Success)
}

/// Create `path` owner-read/write only.  Never overwrites an existing key.
fn write_secret_key(path: &Path, encoded: &str) -> SealResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| SealError::StorageError {
        reason: format!("failed to create key file '{}': {}", path.display(), e),
    })?;
    file.write_all(encoded.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.sync_all())
        .map_err(|e| SealError::StorageError {
            reason: format!("failed to write key file '{}': {}", path.display(), e),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
