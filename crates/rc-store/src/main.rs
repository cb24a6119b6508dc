//! RC ledger replay tool
//!
//! Applies a JSON list of scheduled operations to a sled-backed ledger.
//!
//! ## Usage
//!
//! ```bash
//! # Replay operations into the default store
//! rc-replay --ops ops.json
//!
//! # Use a config file and dump the resulting state
//! rc-replay --config rc.toml --ops ops.json --dump state.json
//!
//! # Seed a scratch store from a snapshot, replay, and audit
//! rc-replay --temporary --restore state.json --ops ops.json --audit
//! ```
//!
//! ## Operations File
//!
//! ```json
//! [
//!   { "time": 0, "op": { "type": "create_account", "account": "alice", "stake": 90 } },
//!   { "time": 5, "op": { "type": "delegate_capacity", "from": "alice", "to": "bob", "amount": 10 } }
//! ]
//! ```
//!
//! Rejected operations are logged and skipped. Fatal errors stop the replay.

use anyhow::{bail, Context};
use clap::Parser;
use rc_core::{ChainContext, LedgerSnapshot, RcLedger, ScheduledOperation};
use rc_store::{Config, SledStore};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rc-replay")]
#[command(about = "Replay RC operations against a sled-backed ledger")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sled database path
    #[arg(long, env = "RC_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Use a throwaway database
    #[arg(long)]
    temporary: bool,

    /// Snapshot JSON to load before replaying
    #[arg(long)]
    restore: Option<PathBuf>,

    /// JSON file with scheduled operations
    #[arg(long)]
    ops: Option<PathBuf>,

    /// Write the final snapshot to this file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Check ledger invariants after replay
    #[arg(long)]
    audit: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rc_store=info".parse()?)
                .add_directive("rc_replay=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        Config::default()
    };

    if let Some(path) = args.db_path {
        config.store.db_path = path;
    }
    if args.temporary {
        config.store.temporary = true;
    }

    info!(
        db_path = %config.store.db_path.display(),
        regen_time_secs = config.params.regen_time_secs,
        "Starting rc-replay"
    );

    let mut store = SledStore::open(&config.store)?;

    if let Some(path) = &args.restore {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot = LedgerSnapshot::from_json(&json)?;
        snapshot.restore_into(&mut store)?;
        info!(
            path = %path.display(),
            accounts = snapshot.accounts.len(),
            delegations = snapshot.delegations.len(),
            "Restored snapshot"
        );
    }

    let scheduled: Vec<ScheduledOperation> = match &args.ops {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading operations {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing operations {}", path.display()))?
        }
        None => Vec::new(),
    };

    let mut ledger = RcLedger::new(store);
    let mut applied = 0usize;
    let mut rejected = 0usize;
    let mut last_time = None;

    for (index, entry) in scheduled.iter().enumerate() {
        let ctx = ChainContext::new(entry.time, &config.params);
        match ledger.apply(&ctx, &entry.op) {
            Ok(outcome) => {
                applied += 1;
                info!(
                    index,
                    time = entry.time,
                    kind = entry.op.kind(),
                    account = %entry.op.account(),
                    outcome = ?outcome,
                    "Applied operation"
                );
            }
            Err(e) if e.is_fatal() => {
                error!(index, time = entry.time, kind = entry.op.kind(), error = %e, "Replay halted");
                return Err(e).context(format!("operation {} at time {}", index, entry.time));
            }
            Err(e) => {
                rejected += 1;
                warn!(index, time = entry.time, kind = entry.op.kind(), error = %e, "Operation rejected");
            }
        }
        last_time = Some(entry.time);
    }

    let store = ledger.into_inner();
    store.flush()?;

    let mut snapshot = LedgerSnapshot::capture(&store)?;
    if let Some(time) = last_time {
        snapshot = snapshot.at(time);
    }

    info!(
        applied,
        rejected,
        accounts = store.account_count(),
        delegations = store.delegation_count(),
        "Replay complete"
    );

    if let Some(path) = &args.dump {
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), "Wrote snapshot");
    }

    if args.audit {
        if let Err(violations) = snapshot.audit() {
            for violation in &violations {
                error!(%violation, "Invariant violation");
            }
            bail!("audit found {} invariant violations", violations.len());
        }
        info!("Audit passed");
    }

    Ok(())
}
