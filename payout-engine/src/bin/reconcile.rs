//! Payout reconciliation binary
//!
//! Recomputes every vendor's statement from a JSON ledger snapshot and prints
//! the statements as JSON, followed by Prometheus metrics text.
//!
//! ```text
//! payout-reconcile <snapshot.json> [config.toml]
//! ```
//!
//! Without a config file, configuration comes from `PAYOUT_*` variables.
//! `PAYOUT_AS_OF=YYYY-MM-DD` pins the reconciliation date.

use anyhow::{bail, Context};
use chrono::{NaiveDate, TimeZone, Utc};
use ledger_core::{LedgerSnapshot, MemoryStore};
use payout_engine::{Clock, Config, FixedClock, PayoutEngine, SystemClock};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(snapshot_path) = args.next() else {
        bail!("usage: payout-reconcile <snapshot.json> [config.toml]");
    };
    let config = match args.next() {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };
    let clock = clock_from_env()?;

    tracing::info!(service = %config.service_name, snapshot = %snapshot_path, "Starting reconciliation");

    let metrics_enabled = config.metrics_enabled;
    let output = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let snapshot = LedgerSnapshot::from_json_file(&snapshot_path)
            .with_context(|| format!("reading snapshot {}", snapshot_path))?;
        let store = Arc::new(MemoryStore::from_snapshot(snapshot).context("loading snapshot")?);
        let engine = PayoutEngine::new(config, store, clock).context("building engine")?;

        let statements = engine.statements().context("computing statements")?;
        tracing::info!(vendors = statements.len(), "Reconciliation complete");

        let mut output = serde_json::to_string_pretty(&statements)?;
        if metrics_enabled {
            output.push('\n');
            output.push_str(&engine.metrics().render()?);
        }
        Ok(output)
    })
    .await??;

    println!("{}", output);
    Ok(())
}

fn clock_from_env() -> anyhow::Result<Arc<dyn Clock>> {
    match std::env::var("PAYOUT_AS_OF") {
        Ok(value) => {
            let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid PAYOUT_AS_OF '{}'", value))?;
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .context("PAYOUT_AS_OF out of range")?;
            Ok(Arc::new(FixedClock::new(Utc.from_utc_datetime(&midnight))))
        }
        Err(_) => Ok(Arc::new(SystemClock)),
    }
}
