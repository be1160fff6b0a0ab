//! Diagnostic output through `tracing`

use anyhow::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{prelude::*, EnvFilter};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Environment variable that overrides the verbosity flags
const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// Level for our own crate from `-v`/`-q` style flags.
pub fn trace_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Use `RUST_LOG` if set; otherwise log only lptf items at `level`.
fn filter_for(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_env(STANDARD_ENV_VAR).or_else(|e| {
        if std::env::var(STANDARD_ENV_VAR).is_ok() {
            anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was not understood: {e}");
        }
        EnvFilter::try_new(format!("lptf={level}")).context("building log filter")
    })
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn setup(level: &str) -> anyhow::Result<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::Relaxed) {
        return Ok(());
    }
    let filter = filter_for(level)?;
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}
