use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use lptf::cli::DaemonOpts;
use lptf::config::ServerConfig;
use lptf::logger::{Logger, NoopLogger, TextLogger};
use lptf::server::Server;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();
    lptf::logging::setup(lptf::logging::trace_level(opts.verbose, opts.quiet))?;

    ctrlc::set_handler(move || {
        tracing::info!("interrupted, shutting down");
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    let mut config = ServerConfig::load(opts.config.as_deref())?;
    config.apply_overrides(&opts);

    let logger: Arc<dyn Logger> = match &config.log_file {
        Some(p) => Arc::new(
            TextLogger::new(p).with_context(|| format!("open log file {}", p.display()))?,
        ),
        None => Arc::new(NoopLogger),
    };

    if config.bind.starts_with("0.0.0.0") {
        tracing::warn!(
            "binding to {} exposes the server on every interface; passwords travel in plain text",
            config.bind
        );
    }

    let server = Server::bind(&config, logger)?;
    server.run()
}
