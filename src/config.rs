//! Server configuration: TOML file, then command-line overrides.

use crate::cli::DaemonOpts;
use crate::protocol::DEFAULT_PORT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub root: PathBuf,
    pub max_clients: usize, // 0 = auto
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            root: PathBuf::from("server_root"),
            max_clients: 0,
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Read `path` if given; otherwise start from the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(p) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(p)
            .with_context(|| format!("read config {}", p.display()))?;
        let cfg: ServerConfig =
            toml::from_str(&data).with_context(|| format!("parse config {}", p.display()))?;
        Ok(cfg)
    }

    /// Flags given on the command line win over the file.
    pub fn apply_overrides(&mut self, opts: &DaemonOpts) {
        if let Some(bind) = &opts.bind {
            self.bind = bind.clone();
        }
        if let Some(root) = &opts.root {
            self.root = root.clone();
        }
        if let Some(n) = opts.max_clients {
            self.max_clients = n;
        }
        if let Some(log) = &opts.log_file {
            self.log_file = Some(log.clone());
        }
    }

    pub fn effective_max_clients(&self) -> usize {
        if self.max_clients == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_clients
        }
    }
}
