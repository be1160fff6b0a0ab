//! Clap option structs for `lptfd` and `lptf`

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// LPTF server daemon
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "LPTF file-transfer server")]
pub struct DaemonOpts {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bind address (host:port) [default: 0.0.0.0:12345]
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory holding one sandbox per user [default: server_root]
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Worker threads, i.e. concurrent clients (0 = auto)
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Append a session log to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// More diagnostics (repeat for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long)]
    pub quiet: bool,
}

/// LPTF command-line client
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "LPTF file-transfer client")]
pub struct ClientOpts {
    /// Server as user@host:port (host and port optional)
    pub server: String,

    /// Account password
    #[arg(long, env = "LPTF_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Hide transfer progress bars
    #[arg(long)]
    pub no_progress: bool,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub verb: Verb,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Verb {
    /// Send a local file to the server
    Upload {
        local: PathBuf,
        /// Destination path under your root (defaults to the file name)
        remote: Option<String>,
    },
    /// Fetch a file from the server
    Download {
        remote: String,
        /// Local destination (defaults to the remote file name)
        local: Option<PathBuf>,
    },
    /// Delete a remote file
    Delete { remote: String },
    /// List a remote directory
    List {
        #[arg(default_value = "")]
        path: String,
    },
    /// Create a directory NAME inside PARENT
    Mkdir {
        name: String,
        #[arg(default_value = "")]
        parent: String,
    },
    /// Remove a remote directory and its contents
    Rmdir { path: String },
    /// Rename a remote directory
    Rename { path: String, newname: String },
    /// Print every path under your root
    Tree,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_args_parse() {
        let o = ClientOpts::parse_from([
            "lptf",
            "alice@example.org:2000",
            "--password",
            "pw",
            "mkdir",
            "photos",
        ]);
        assert_eq!(o.server, "alice@example.org:2000");
        assert_eq!(o.password, "pw");
        match o.verb {
            Verb::Mkdir { name, parent } => {
                assert_eq!(name, "photos");
                assert_eq!(parent, "");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn daemon_flags_are_optional() {
        let o = DaemonOpts::parse_from(["lptfd"]);
        assert!(o.bind.is_none() && o.root.is_none() && o.max_clients.is_none());
        let o = DaemonOpts::parse_from(["lptfd", "-vv", "--root", "/srv"]);
        assert_eq!(o.verbose, 2);
        assert_eq!(o.root, Some(PathBuf::from("/srv")));
    }
}
