//! lptf - command-line client for the LPTF file-transfer server
//!
//! Each invocation opens one connection, logs in and runs one verb.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use lptf::cli::{ClientOpts, Verb};
use lptf::client::{self, ActionStatus};
use lptf::progress::{NoProgress, Progress, TransferBar};
use lptf::url::parse_server_address;

fn main() -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    let opts = ClientOpts::parse();
    lptf::logging::setup(lptf::logging::trace_level(opts.verbose, opts.quiet))?;

    let addr = parse_server_address(&opts.server)
        .with_context(|| format!("bad server address {:?} (want user@host:port)", opts.server))?;
    let mut stream = client::connect(&addr)
        .with_context(|| format!("connect to {}", addr.socket_addr()))?;
    client::login(&mut stream, &addr.user, &opts.password)
        .with_context(|| format!("login as {}", addr.user))?;

    let status = run_verb(&mut stream, &opts)?;
    if status.ok {
        println!("{}", status.message);
        Ok(())
    } else {
        anyhow::bail!("{}", status.message)
    }
}

fn run_verb(stream: &mut std::net::TcpStream, opts: &ClientOpts) -> Result<ActionStatus> {
    let status = match &opts.verb {
        Verb::Upload { local, remote } => {
            let remote = match remote {
                Some(r) => r.clone(),
                None => file_name(local)?,
            };
            let bar = progress_for(opts, &format!("upload {remote}"));
            client::upload(stream, &remote, local, bar.as_ref())
        }
        Verb::Download { remote, local } => {
            let local = match local {
                Some(l) => l.clone(),
                None => PathBuf::from(file_name(Path::new(remote))?),
            };
            let bar = progress_for(opts, &format!("download {remote}"));
            client::download(stream, &local, remote, bar.as_ref())
        }
        Verb::Delete { remote } => client::delete(stream, remote),
        Verb::List { path } => client::list(stream, path),
        Verb::Mkdir { name, parent } => client::mkdir(stream, name, parent),
        Verb::Rmdir { path } => client::rmdir(stream, path),
        Verb::Rename { path, newname } => client::rename(stream, path, newname),
        Verb::Tree => client::tree(stream),
    };
    Ok(status)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

fn progress_for(opts: &ClientOpts, label: &str) -> Box<dyn Progress> {
    if opts.no_progress || opts.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(TransferBar::new(label))
    }
}
