//! Connection dispatcher
//!
//! The accept loop runs on the calling thread and hands each socket to the
//! worker pool. A worker then owns the connection end to end:
//! login, exactly one command, close.

use crate::actions::{self, UserSession};
use crate::auth::{CredentialStore, LoginOutcome};
use crate::command::Command;
use crate::config::ServerConfig;
use crate::error::{LptfError, Result};
use crate::logger::Logger;
use crate::message::{self, Message};
use crate::net::{self, PacketStream};
use crate::pool::ThreadPool;
use crate::protocol::{error_code, packet_type, status};
use crate::sandbox::{self, Sandbox};
use anyhow::Context;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

/// State shared by every worker.
pub struct ServerContext {
    pub sandbox: Sandbox,
    pub credentials: CredentialStore,
    pub logger: Arc<dyn Logger>,
}

impl ServerContext {
    pub fn new(config: &ServerConfig, logger: Arc<dyn Logger>) -> anyhow::Result<Self> {
        let sandbox = Sandbox::new(&config.root)
            .with_context(|| format!("prepare server root {}", config.root.display()))?;
        let credentials = CredentialStore::open(sandbox.server_root())
            .context("load credential store")?;
        Ok(Self {
            sandbox,
            credentials,
            logger,
        })
    }
}

pub struct Server {
    listener: TcpListener,
    pool: ThreadPool,
    ctx: Arc<ServerContext>,
}

impl Server {
    pub fn bind(config: &ServerConfig, logger: Arc<dyn Logger>) -> anyhow::Result<Self> {
        let ctx = ServerContext::new(config, logger)?;
        let listener =
            TcpListener::bind(&config.bind).with_context(|| format!("bind {}", config.bind))?;
        let pool = ThreadPool::new(config.effective_max_clients());
        Ok(Self {
            listener,
            pool,
            ctx: Arc::new(ctx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Accept forever. Connections wait in the pool queue when every worker is busy.
    pub fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            "lptf server listening on {} root={} workers={}",
            self.local_addr()?,
            self.ctx.sandbox.server_root().display(),
            self.pool.size()
        );
        for conn in self.listener.incoming() {
            match conn {
                Ok(mut stream) => {
                    net::tune_socket(&stream);
                    let peer = net::peer_label(&stream);
                    tracing::debug!("conn from {}", peer);
                    let ctx = Arc::clone(&self.ctx);
                    self.pool.execute(move || {
                        if let Err(e) = handle_client(&mut stream, &peer, &ctx) {
                            tracing::warn!("{}: {}", peer, e);
                        }
                        tracing::debug!("{} closed", peer);
                    });
                }
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Serve one connection: login, one command.
pub fn handle_client<S: PacketStream + ?Sized>(
    stream: &mut S,
    peer: &str,
    ctx: &ServerContext,
) -> Result<()> {
    let (username, root) = login(stream, peer, ctx)?;
    let session = UserSession {
        username,
        root,
        sandbox: &ctx.sandbox,
        logger: ctx.logger.as_ref(),
    };

    let packet = stream.read_packet()?;
    if packet.packet_type() != packet_type::COMMAND {
        stream.send_error(
            packet.packet_type(),
            error_code::CMD_UNKNOWN,
            status::NOT_IMPLEMENTED,
        );
        return Err(LptfError::unexpected(packet_type::COMMAND, packet.packet_type()));
    }
    let command = match Command::from_packet(&packet) {
        Ok(c) => c,
        Err(e) => {
            stream.send_error(
                packet_type::COMMAND,
                error_code::CMD_UNKNOWN,
                status::NOT_IMPLEMENTED,
            );
            return Err(e);
        }
    };
    tracing::info!("{} ({}): {}", session.username, peer, command);
    actions::execute(stream, &session, &command)
}

/// LOGIN(user), then PASSWORD / NEW PASSWORD, then MESSAGE(password), then OK.
/// One attempt per connection.
fn login<S: PacketStream + ?Sized>(
    stream: &mut S,
    peer: &str,
    ctx: &ServerContext,
) -> Result<(String, std::path::PathBuf)> {
    let fail = |stream: &mut S, err: LptfError| -> LptfError {
        stream.send_error(packet_type::LOGIN, error_code::CMD_FAILURE, &err.to_string());
        err
    };

    let packet = stream.read_packet()?;
    let username = match Message::from_packet(&packet) {
        Ok(Message::Login { username }) => username,
        Ok(_) | Err(_) => {
            stream.send_error(
                packet.packet_type(),
                error_code::CMD_UNKNOWN,
                "expected LOGIN",
            );
            return Err(LptfError::unexpected(packet_type::LOGIN, packet.packet_type()));
        }
    };
    if let Err(e) = sandbox::validate_username(&username) {
        ctx.logger.login(peer, &username, "rejected");
        return Err(fail(stream, e));
    }

    let prompt = if ctx.credentials.is_known(&username) {
        message::build_status_reply(packet_type::LOGIN, status::PASSWORD)?
    } else {
        message::build_message(status::NEW_PASSWORD)?
    };
    stream.write_packet(&prompt)?;

    let packet = match stream.read_packet() {
        Ok(p) => p,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => return Err(fail(stream, e)),
    };
    let password = match Message::from_packet(&packet) {
        Ok(Message::Text(password)) => password,
        Ok(_) => {
            let e = LptfError::unexpected(packet_type::MESSAGE, packet.packet_type());
            return Err(fail(stream, e));
        }
        Err(e) => return Err(fail(stream, e)),
    };

    let outcome = match ctx.credentials.check_or_register(&username, &password) {
        Ok(o) => o,
        Err(e) => {
            ctx.logger.login(peer, &username, "bad password");
            tracing::warn!("{}: login failed for {}", peer, username);
            return Err(fail(stream, e));
        }
    };
    let root = ctx.sandbox.root_for(&username).map_err(|e| fail(stream, e))?;
    stream.write_packet(&message::build_status_reply(packet_type::LOGIN, status::OK)?)?;

    let outcome = match outcome {
        LoginOutcome::Verified => "verified",
        LoginOutcome::Registered => "registered",
    };
    ctx.logger.login(peer, &username, outcome);
    tracing::debug!("{}: {} logged in ({})", peer, username, outcome);
    Ok((username, root))
}
