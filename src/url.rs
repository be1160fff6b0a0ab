//! Server address parsing for `user@host:port`

use crate::protocol::DEFAULT_PORT;

const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// `host:port` suitable for `TcpStream::connect`
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Parse `user@host:port`. Host and port may be left out (`alice@`,
/// `alice@host`, `alice@:4000`); IPv6 hosts go in brackets.
pub fn parse_server_address(s: &str) -> Option<ServerAddress> {
    let s = s.trim();
    let s = s.strip_prefix("lptf://").unwrap_or(s);
    let (user, hp) = s.rsplit_once('@')?;
    if user.is_empty() {
        return None;
    }

    let (host, port) = if let Some(rest) = hp.strip_prefix('[') {
        let (h, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return None,
        };
        (h.to_string(), port)
    } else {
        match hp.split_once(':') {
            Some((h, p)) => (h.to_string(), p.parse().ok()?),
            None => (hp.to_string(), DEFAULT_PORT),
        }
    };

    Some(ServerAddress {
        user: user.to_string(),
        host: if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host
        },
        port,
    })
}
