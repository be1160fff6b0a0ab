//! Error taxonomy shared by the codec, transfer engine, sandbox and server

use crate::protocol::{error_code, packet_type};
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LptfError>;

#[derive(Debug, Error)]
pub enum LptfError {
    /// Malformed or truncated frame. Fatal to the connection.
    #[error("framing error: {0}")]
    Framing(String),

    /// Frame is well formed but its payload does not fit the expected message.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Unexpected packet type for the current state.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("path escapes user root: {0}")]
    SandboxViolation(String),

    #[error("transfer size mismatch: expected {expected} bytes, got {actual}")]
    TransferSizeMismatch { expected: u64, actual: u64 },

    #[error("login rejected: {0}")]
    Auth(String),

    /// ERROR packet received from the peer.
    #[error("{message}")]
    Remote {
        refers_to: u8,
        code: u8,
        message: String,
    },

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}

impl LptfError {
    pub fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPacket(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn unexpected(expected: u8, got: u8) -> Self {
        Self::Protocol(format!(
            "expected {} packet, got {} ({})",
            packet_type::name(expected),
            packet_type::name(got),
            got
        ))
    }

    /// Wire error code used when this failure is reported to the peer.
    pub fn error_code(&self) -> u8 {
        match self {
            Self::Protocol(_) | Self::MalformedPacket(_) | Self::Framing(_) => {
                error_code::CMD_UNKNOWN
            }
            Self::Remote { code, .. } => *code,
            _ => error_code::CMD_FAILURE,
        }
    }

    /// Failures after which the connection cannot carry another frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::Io(_))
    }
}
