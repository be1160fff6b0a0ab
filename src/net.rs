//! Raw transport: moves whole frames over a byte stream.
//!
//! `read_packet` blocks until a complete frame has arrived (or the stream
//! fails), so everything above this layer works on one packet per call.

use crate::error::{LptfError, Result};
use crate::message::{self, Message};
use crate::packet::{Header, Packet};
use crate::protocol::HEADER_LEN;
use std::io::{Read, Write};
use std::net::TcpStream;

pub trait PacketStream {
    fn read_packet(&mut self) -> Result<Packet>;
    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Read and decode in one step.
    fn read_message(&mut self) -> Result<Message> {
        let packet = self.read_packet()?;
        Message::from_packet(&packet)
    }

    /// Best-effort ERROR packet; the send itself failing is only logged.
    fn send_error(&mut self, refers_to: u8, code: u8, msg: &str) {
        let sent = message::build_error(refers_to, code, msg).and_then(|p| self.write_packet(&p));
        if let Err(e) = sent {
            tracing::debug!("could not deliver error packet ({msg}): {e}");
        }
    }
}

impl<S: Read + Write> PacketStream for S {
    fn read_packet(&mut self) -> Result<Packet> {
        let mut hdr = [0u8; HEADER_LEN];
        self.read_exact(&mut hdr)?;
        let header = Header::from_bytes(hdr);
        let mut content = vec![0u8; header.length as usize];
        self.read_exact(&mut content)?;
        let packet = Packet::with_reserved(header.packet_type, header.reserved, content)?;
        tracing::trace!(
            "recv type={} len={}",
            packet.packet_type(),
            packet.len()
        );
        Ok(packet)
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        tracing::trace!(
            "send type={} len={}",
            packet.packet_type(),
            packet.len()
        );
        self.write_all(&packet.encode())?;
        self.flush()?;
        Ok(())
    }
}

/// Disable Nagle: every exchange is one small frame followed by a wait.
pub fn tune_socket(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);
}

/// Peer address as text, "unknown" if the socket no longer has one.
pub fn peer_label(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Expect a REPLY, surfacing an ERROR from the peer as `Remote`.
pub fn expect_reply<S: PacketStream + ?Sized>(stream: &mut S, refers_to: u8) -> Result<Vec<u8>> {
    match stream.read_message()? {
        Message::Reply {
            refers_to: r,
            content,
        } if r == refers_to => Ok(content),
        Message::Reply { refers_to: r, .. } => Err(LptfError::protocol(format!(
            "reply refers to type {r}, expected {refers_to}"
        ))),
        m @ Message::Error { .. } => Err(m
            .into_remote_error()
            .unwrap_or_else(|| LptfError::protocol("error packet"))),
        other => Err(LptfError::protocol(format!(
            "expected reply, got {other:?}"
        ))),
    }
}
