//! Chunked stop-and-wait byte streaming
//!
//! Shared by file download (server sends), file upload (client sends) and
//! directory-tree streaming (server sends). The sender writes one
//! BINARY_PART chunk and blocks for its one-byte REPLY before reading the
//! next one from its source; there is never more than one chunk in flight.
//!
//! Two termination rules exist and both must be kept:
//! - sized transfers run until `bytes_transferred >= total_expected_bytes`;
//!   ending on any other count is a `TransferSizeMismatch`.
//! - tree transfers run until a chunk strictly shorter than the chunk limit
//!   arrives. The sender therefore ends a listing whose length is a multiple
//!   of the limit with an empty chunk.

use crate::error::{LptfError, Result};
use crate::message;
use crate::net::PacketStream;
use crate::progress::Progress;
use crate::protocol::{packet_type, MAX_CONTENT_LEN};
use std::io::{self, Read, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    Requesting,
    AwaitingAck,
    Streaming,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Stop once this many bytes have moved
    Sized(u64),
    /// Stop after the first chunk shorter than the chunk limit
    ShortChunk,
}

/// Book-keeping for one transfer; lives only as long as the command.
#[derive(Debug)]
pub struct TransferSession {
    termination: Termination,
    chunk_limit: usize,
    bytes_transferred: u64,
    chunks: u64,
    state: TransferState,
}

impl TransferSession {
    pub fn new(termination: Termination, chunk_limit: usize) -> Result<Self> {
        if chunk_limit == 0 || chunk_limit > MAX_CONTENT_LEN {
            return Err(LptfError::protocol(format!(
                "chunk limit {chunk_limit} outside 1..={MAX_CONTENT_LEN}"
            )));
        }
        Ok(Self {
            termination,
            chunk_limit,
            bytes_transferred: 0,
            chunks: 0,
            state: TransferState::Requesting,
        })
    }

    pub fn total_expected_bytes(&self) -> Option<u64> {
        match self.termination {
            Termination::Sized(total) => Some(total),
            Termination::ShortChunk => None,
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn chunk_limit(&self) -> usize {
        self.chunk_limit
    }

    /// Bytes the sender should put in its next chunk.
    fn next_chunk_len(&self) -> usize {
        match self.termination {
            Termination::Sized(total) => {
                let remaining = total.saturating_sub(self.bytes_transferred);
                remaining.min(self.chunk_limit as u64) as usize
            }
            Termination::ShortChunk => self.chunk_limit,
        }
    }

    fn record(&mut self, n: usize) {
        self.bytes_transferred += n as u64;
        self.chunks += 1;
    }

    /// Whether another chunk follows the one just handled.
    fn wants_more(&self, last_len: usize) -> bool {
        match self.termination {
            Termination::Sized(total) => self.bytes_transferred < total,
            Termination::ShortChunk => last_len >= self.chunk_limit,
        }
    }

    fn fail(&mut self, err: LptfError) -> LptfError {
        self.state = TransferState::Failed;
        err
    }

    fn finish(&mut self) -> Result<u64> {
        if let Termination::Sized(total) = self.termination {
            if self.bytes_transferred != total {
                let err = LptfError::TransferSizeMismatch {
                    expected: total,
                    actual: self.bytes_transferred,
                };
                return Err(self.fail(err));
            }
        }
        self.state = TransferState::Completed;
        Ok(self.bytes_transferred)
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_up_to<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Report a local failure to the peer, then hand it back for the caller.
fn report_local<S: PacketStream + ?Sized>(peer: &mut S, err: LptfError) -> LptfError {
    match message::build_error_from(packet_type::BINARY_PART, &err) {
        Ok(packet) => {
            if let Err(e) = peer.write_packet(&packet) {
                tracing::debug!("could not deliver transfer error ({err}): {e}");
            }
        }
        Err(e) => tracing::debug!("could not build transfer error ({err}): {e}"),
    }
    err
}

/// Close out the progress display whichever way the transfer ended.
fn settle(progress: &dyn Progress, result: Result<u64>) -> Result<u64> {
    match &result {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    }
    result
}

/// Stream `source` to `peer` chunk by chunk, waiting for an ack after each.
pub fn send_stream<S, R>(
    peer: &mut S,
    source: &mut R,
    session: &mut TransferSession,
    progress: &dyn Progress,
) -> Result<u64>
where
    S: PacketStream + ?Sized,
    R: Read + ?Sized,
{
    session.state = TransferState::Streaming;
    progress.start(session.total_expected_bytes());
    let result = send_chunks(peer, source, session, progress);
    settle(progress, result)
}

fn send_chunks<S, R>(
    peer: &mut S,
    source: &mut R,
    session: &mut TransferSession,
    progress: &dyn Progress,
) -> Result<u64>
where
    S: PacketStream + ?Sized,
    R: Read + ?Sized,
{
    if session.next_chunk_len() == 0 && session.total_expected_bytes().is_some() {
        // zero-byte sized transfer: nothing to exchange
        return session.finish();
    }

    let mut buf = vec![0u8; session.chunk_limit];
    loop {
        let want = session.next_chunk_len();
        let n = match read_up_to(source, &mut buf[..want]) {
            Ok(n) => n,
            Err(e) => {
                let err = report_local(peer, e.into());
                return Err(session.fail(err));
            }
        };
        if let (Some(expected), true) = (session.total_expected_bytes(), n < want) {
            let err = LptfError::TransferSizeMismatch {
                expected,
                actual: session.bytes_transferred + n as u64,
            };
            let err = report_local(peer, err);
            return Err(session.fail(err));
        }

        let chunk = message::build_chunk(&buf[..n])?;
        if let Err(e) = peer.write_packet(&chunk) {
            return Err(session.fail(e));
        }
        session.state = TransferState::AwaitingAck;

        let reply = match peer.read_packet() {
            Ok(p) => p,
            Err(e) => return Err(session.fail(e)),
        };
        if !message::is_ack(&reply) {
            let err = if reply.packet_type() == packet_type::ERROR {
                message::parse_error(&reply).unwrap_or_else(|e| e)
            } else {
                LptfError::protocol(format!(
                    "expected chunk acknowledgement, got {} packet",
                    packet_type::name(reply.packet_type())
                ))
            };
            return Err(session.fail(err));
        }

        session.record(n);
        progress.advance(n as u64);
        session.state = TransferState::Streaming;

        if !session.wants_more(n) {
            break;
        }
    }

    session.finish()
}

/// Receive chunks from `peer` into `dest`, acknowledging each one.
///
/// The chunk that ends the transfer is acknowledged only once `dest` has
/// been flushed and the byte count checked; a failure there goes back to
/// the sender as an ERROR in place of that ack.
pub fn receive_stream<S, W>(
    peer: &mut S,
    dest: &mut W,
    session: &mut TransferSession,
    progress: &dyn Progress,
) -> Result<u64>
where
    S: PacketStream + ?Sized,
    W: Write + ?Sized,
{
    session.state = TransferState::Streaming;
    progress.start(session.total_expected_bytes());
    let result = receive_chunks(peer, dest, session, progress);
    settle(progress, result)
}

fn receive_chunks<S, W>(
    peer: &mut S,
    dest: &mut W,
    session: &mut TransferSession,
    progress: &dyn Progress,
) -> Result<u64>
where
    S: PacketStream + ?Sized,
    W: Write + ?Sized,
{
    if session.total_expected_bytes() == Some(0) {
        return session.finish();
    }

    loop {
        let packet = match peer.read_packet() {
            Ok(p) => p,
            Err(e) => return Err(session.fail(e)),
        };
        if packet.packet_type() != packet_type::BINARY_PART {
            let err = if packet.packet_type() == packet_type::ERROR {
                message::parse_error(&packet).unwrap_or_else(|e| e)
            } else {
                LptfError::unexpected(packet_type::BINARY_PART, packet.packet_type())
            };
            return Err(session.fail(err));
        }

        let data = packet.content();
        if let Err(e) = dest.write_all(data) {
            let err = report_local(peer, e.into());
            return Err(session.fail(err));
        }
        session.record(data.len());
        progress.advance(data.len() as u64);

        let last = !session.wants_more(data.len());
        if last {
            if let Err(e) = dest.flush() {
                let err = report_local(peer, e.into());
                return Err(session.fail(err));
            }
            if let Err(err) = session.finish() {
                return Err(report_local(peer, err));
            }
        }

        let ack = message::build_ack()?;
        if let Err(e) = peer.write_packet(&ack) {
            return Err(session.fail(e));
        }

        if last {
            return Ok(session.bytes_transferred);
        }
    }
}
