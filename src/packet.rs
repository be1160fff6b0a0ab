//! LPTF frame codec
//!
//! Frame layout:
//! ```text
//! length   u16  content length in bytes (little-endian)
//! type     u8   packet type, see protocol::packet_type
//! reserved u8   carried through unchanged
//! content  [u8; length]
//! ```
//! The decoder expects exactly one complete frame. Reassembling partial
//! frames from a byte stream is the transport's job (see `net`).

use crate::error::{LptfError, Result};
use crate::protocol::{packet_type, HEADER_LEN, MAX_CONTENT_LEN};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    packet_type: u8,
    reserved: u8,
    content: Vec<u8>,
}

/// Decoded frame header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub length: u16,
    pub packet_type: u8,
    pub reserved: u8,
}

impl Header {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let len = self.length.to_le_bytes();
        [len[0], len[1], self.packet_type, self.reserved]
    }

    pub fn from_bytes(b: [u8; HEADER_LEN]) -> Self {
        Self {
            length: u16::from_le_bytes([b[0], b[1]]),
            packet_type: b[2],
            reserved: b[3],
        }
    }
}

impl Packet {
    pub fn new(packet_type: u8, content: Vec<u8>) -> Result<Self> {
        Self::with_reserved(packet_type, 0, content)
    }

    pub fn with_reserved(packet_type: u8, reserved: u8, content: Vec<u8>) -> Result<Self> {
        if content.len() > MAX_CONTENT_LEN {
            return Err(LptfError::framing(format!(
                "content of {} bytes exceeds frame limit of {} bytes",
                content.len(),
                MAX_CONTENT_LEN
            )));
        }
        Ok(Self {
            packet_type,
            reserved,
            content,
        })
    }

    pub fn packet_type(&self) -> u8 {
        self.packet_type
    }

    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    pub fn len(&self) -> u16 {
        // bounded by the constructor
        self.content.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn header(&self) -> Header {
        Header {
            length: self.len(),
            packet_type: self.packet_type,
            reserved: self.reserved,
        }
    }

    /// Fails unless this packet has type `expected`.
    pub fn expect_type(&self, expected: u8) -> Result<()> {
        if self.packet_type != expected {
            return Err(LptfError::MalformedPacket(format!(
                "expected {} packet, got {} ({})",
                packet_type::name(expected),
                packet_type::name(self.packet_type),
                self.packet_type
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.content.len());
        buf.extend_from_slice(&self.header().to_bytes());
        buf.extend_from_slice(&self.content);
        buf
    }

    /// Decode one complete frame. Trailing bytes past the declared length are
    /// rejected as well as missing ones.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(LptfError::framing(format!(
                "truncated header: {} of {} bytes",
                bytes.len(),
                HEADER_LEN
            )));
        }
        let header = Header::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let body = &bytes[HEADER_LEN..];
        if body.len() != header.length as usize {
            return Err(LptfError::framing(format!(
                "declared length {} disagrees with {} content bytes",
                header.length,
                body.len()
            )));
        }
        Self::with_reserved(header.packet_type, header.reserved, body.to_vec())
    }
}

/// Encode a frame directly from its parts.
pub fn encode(packet_type: u8, content: &[u8]) -> Result<Vec<u8>> {
    Ok(Packet::new(packet_type, content.to_vec())?.encode())
}

pub fn decode(bytes: &[u8]) -> Result<Packet> {
    Packet::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip_preserves_content_and_length() {
        for content in [
            Vec::new(),
            b"x".to_vec(),
            vec![0u8; 8000],
            (0..=255u8).cycle().take(MAX_CONTENT_LEN).collect::<Vec<u8>>(),
        ] {
            let bytes = encode(packet_type::BINARY_PART, &content).unwrap();
            assert_eq!(bytes.len(), HEADER_LEN + content.len());
            let p = decode(&bytes).unwrap();
            assert_eq!(p.content(), &content[..]);
            assert_eq!(p.len() as usize, content.len());
            assert_eq!(p.packet_type(), packet_type::BINARY_PART);
        }
    }

    #[test]
    fn header_layout_is_fixed() {
        let bytes = encode(packet_type::COMMAND, b"LIST\0\0").unwrap();
        assert_eq!(&bytes[..4], &[6, 0, packet_type::COMMAND, 0]);
    }

    #[test]
    fn reserved_byte_round_trips() {
        let p = Packet::with_reserved(packet_type::MESSAGE, 0xAB, b"hi".to_vec()).unwrap();
        let back = Packet::decode(&p.encode()).unwrap();
        assert_eq!(back.reserved(), 0xAB);
        assert_eq!(back, p);
    }

    #[test]
    fn oversized_content_is_refused() {
        assert!(matches!(
            Packet::new(packet_type::BINARY_PART, vec![0; MAX_CONTENT_LEN + 1]),
            Err(LptfError::Framing(_))
        ));
    }

    #[test]
    fn truncated_frames_are_framing_errors() {
        assert!(matches!(decode(&[1, 0]), Err(LptfError::Framing(_))));
        // header claims 5 bytes, only 3 delivered
        assert!(matches!(
            decode(&[5, 0, packet_type::MESSAGE, 0, b'a', b'b', b'c']),
            Err(LptfError::Framing(_))
        ));
        // header claims 1 byte, 2 delivered
        assert!(matches!(
            decode(&[1, 0, packet_type::MESSAGE, 0, b'a', b'b']),
            Err(LptfError::Framing(_))
        ));
    }

    #[test]
    fn expect_type_reports_both_types() {
        let p = Packet::new(packet_type::REPLY, vec![packet_type::COMMAND]).unwrap();
        assert!(p.expect_type(packet_type::REPLY).is_ok());
        let err = p.expect_type(packet_type::ERROR).unwrap_err();
        assert!(matches!(err, LptfError::MalformedPacket(_)));
        assert!(err.to_string().contains("REPLY"));
    }
}
