//! Bounds-checked cursor over packet payloads.
//!
//! Payloads are sequences of NUL-terminated UTF-8 strings, single bytes and
//! big-endian (network order) `u32`s. Every read checks the remaining length,
//! so a short payload becomes a [`LptfError::MalformedPacket`] instead of an
//! out-of-bounds access.

use crate::error::{LptfError, Result};

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn put_u32_be(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Append `s` followed by a NUL terminator.
    pub fn put_cstr(&mut self, s: &str) -> Result<&mut Self> {
        if s.as_bytes().contains(&0) {
            return Err(LptfError::malformed(format!(
                "string {s:?} contains an interior NUL"
            )));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(self)
    }

    pub fn put_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| LptfError::malformed("payload too short for u8"))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn get_u32_be(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(arr))
    }

    /// Read up to the next NUL and consume it.
    ///
    /// When the payload ends without a terminator the rest of the payload is
    /// taken as the string, as if a NUL followed it.
    pub fn get_cstr(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let (raw, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(nul) => (&rest[..nul], nul + 1),
            None => (rest, rest.len()),
        };
        let s = std::str::from_utf8(raw)
            .map_err(|e| LptfError::malformed(format!("string is not valid UTF-8: {e}")))?
            .to_string();
        self.pos += consumed;
        Ok(s)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LptfError::malformed(format!(
                "payload too short: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let buf: &'a [u8] = self.buf;
        let out = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let buf: &'a [u8] = self.buf;
        let out = &buf[self.pos..];
        self.pos = buf.len();
        out
    }
}
