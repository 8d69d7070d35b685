//! Variable-length "remaining length" codec.
//!
//! Each byte carries seven bits of the value, least significant group first,
//! with the high bit set while more bytes follow. Four bytes encode values up
//! to 268,435,455 (`0xFF 0xFF 0xFF 0x7F`).

use super::error::{Error, ProtocolError};
use heapless::Vec;

/// Largest value the four-byte encoding can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum number of bytes an encoded remaining length occupies.
pub const MAX_LENGTH_BYTES: usize = 4;

/// Number of bytes `len` occupies once encoded.
pub const fn encoded_len(len: usize) -> usize {
    if len < 128 {
        1
    } else if len < 16_384 {
        2
    } else if len < 2_097_152 {
        3
    } else {
        4
    }
}

/// Appends the encoding of `len` to `buf`.
///
/// Fails with [`ProtocolError::MalformedRemainingLength`] if `len` is beyond
/// [`MAX_REMAINING_LENGTH`] or `buf` runs out of room.
pub fn encode_remaining_length<const N: usize>(
    buf: &mut Vec<u8, N>,
    mut len: usize,
) -> Result<(), Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::MalformedRemainingLength.into());
    }
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte)
            .map_err(|_| Error::from(ProtocolError::MalformedRemainingLength))?;
        if len == 0 {
            return Ok(());
        }
    }
}

/// Incremental decoder, fed one byte at a time as it arrives off the wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemainingLength {
    value: usize,
    shift: u32,
}

impl RemainingLength {
    /// A decoder with nothing consumed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the next byte. Returns the decoded value once a byte without
    /// the continuation bit arrives.
    pub fn feed(&mut self, byte: u8) -> Result<Option<usize>, ProtocolError> {
        if self.shift >= 7 * MAX_LENGTH_BYTES as u32 {
            return Err(ProtocolError::MalformedRemainingLength);
        }
        self.value |= ((byte & 0x7f) as usize) << self.shift;
        if byte & 0x80 == 0 {
            return Ok(Some(self.value));
        }
        self.shift += 7;
        Ok(None)
    }
}

/// Decodes a remaining length from the start of `bytes`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(usize, usize), ProtocolError> {
    let mut decoder = RemainingLength::new();
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(value) = decoder.feed(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::MalformedRemainingLength)
}
