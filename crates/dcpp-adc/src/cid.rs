//! Client identifier: 24 bytes, base32 on the wire.

use std::fmt;
use std::str::FromStr;

use crate::error::FieldError;
use crate::field::FieldCodec;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Size of a client identifier in bytes.
pub const CID_LEN: usize = 24;

/// Length of the base32 text form (no padding).
pub const CID_TEXT_LEN: usize = (CID_LEN * 8).div_ceil(5);

/// ADC client identifier (CID/PID), a hash-sized opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cid([u8; CID_LEN]);

impl Cid {
    pub const fn from_bytes(bytes: [u8; CID_LEN]) -> Self {
        Cid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CID_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

fn encode_base32(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut acc: u16 = 0;
    let mut bits = 0;
    for &b in data {
        acc = (acc << 8) | u16::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[usize::from((acc >> bits) & 0x1f)] as char);
        }
        acc &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[usize::from((acc << (5 - bits)) & 0x1f)] as char);
    }
    out
}

fn decode_base32(text: &[u8], out: &mut [u8]) -> Result<(), FieldError> {
    if text.len() != (out.len() * 8).div_ceil(5) {
        return Err(FieldError::Invalid(format!(
            "expected {} base32 characters, got {}",
            (out.len() * 8).div_ceil(5),
            text.len()
        )));
    }
    let mut acc: u16 = 0;
    let mut bits = 0;
    let mut pos = 0;
    for &c in text {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'2'..=b'7' => c - b'2' + 26,
            _ => {
                return Err(FieldError::Invalid(format!(
                    "invalid base32 character {:?}",
                    c as char
                )))
            }
        };
        acc = (acc << 5) | u16::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if pos < out.len() {
                out[pos] = (acc >> bits) as u8;
                pos += 1;
            }
            acc &= (1 << bits) - 1;
        }
    }
    if acc != 0 {
        return Err(FieldError::Invalid(
            "non-zero trailing bits in base32 text".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_base32(&self.0))
    }
}

impl FromStr for Cid {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; CID_LEN];
        decode_base32(s.as_bytes(), &mut bytes)?;
        Ok(Cid(bytes))
    }
}

impl FieldCodec for Cid {
    fn decode_field(raw: &[u8]) -> Result<Self, FieldError> {
        let mut bytes = [0u8; CID_LEN];
        if !raw.is_empty() {
            decode_base32(raw, &mut bytes)?;
        }
        Ok(Cid(bytes))
    }

    fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError> {
        out.extend_from_slice(encode_base32(&self.0).as_bytes());
        Ok(())
    }

    fn is_zero(&self) -> bool {
        Cid::is_zero(self)
    }
}
