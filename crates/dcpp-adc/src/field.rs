//! Per-value conversion between typed values and ADC token payloads.
//!
//! [`FieldCodec`] is the capability every field type implements. Built-in
//! implementations cover strings (escaped), integers (base 10) and
//! `Option<T>` (absent values are omitted). Types with their own wire form,
//! such as [`Cid`](crate::Cid), implement the trait directly.

use dcpp_common::{escape, unescape};

use crate::error::FieldError;

/// Conversion of a single field value to and from its token payload.
///
/// The payload never includes the field's tag prefix.
pub trait FieldCodec: Sized {
    /// Decode a value from a raw (still escaped) payload.
    fn decode_field(raw: &[u8]) -> Result<Self, FieldError>;

    /// Append the wire payload of this value to `out`.
    fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError>;

    /// Whether this value is its type's zero value.
    ///
    /// Prefixed fields holding a zero value are left off the wire.
    fn is_zero(&self) -> bool;
}

impl FieldCodec for String {
    fn decode_field(raw: &[u8]) -> Result<Self, FieldError> {
        if raw.is_empty() {
            return Ok(String::new());
        }
        Ok(String::from_utf8(unescape(raw))?)
    }

    fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError> {
        out.extend_from_slice(&escape(self));
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! impl_integer_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldCodec for $ty {
                fn decode_field(raw: &[u8]) -> Result<Self, FieldError> {
                    if raw.is_empty() {
                        return Ok(0);
                    }
                    let text = String::from_utf8_lossy(raw);
                    text.parse::<$ty>().map_err(|source| FieldError::InvalidInteger {
                        value: text.into_owned(),
                        source,
                    })
                }

                fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError> {
                    out.extend_from_slice(self.to_string().as_bytes());
                    Ok(())
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

impl_integer_codec!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: FieldCodec> FieldCodec for Option<T> {
    fn decode_field(raw: &[u8]) -> Result<Self, FieldError> {
        if raw.is_empty() {
            return Ok(None);
        }
        T::decode_field(raw).map(Some)
    }

    fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError> {
        match self {
            Some(value) => value.encode_field(out),
            None => Ok(()),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}
