//! Message-level encoding driven by static field descriptors.
//!
//! Every [`Message`] exposes its fields as a `'static` slice of
//! [`FieldDescriptor`]s in declaration order. The order is the wire order on
//! encode and the consumption order on decode; it is fixed when the type is
//! declared and never recomputed.

use std::collections::VecDeque;

use crate::error::{CodecError, CodecResult, FieldError};
use crate::field::FieldCodec;

/// Token separator inside an ADC line.
pub const SEPARATOR: u8 = b' ';

/// How a field is located on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Exactly one token, taken from the front of the line, written without
    /// a prefix and never omitted.
    Positional,
    /// Tokens starting with the given literal prefix.
    Prefix(&'static str),
    /// Not part of the wire form.
    Skip,
}

impl Tag {
    /// Parse the tag language: `"#"` is positional, `""` and `"-"` exclude
    /// the field, anything else is a prefix.
    pub const fn parse(tag: &'static str) -> Tag {
        match tag.as_bytes() {
            [] | [b'-'] => Tag::Skip,
            [b'#'] => Tag::Positional,
            _ => Tag::Prefix(tag),
        }
    }
}

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// At most one value.
    Scalar,
    /// Any number of prefixed tokens, kept in encounter order.
    Repeated,
}

type DecodeFn<M> = fn(&mut M, &[&[u8]]) -> Result<(), FieldError>;
type EncodeFn<M> = fn(&M, &mut Vec<Vec<u8>>) -> Result<(), FieldError>;
type IsZeroFn<M> = fn(&M) -> bool;

/// Static description of one field of message `M`.
///
/// Normally produced by [`adc_message!`](crate::adc_message) rather than by
/// hand.
pub struct FieldDescriptor<M> {
    name: &'static str,
    tag: Tag,
    kind: FieldKind,
    decode: DecodeFn<M>,
    encode: EncodeFn<M>,
    is_zero: IsZeroFn<M>,
}

impl<M> FieldDescriptor<M> {
    /// A single-valued field.
    pub const fn scalar(
        name: &'static str,
        tag: &'static str,
        decode: DecodeFn<M>,
        encode: EncodeFn<M>,
        is_zero: IsZeroFn<M>,
    ) -> Self {
        Self {
            name,
            tag: Tag::parse(tag),
            kind: FieldKind::Scalar,
            decode,
            encode,
            is_zero,
        }
    }

    /// A prefixed field that may appear any number of times.
    pub const fn repeated(
        name: &'static str,
        tag: &'static str,
        decode: DecodeFn<M>,
        encode: EncodeFn<M>,
        is_zero: IsZeroFn<M>,
    ) -> Self {
        Self {
            name,
            tag: Tag::parse(tag),
            kind: FieldKind::Repeated,
            decode,
            encode,
            is_zero,
        }
    }

    /// A field that is never read from or written to the wire.
    pub const fn skip(name: &'static str) -> Self {
        Self {
            name,
            tag: Tag::Skip,
            kind: FieldKind::Scalar,
            decode: skip_decode::<M>,
            encode: skip_encode::<M>,
            is_zero: skip_is_zero::<M>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

impl<M> std::fmt::Debug for FieldDescriptor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .finish()
    }
}

fn skip_decode<M>(_: &mut M, _: &[&[u8]]) -> Result<(), FieldError> {
    Ok(())
}

fn skip_encode<M>(_: &M, _: &mut Vec<Vec<u8>>) -> Result<(), FieldError> {
    Ok(())
}

fn skip_is_zero<M>(_: &M) -> bool {
    true
}

/// A structured record with an ADC wire form.
///
/// The default `encode_adc`/`decode_adc` walk [`Message::fields`]. Types
/// with a hand-written wire form override them.
pub trait Message: Default + Sized + 'static {
    /// Field descriptors in declaration order.
    fn fields() -> &'static [FieldDescriptor<Self>];

    fn encode_adc(&self) -> CodecResult<Vec<u8>> {
        encode_fields(self)
    }

    fn decode_adc(&mut self, line: &[u8]) -> CodecResult<()> {
        decode_fields(line, self)
    }
}

/// Encode a message into a single ADC line (without the trailing newline).
pub fn to_bytes<M: Message>(msg: &M) -> CodecResult<Vec<u8>> {
    msg.encode_adc()
}

/// Decode a line into a fresh message.
pub fn from_bytes<M: Message>(line: &[u8]) -> CodecResult<M> {
    let mut msg = M::default();
    msg.decode_adc(line)?;
    Ok(msg)
}

/// Decode a line into an existing message.
///
/// Prefixed fields without a matching token keep their current value.
pub fn decode_into<M: Message>(line: &[u8], target: &mut M) -> CodecResult<()> {
    target.decode_adc(line)
}

fn decode_fields<M: Message>(line: &[u8], target: &mut M) -> CodecResult<()> {
    let mut tokens: VecDeque<&[u8]> = line.split(|&b| b == SEPARATOR).collect();

    for fd in M::fields() {
        match fd.tag {
            Tag::Skip => {}
            Tag::Positional => {
                let token = tokens
                    .pop_front()
                    .ok_or(CodecError::MissingPositional { field: fd.name })?;
                (fd.decode)(target, &[token]).map_err(|source| CodecError::Decode {
                    field: fd.name,
                    source,
                })?;
            }
            Tag::Prefix(prefix) => {
                let values: Vec<&[u8]> = tokens
                    .iter()
                    .filter_map(|token| token.strip_prefix(prefix.as_bytes()))
                    .collect();
                if values.is_empty() {
                    continue;
                }
                if fd.kind == FieldKind::Scalar && values.len() > 1 {
                    return Err(CodecError::MultipleValues {
                        field: fd.name,
                        count: values.len(),
                    });
                }
                (fd.decode)(target, &values).map_err(|source| CodecError::Decode {
                    field: fd.name,
                    source,
                })?;
            }
        }
    }
    Ok(())
}

fn encode_fields<M: Message>(msg: &M) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut values = Vec::new();
    let mut first = true;

    for fd in M::fields() {
        let prefix: &[u8] = match fd.tag {
            Tag::Skip => continue,
            Tag::Positional => b"",
            Tag::Prefix(prefix) => {
                if (fd.is_zero)(msg) {
                    continue;
                }
                prefix.as_bytes()
            }
        };

        values.clear();
        (fd.encode)(msg, &mut values).map_err(|source| CodecError::Encode {
            field: fd.name,
            source,
        })?;

        for value in &values {
            if !first {
                buf.push(SEPARATOR);
            }
            first = false;
            buf.extend_from_slice(prefix);
            buf.extend_from_slice(value);
        }
    }
    Ok(buf)
}

#[doc(hidden)]
pub fn decode_scalar<T: FieldCodec>(slot: &mut T, raw: &[&[u8]]) -> Result<(), FieldError> {
    if let Some(value) = raw.first() {
        *slot = T::decode_field(value)?;
    }
    Ok(())
}

#[doc(hidden)]
pub fn encode_scalar<T: FieldCodec>(value: &T, out: &mut Vec<Vec<u8>>) -> Result<(), FieldError> {
    let mut payload = Vec::new();
    value.encode_field(&mut payload)?;
    out.push(payload);
    Ok(())
}

#[doc(hidden)]
pub fn decode_repeated<T: FieldCodec>(slot: &mut Vec<T>, raw: &[&[u8]]) -> Result<(), FieldError> {
    *slot = raw
        .iter()
        .map(|value| T::decode_field(value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

#[doc(hidden)]
pub fn encode_repeated<T: FieldCodec>(
    values: &[T],
    out: &mut Vec<Vec<u8>>,
) -> Result<(), FieldError> {
    for value in values {
        encode_scalar(value, out)?;
    }
    Ok(())
}

/// Declare an ADC message struct together with its field descriptors.
///
/// Every field carries an `#[adc(...)]` attribute as its first attribute:
///
/// - `#[adc("#")]` positional
/// - `#[adc("NI")]` prefixed, at most one value
/// - `#[adc("SU", repeated)]` prefixed, `Vec<T>`, one token per element
/// - `#[adc("-")]` or `#[adc("")]` not on the wire
///
/// Field types (or the element type of repeated fields) must implement
/// [`FieldCodec`](crate::FieldCodec).
#[macro_export]
macro_rules! adc_message {
    (@field $name:ident, $field:ident, "-" $(, $kind:ident)?) => {
        $crate::FieldDescriptor::<$name>::skip(stringify!($field))
    };
    (@field $name:ident, $field:ident, "" $(, $kind:ident)?) => {
        $crate::FieldDescriptor::<$name>::skip(stringify!($field))
    };
    (@field $name:ident, $field:ident, "#", repeated) => {
        compile_error!(concat!("positional field `", stringify!($field), "` cannot be repeated"))
    };
    (@field $name:ident, $field:ident, $tag:tt, repeated) => {
        $crate::FieldDescriptor::<$name>::repeated(
            stringify!($field),
            $tag,
            |m, raw| $crate::message::decode_repeated(&mut m.$field, raw),
            |m, out| $crate::message::encode_repeated(&m.$field, out),
            |m| m.$field.is_empty(),
        )
    };
    (@field $name:ident, $field:ident, $tag:tt) => {
        $crate::FieldDescriptor::<$name>::scalar(
            stringify!($field),
            $tag,
            |m, raw| $crate::message::decode_scalar(&mut m.$field, raw),
            |m, out| $crate::message::encode_scalar(&m.$field, out),
            |m| $crate::FieldCodec::is_zero(&m.$field),
        )
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[adc($tag:tt $(, $kind:ident)?)]
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Message for $name {
            fn fields() -> &'static [$crate::FieldDescriptor<Self>] {
                const FIELDS: &[$crate::FieldDescriptor<$name>] = &[
                    $( $crate::adc_message!(@field $name, $field, $tag $(, $kind)?), )*
                ];
                FIELDS
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cid;
    use proptest::prelude::*;

    adc_message! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct UserInfo {
            #[adc("#")]
            sid: String,
            #[adc("NI")]
            nick: String,
            #[adc("SS")]
            share: i64,
            #[adc("SL")]
            slots: Option<u32>,
            #[adc("AP", repeated)]
            apps: Vec<String>,
            #[adc("-")]
            local_only: u8,
        }
    }

    adc_message! {
        #[derive(Debug, Default, PartialEq)]
        struct Pair {
            #[adc("#")]
            first: u32,
            #[adc("#")]
            second: u32,
            #[adc("")]
            note: String,
        }
    }

    adc_message! {
        #[derive(Debug, Default, PartialEq)]
        struct Identity {
            #[adc("ID")]
            cid: Cid,
            #[adc("PD")]
            pid: Option<Cid>,
        }
    }

    #[test]
    fn test_descriptor_order_and_tags() {
        let fields = UserInfo::fields();
        let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["sid", "nick", "share", "slots", "apps", "local_only"]);
        assert_eq!(fields[0].tag(), Tag::Positional);
        assert_eq!(fields[1].tag(), Tag::Prefix("NI"));
        assert_eq!(fields[4].kind(), FieldKind::Repeated);
        assert_eq!(fields[5].tag(), Tag::Skip);
    }

    #[test]
    fn test_encode_full_message() {
        let msg = UserInfo {
            sid: "AAAB".into(),
            nick: "some user".into(),
            share: 1024,
            slots: Some(3),
            apps: vec!["a".into(), "b c".into()],
            local_only: 9,
        };
        assert_eq!(
            to_bytes(&msg).unwrap(),
            b"AAAB NIsome\\suser SS1024 SL3 APa APb\\sc".to_vec()
        );
    }

    #[test]
    fn test_zero_values_omitted_but_positional_kept() {
        let msg = UserInfo::default();
        assert_eq!(to_bytes(&msg).unwrap(), b"".to_vec());

        let msg = Pair { first: 0, second: 0, note: "x".into() };
        assert_eq!(to_bytes(&msg).unwrap(), b"0 0".to_vec());
    }

    #[test]
    fn test_decode_full_message() {
        let msg: UserInfo = from_bytes(b"AAAB APx SS-5 NIme\\sto APy").unwrap();
        assert_eq!(msg.sid, "AAAB");
        assert_eq!(msg.nick, "me to");
        assert_eq!(msg.share, -5);
        assert_eq!(msg.slots, None);
        assert_eq!(msg.apps, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(msg.local_only, 0);
    }

    #[test]
    fn test_decode_ignores_unknown_tokens() {
        let msg: UserInfo = from_bytes(b"AAAB XXunknown NIme").unwrap();
        assert_eq!(msg.nick, "me");
    }

    #[test]
    fn test_missing_positional_is_error() {
        let err = from_bytes::<Pair>(b"1").unwrap_err();
        assert!(matches!(err, CodecError::MissingPositional { field: "second" }));
    }

    #[test]
    fn test_multiple_scalar_values_is_error() {
        let err = from_bytes::<UserInfo>(b"AAAB NIa NIb").unwrap_err();
        assert!(matches!(err, CodecError::MultipleValues { field: "nick", count: 2 }));
    }

    #[test]
    fn test_bad_integer_names_field() {
        let err = from_bytes::<UserInfo>(b"AAAB SSlots").unwrap_err();
        assert_eq!(err.field(), "share");
        assert!(err.to_string().starts_with("error on field share"));
    }

    #[test]
    fn test_decode_into_keeps_absent_fields() {
        let mut msg = UserInfo {
            nick: "kept".into(),
            ..Default::default()
        };
        decode_into(b"AAAC SS7", &mut msg).unwrap();
        assert_eq!(msg.sid, "AAAC");
        assert_eq!(msg.nick, "kept");
        assert_eq!(msg.share, 7);
    }

    #[test]
    fn test_custom_field_codec() {
        let cid = Cid::from_bytes([7u8; 24]);
        let msg = Identity { cid, pid: None };
        let line = to_bytes(&msg).unwrap();
        assert_eq!(line, format!("ID{}", cid).into_bytes());
        assert_eq!(from_bytes::<Identity>(&line).unwrap(), msg);
    }

    #[test]
    fn test_custom_field_decode_error() {
        let err = from_bytes::<Identity>(b"IDnot-base32").unwrap_err();
        assert!(matches!(err, CodecError::Decode { field: "cid", .. }));
    }

    struct Upper(String);

    impl FieldCodec for Upper {
        fn decode_field(raw: &[u8]) -> Result<Self, FieldError> {
            Ok(Upper(String::from_utf8_lossy(raw).to_lowercase()))
        }

        fn encode_field(&self, out: &mut Vec<u8>) -> Result<(), FieldError> {
            if self.0.contains(' ') {
                return Err(FieldError::Invalid("space in value".into()));
            }
            out.extend_from_slice(self.0.to_uppercase().as_bytes());
            Ok(())
        }

        fn is_zero(&self) -> bool {
            self.0.is_empty()
        }
    }

    impl Default for Upper {
        fn default() -> Self {
            Upper(String::new())
        }
    }

    adc_message! {
        #[derive(Default)]
        struct Shout {
            #[adc("#")]
            word: Upper,
        }
    }

    #[test]
    fn test_encode_error_aborts_message() {
        let err = to_bytes(&Shout { word: Upper("a b".into()) }).unwrap_err();
        assert!(matches!(err, CodecError::Encode { field: "word", .. }));
        assert_eq!(to_bytes(&Shout { word: Upper("hi".into()) }).unwrap(), b"HI".to_vec());
        assert_eq!(from_bytes::<Shout>(b"HI").unwrap().word.0, "hi");
    }

    fn user_info() -> impl Strategy<Value = UserInfo> {
        (
            any::<String>(),
            any::<String>(),
            any::<i64>(),
            any::<Option<u32>>(),
            proptest::collection::vec(any::<String>(), 0..4),
        )
            .prop_map(|(sid, nick, share, slots, apps)| UserInfo {
                sid,
                nick,
                share,
                slots,
                apps,
                local_only: 0,
            })
    }

    proptest! {
        #[test]
        fn prop_message_roundtrip(msg in user_info()) {
            let line = to_bytes(&msg).unwrap();
            prop_assert!(!line.contains(&b'\n'));
            let decoded: UserInfo = from_bytes(&line).unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
