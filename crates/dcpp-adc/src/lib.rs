//! Descriptor-driven codec for ADC protocol messages.
//!
//! An ADC message is a single line of space separated tokens. Each field of a
//! message is either positional (identified by order) or prefixed (identified
//! by a literal tag in front of its value):
//!
//! ```text
//! <positional> <TAGvalue> <TAGvalue> ...
//! ```
//!
//! Message types declare their fields once with [`adc_message!`], which
//! produces a static list of [`FieldDescriptor`]s. Encoding and decoding walk
//! that list in declaration order; individual values go through the
//! [`FieldCodec`] capability.
//!
//! ```
//! use dcpp_adc::{adc_message, from_bytes, to_bytes};
//!
//! adc_message! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Search {
//!         #[adc("#")]
//!         pub token: String,
//!         #[adc("AN", repeated)]
//!         pub include: Vec<String>,
//!         #[adc("SI")]
//!         pub size: u64,
//!     }
//! }
//!
//! let msg = Search { token: "t1".into(), include: vec!["linux iso".into()], size: 0 };
//! let line = to_bytes(&msg).unwrap();
//! assert_eq!(line, b"t1 ANlinux\\siso");
//! assert_eq!(from_bytes::<Search>(&line).unwrap(), msg);
//! ```

pub mod cid;
pub mod error;
pub mod field;
pub mod message;

pub use cid::Cid;
pub use error::{CodecError, FieldError};
pub use field::FieldCodec;
pub use message::{decode_into, from_bytes, to_bytes, FieldDescriptor, FieldKind, Message, Tag};
