//! Typed codecs for prefstore.
//!
//! This layer maps Rust types onto the primitives a [`Store`] persists
//! natively. A type picks its codec at compile time through [`Storable`]:
//!
//! - [`PrimitiveCodec`]: Natively storable scalars (`bool`, integers, floats,
//!   `String`, [`Bytes`])
//! - [`RawCodec`]: Types with a primitive raw value, usually field-less enums
//! - [`ConvertibleCodec`]: Types with a custom mapping onto another storable shape
//! - [`JsonCodec`]: Any serde type, stored as an opaque JSON byte buffer
//! - [`OptionalCodec`], [`ArrayCodec`], [`MapCodec`]: Wrappers over the above
//!
//! Decoding never fails loudly: malformed, absent or mismatched input decodes
//! to `None` and the caller falls back to a default.
//!
//! # Example
//!
//! ```rust
//! use prefstore_codec::{Codec, Entry, RawCodec, RawRepresentable, Storable};
//! use prefstore_core::Value;
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! enum Direction { North, West }
//!
//! impl RawRepresentable for Direction {
//!     type Raw = i64;
//!     fn raw_value(&self) -> i64 { *self as i64 }
//!     fn from_raw(raw: i64) -> Option<Self> {
//!         match raw {
//!             0 => Some(Direction::North),
//!             1 => Some(Direction::West),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Storable for Direction {
//!     type Codec = RawCodec;
//! }
//!
//! let codec = RawCodec;
//! assert_eq!(codec.encode(&Direction::West).unwrap(), Entry::Present(Value::Integer(1)));
//! assert_eq!(Codec::<Direction>::decode(&codec, Value::Integer(99)), None);
//! ```
//!
//! [`Store`]: prefstore_core::Store

pub use bytes::Bytes;

mod codec;
mod collection;
mod convertible;
mod json;
mod optional;
mod primitive;
mod raw;

pub use codec::{Codec, Entry, Storable};
pub use collection::{ArrayCodec, MapCodec};
pub use convertible::{Convertible, ConvertibleCodec};
pub use json::JsonCodec;
pub use optional::OptionalCodec;
pub use primitive::{Primitive, PrimitiveCodec};
pub use raw::{RawCodec, RawRepresentable};

// Re-export core types for convenience
pub use prefstore_core::{Error, Result, Value};
