//! The Codec and Storable traits.

use prefstore_core::{Result, Value};

/// What a codec produced for a value.
///
/// `Absent` means "this value is stored as no value at all"; the adapter
/// removes the key instead of writing anything.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Present(Value),
    Absent,
}

impl Entry {
    pub fn is_absent(&self) -> bool {
        matches!(self, Entry::Absent)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Entry::Present(value) => Some(value),
            Entry::Absent => None,
        }
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Entry::Present(value)
    }
}

/// Bidirectional mapping between `T` and store primitives.
///
/// # Contract
///
/// - `encode` either yields an [`Entry`] or a typed
///   [`Error::Encode`](prefstore_core::Error::Encode). It never panics.
/// - `decode` is total: anything it does not recognise (wrong variant,
///   out-of-range number, malformed bytes) yields `None`.
/// - For every `v` where `encode(v)` is `Present(p)`, `decode(p)` is
///   `Some(v2)` with `v2` equal to `v`.
///
/// A codec is generic over the value type rather than carrying it, so one
/// zero-sized codec such as [`PrimitiveCodec`](crate::PrimitiveCodec) serves
/// many types.
pub trait Codec<T>: Send + Sync + 'static {
    /// Encode `value` for storage.
    fn encode(&self, value: &T) -> Result<Entry>;

    /// Decode a stored primitive, or `None` if it does not represent a `T`.
    fn decode(&self, value: Value) -> Option<T>;
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for Box<C> {
    fn encode(&self, value: &T) -> Result<Entry> {
        self.as_ref().encode(value)
    }

    fn decode(&self, value: Value) -> Option<T> {
        self.as_ref().decode(value)
    }
}

/// A type with a default codec.
///
/// Codec selection happens at compile time: a type is storable exactly when
/// it names a codec here, and a type without an impl is rejected when an
/// adapter for it is built. There are no blanket impls; each type opts in.
///
/// ```rust
/// use prefstore_codec::{JsonCodec, Storable};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Window { width: u32, height: u32 }
///
/// impl Storable for Window {
///     type Codec = JsonCodec;
/// }
/// ```
pub trait Storable: Sized + Clone + Send + Sync + 'static {
    type Codec: Codec<Self> + Default;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveCodec;

    #[test]
    fn entry_accessors() {
        assert!(Entry::Absent.is_absent());
        assert_eq!(Entry::Absent.into_value(), None);

        let entry = Entry::from(Value::Integer(3));
        assert!(!entry.is_absent());
        assert_eq!(entry.into_value(), Some(Value::Integer(3)));
    }

    #[test]
    fn boxed_codec_delegates() {
        let codec: Box<dyn Codec<i32>> = Box::new(PrimitiveCodec);

        assert_eq!(codec.encode(&7).unwrap(), Entry::Present(Value::Integer(7)));
        assert_eq!(codec.decode(Value::Integer(7)), Some(7));
    }
}
