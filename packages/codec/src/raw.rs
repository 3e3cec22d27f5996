//! Types with a primitive raw value.

use prefstore_core::{Result, Value};

use crate::{Codec, Entry, Primitive};

/// A type that maps onto a [`Primitive`] raw value, typically a field-less enum.
///
/// `from_raw` returns `None` for raw values that name no variant, such as a
/// variant removed in a later version of the program.
pub trait RawRepresentable: Sized {
    type Raw: Primitive;

    fn raw_value(&self) -> Self::Raw;

    fn from_raw(raw: Self::Raw) -> Option<Self>;
}

/// Codec storing a [`RawRepresentable`] as its raw value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl<T: RawRepresentable> Codec<T> for RawCodec {
    fn encode(&self, value: &T) -> Result<Entry> {
        Ok(Entry::Present(value.raw_value().to_value()))
    }

    fn decode(&self, value: Value) -> Option<T> {
        T::Raw::from_value(value).and_then(T::from_raw)
    }
}
