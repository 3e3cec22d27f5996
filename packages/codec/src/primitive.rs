//! Natively storable scalars.

use bytes::Bytes;
use prefstore_core::{Result, Value};

use crate::{Codec, Entry, Storable};

/// A type a store can hold without conversion.
pub trait Primitive: Sized {
    fn to_value(&self) -> Value;

    /// `None` if `value` is the wrong variant or out of range for `Self`.
    fn from_value(value: Value) -> Option<Self>;
}

impl Primitive for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! integer_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: Value) -> Option<Self> {
                    value.as_i64().and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

integer_primitive!(i8, i16, i32, i64, u8, u16, u32);

impl Primitive for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl Primitive for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64().map(|f| f as f32)
    }
}

impl Primitive for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Primitive for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(Bytes::from(b)),
            _ => None,
        }
    }
}

/// Codec for [`Primitive`] types. Stores the value as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveCodec;

impl<T: Primitive> Codec<T> for PrimitiveCodec {
    fn encode(&self, value: &T) -> Result<Entry> {
        Ok(Entry::Present(value.to_value()))
    }

    fn decode(&self, value: Value) -> Option<T> {
        T::from_value(value)
    }
}

macro_rules! primitive_storable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Storable for $ty {
                type Codec = PrimitiveCodec;
            }
        )*
    };
}

primitive_storable!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, Bytes);

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: Primitive>(value: Value) -> Option<T> {
        Codec::<T>::decode(&PrimitiveCodec, value)
    }

    #[test]
    fn integers_widen_to_i64() {
        assert_eq!(
            PrimitiveCodec.encode(&200u8).unwrap(),
            Entry::Present(Value::Integer(200))
        );
        assert_eq!(
            PrimitiveCodec.encode(&-5i16).unwrap(),
            Entry::Present(Value::Integer(-5))
        );
    }

    #[test]
    fn out_of_range_integer_decodes_to_none() {
        assert_eq!(decode::<u8>(Value::Integer(256)), None);
        assert_eq!(decode::<u32>(Value::Integer(-1)), None);
        assert_eq!(decode::<i32>(Value::Integer(i64::MAX)), None);
        assert_eq!(decode::<u8>(Value::Integer(255)), Some(255));
    }

    #[test]
    fn floats_accept_stored_integers() {
        assert_eq!(decode::<f64>(Value::Integer(42)), Some(42.0));
        assert_eq!(decode::<f32>(Value::Float(17.5)), Some(17.5));
    }

    #[test]
    fn integers_reject_floats() {
        assert_eq!(decode::<i64>(Value::Float(1.0)), None);
    }

    #[test]
    fn wrong_variant_decodes_to_none() {
        assert_eq!(decode::<bool>(Value::Integer(1)), None);
        assert_eq!(decode::<String>(Value::Bytes(b"hi".to_vec())), None);
        assert_eq!(decode::<Bytes>(Value::from("hi")), None);
    }

    #[test]
    fn strings_and_bytes() {
        assert_eq!(
            decode::<String>(Value::from("Alice")),
            Some("Alice".to_string())
        );
        assert_eq!(
            PrimitiveCodec.encode(&Bytes::from_static(b"\x00\x01")).unwrap(),
            Entry::Present(Value::Bytes(vec![0, 1]))
        );
        assert_eq!(
            decode::<Bytes>(Value::Bytes(vec![9])),
            Some(Bytes::from_static(b"\x09"))
        );
    }

    #[test]
    fn f32_survives_widening() {
        let value = 0.1f32;
        let Entry::Present(stored) = PrimitiveCodec.encode(&value).unwrap() else {
            panic!("primitive encoded as absent");
        };
        assert_eq!(decode::<f32>(stored), Some(value));
    }
}
