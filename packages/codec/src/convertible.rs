//! Types with a custom mapping onto another storable shape.

use prefstore_core::{Error, Result, Value};
use uuid::Uuid;

use crate::{Codec, Entry, Storable};

/// A type stored by converting it into another [`Storable`] type.
///
/// Use this for values that have a natural primitive shape but no single raw
/// value: geometric types become maps of numbers, identifiers become strings.
///
/// ```rust
/// use std::collections::BTreeMap;
/// use prefstore_codec::{Convertible, ConvertibleCodec, Storable};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Point { x: f64, y: f64 }
///
/// impl Convertible for Point {
///     type Converted = BTreeMap<String, f64>;
///
///     fn convert(&self) -> Self::Converted {
///         BTreeMap::from([("x".to_string(), self.x), ("y".to_string(), self.y)])
///     }
///
///     fn reverse(map: Self::Converted) -> Option<Self> {
///         Some(Point { x: *map.get("x")?, y: *map.get("y")? })
///     }
/// }
///
/// impl Storable for Point {
///     type Codec = ConvertibleCodec;
/// }
/// ```
pub trait Convertible: Sized {
    type Converted: Storable;

    fn convert(&self) -> Self::Converted;

    /// `None` if `converted` is missing parts or otherwise invalid.
    fn reverse(converted: Self::Converted) -> Option<Self>;
}

/// Codec for [`Convertible`] types, delegating to the converted type's codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertibleCodec;

impl<T: Convertible + 'static> Codec<T> for ConvertibleCodec {
    fn encode(&self, value: &T) -> Result<Entry> {
        let codec = <T::Converted as Storable>::Codec::default();
        match codec.encode(&value.convert())? {
            Entry::Present(stored) => Ok(Entry::Present(stored)),
            Entry::Absent => Err(Error::encode::<T>("converted form has no stored value")),
        }
    }

    fn decode(&self, value: Value) -> Option<T> {
        let codec = <T::Converted as Storable>::Codec::default();
        codec.decode(value).and_then(T::reverse)
    }
}

impl Convertible for Uuid {
    type Converted = String;

    fn convert(&self) -> String {
        self.hyphenated().to_string()
    }

    fn reverse(converted: String) -> Option<Self> {
        Uuid::parse_str(&converted).ok()
    }
}

impl Storable for Uuid {
    type Codec = ConvertibleCodec;
}
