//! Arrays and string-keyed maps of storable values.

use std::collections::{BTreeMap, HashMap};

use prefstore_core::{Error, Result, Value};

use crate::{Codec, Entry, Storable};

/// Codec for `Vec<T>`, stored as [`Value::Array`].
///
/// An element that encodes to [`Entry::Absent`] is an encode error: an array
/// slot cannot hold "no value". On decode, elements the inner codec rejects
/// are dropped and the rest are kept, so one stale element does not discard
/// the whole list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayCodec<C> {
    inner: C,
}

impl<C> ArrayCodec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<T, C: Codec<T>> Codec<Vec<T>> for ArrayCodec<C> {
    fn encode(&self, value: &Vec<T>) -> Result<Entry> {
        let mut items = Vec::with_capacity(value.len());
        for (index, item) in value.iter().enumerate() {
            match self.inner.encode(item)? {
                Entry::Present(stored) => items.push(stored),
                Entry::Absent => {
                    return Err(Error::encode::<T>(format!(
                        "array element {} encodes to no value",
                        index
                    )))
                }
            }
        }
        Ok(Entry::Present(Value::Array(items)))
    }

    fn decode(&self, value: Value) -> Option<Vec<T>> {
        match value {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| self.inner.decode(item))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Codec for string-keyed maps, stored as [`Value::Map`].
///
/// An entry that encodes to [`Entry::Absent`] is an encode error, as for
/// [`ArrayCodec`]. Decoding is strict:
/// if any entry is rejected by the inner codec, the whole map decodes to
/// `None`, since a map with silently missing keys is rarely usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapCodec<C> {
    inner: C,
}

impl<C> MapCodec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    fn encode_entries<'a, T: 'a>(
        &self,
        entries: impl Iterator<Item = (&'a String, &'a T)>,
    ) -> Result<Entry>
    where
        C: Codec<T>,
    {
        let mut map = BTreeMap::new();
        for (key, item) in entries {
            match self.inner.encode(item)? {
                Entry::Present(stored) => {
                    map.insert(key.clone(), stored);
                }
                Entry::Absent => {
                    return Err(Error::encode::<T>(format!(
                        "map entry {:?} encodes to no value",
                        key
                    )))
                }
            }
        }
        Ok(Entry::Present(Value::Map(map)))
    }

    fn decode_entries<T, M>(&self, value: Value) -> Option<M>
    where
        C: Codec<T>,
        M: FromIterator<(String, T)>,
    {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(key, item)| self.inner.decode(item).map(|decoded| (key, decoded)))
                .collect(),
            _ => None,
        }
    }
}

impl<T, C: Codec<T>> Codec<BTreeMap<String, T>> for MapCodec<C> {
    fn encode(&self, value: &BTreeMap<String, T>) -> Result<Entry> {
        self.encode_entries(value.iter())
    }

    fn decode(&self, value: Value) -> Option<BTreeMap<String, T>> {
        self.decode_entries(value)
    }
}

impl<T, C: Codec<T>> Codec<HashMap<String, T>> for MapCodec<C> {
    fn encode(&self, value: &HashMap<String, T>) -> Result<Entry> {
        self.encode_entries(value.iter())
    }

    fn decode(&self, value: Value) -> Option<HashMap<String, T>> {
        self.decode_entries(value)
    }
}

impl<T: Storable> Storable for Vec<T> {
    type Codec = ArrayCodec<T::Codec>;
}

impl<T: Storable> Storable for BTreeMap<String, T> {
    type Codec = MapCodec<T::Codec>;
}

impl<T: Storable> Storable for HashMap<String, T> {
    type Codec = MapCodec<T::Codec>;
}
