//! Optional values.

use prefstore_core::{Result, Value};

use crate::{Codec, Entry};

/// Codec for `Option<T>`, wrapping the codec for `T`.
///
/// `None` encodes to [`Entry::Absent`]. A stored value that the inner codec
/// rejects decodes to `None`, so the adapter falls back to its default just
/// as it does for a missing key.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalCodec<C> {
    inner: C,
}

impl<C> OptionalCodec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<T, C: Codec<T>> Codec<Option<T>> for OptionalCodec<C> {
    fn encode(&self, value: &Option<T>) -> Result<Entry> {
        match value {
            Some(inner) => self.inner.encode(inner),
            None => Ok(Entry::Absent),
        }
    }

    fn decode(&self, value: Value) -> Option<Option<T>> {
        self.inner.decode(value).map(Some)
    }
}

impl<T: crate::Storable> crate::Storable for Option<T> {
    type Codec = OptionalCodec<T::Codec>;
}
