//! Structured values stored as JSON byte buffers.

use prefstore_core::{Error, Result, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Codec, Entry};

/// Codec for arbitrary serde types.
///
/// The value is serialized to JSON and stored as [`Value::Bytes`]. The store
/// treats the buffer as opaque. Serialization failures surface as
/// [`Error::Encode`]; a buffer that does not deserialize into `T` (a renamed
/// field, an unknown enum variant, plain garbage) decodes to `None`.
///
/// JSON has no NaN or infinity. `serde_json` writes such float fields as
/// `null` without failing, so a value carrying one encodes successfully but
/// no longer decodes into `T`, and an adapter reads it back as its default.
/// Store non-finite floats through [`PrimitiveCodec`](crate::PrimitiveCodec)
/// instead.
///
/// # Example
///
/// ```rust
/// use prefstore_codec::{Codec, Entry, JsonCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct User { name: String, age: u32 }
///
/// let user = User { name: "Alice".into(), age: 30 };
/// let stored = JsonCodec.encode(&user).unwrap().into_value().unwrap();
///
/// assert_eq!(stored.as_bytes(), Some(&br#"{"name":"Alice","age":30}"#[..]));
/// assert_eq!(Codec::<User>::decode(&JsonCodec, stored), Some(user));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Entry> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::encode::<T>(e.to_string()))?;
        Ok(Entry::Present(Value::Bytes(bytes)))
    }

    fn decode(&self, value: Value) -> Option<T> {
        match value {
            Value::Bytes(bytes) => serde_json::from_slice(&bytes).ok(),
            _ => None,
        }
    }
}
