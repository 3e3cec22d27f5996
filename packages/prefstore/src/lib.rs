//! prefstore: typed, observable preferences over a key-value store.
//!
//! The workspace is layered:
//!
//! - `prefstore-core`: [`Key`], [`Value`], the [`Store`] trait and [`MemoryStore`]
//! - `prefstore-codec`: codecs mapping Rust types onto [`Value`]s, chosen
//!   through [`Storable`]
//! - `prefstore-json-store`: [`JsonFileStore`], a store persisted to disk
//! - this crate: [`StoreAdapter`], a cached handle for one key, and
//!   [`ChangeRelay`], which fans changes out to subscribers
//!
//! There is no global store. Build one at the composition root and hand an
//! `Arc<dyn Store>` to every adapter.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use prefstore::{MemoryStore, RawCodec, RawRepresentable, Storable, Store, StoreAdapter};
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! enum Direction { North, West, South, East }
//!
//! impl RawRepresentable for Direction {
//!     type Raw = i64;
//!
//!     fn raw_value(&self) -> i64 {
//!         *self as i64
//!     }
//!
//!     fn from_raw(raw: i64) -> Option<Self> {
//!         [Direction::North, Direction::West, Direction::South, Direction::East]
//!             .get(usize::try_from(raw).ok()?)
//!             .copied()
//!     }
//! }
//!
//! impl Storable for Direction {
//!     type Codec = RawCodec;
//! }
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let dir: StoreAdapter<Direction> = StoreAdapter::builder("dir", store)
//!     .default(Direction::North)
//!     .on_change(|d| println!("now facing {:?}", d))
//!     .build();
//!
//! dir.set(Direction::East).unwrap();
//! assert_eq!(dir.get(), Direction::East);
//! ```

mod adapter;
pub mod relay;

pub use adapter::{AdapterBuilder, AdapterOptions, NoDefault, StoreAdapter, WithDefault};
pub use relay::{ChangeRelay, ChangeStream, Interest, SubscriberId, Subscription};

pub use prefstore_codec::{
    ArrayCodec, Bytes, Codec, Convertible, ConvertibleCodec, Entry, JsonCodec, MapCodec,
    OptionalCodec, Primitive, PrimitiveCodec, RawCodec, RawRepresentable, Storable,
};
pub use prefstore_core::{
    Error, Key, MemoryStore, Observer, ObserverId, ObserverTable, Result, Store, Value,
};
pub use prefstore_json_store::{JsonFileStore, JsonStoreError};
