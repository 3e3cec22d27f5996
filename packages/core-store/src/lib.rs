//! Core prefstore: the store layer.
//!
//! This layer defines what a preference store is, independent of any typed
//! access on top of it:
//! - `Key`: Opaque string naming one slot
//! - `Value`: The primitives a store persists natively
//! - `Store`: get/set/remove/has, a registration domain for defaults, and
//!   per-key observation
//! - `MemoryStore`: A process-local implementation
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use prefstore_core::{Key, MemoryStore, Store, Value};
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! store.set(&Key::from_static("volume"), Value::Float(17.5)).unwrap();
//! assert!(store.has(&"volume".into()).unwrap());
//! ```

mod error;
mod key;
mod memory_store;
pub mod observers;
pub mod store;
mod value;

pub use error::{Error, Result};
pub use key::Key;
pub use memory_store::{Domains, MemoryStore};
pub use observers::{Observer, ObserverId, ObserverTable};
pub use store::Store;
pub use value::Value;
