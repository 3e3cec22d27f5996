//! A [`Store`](prefstore_core::Store) persisted as a single JSON document.

mod error;
pub mod file_store;

pub use error::JsonStoreError;
pub use file_store::JsonFileStore;
