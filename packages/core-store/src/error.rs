//! Error types for the core layer.

/// Errors raised by stores and codecs.
///
/// There is no decode variant: a value that cannot be decoded is treated as
/// missing and resolved to a default by the layers above.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A value could not be encoded into a store primitive.
    #[error("encode error for {type_name}: {message}")]
    Encode {
        type_name: &'static str,
        message: String,
    },

    /// The backing store failed to complete an operation.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// An I/O error from a persistent store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store's on-disk representation could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl Error {
    /// Create an encode error for values of type `T`.
    pub fn encode<T: ?Sized>(message: impl Into<String>) -> Self {
        Error::Encode {
            type_name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Storage error for a poisoned lock inside `what`.
    pub fn poisoned(what: &str) -> Self {
        Error::Storage {
            message: format!("{} lock poisoned", what),
        }
    }
}

/// Result alias for the core layer.
pub type Result<T> = std::result::Result<T, Error>;
