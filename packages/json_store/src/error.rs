use std::{io, path};

use prefstore_core::Error;

#[derive(thiserror::Error, Debug)]
pub enum JsonStoreError {
    #[error("Preferences path {path} cannot be used: {error}")]
    PathInvalid { path: path::PathBuf, error: io::Error },
    #[error("Preferences document has version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("No configuration directory is known for this platform")]
    NoConfigDir,
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    SerializationError(#[from] serde_json::error::Error),
    #[error("{0}")]
    StoreError(#[from] Error),
}

impl From<JsonStoreError> for Error {
    fn from(error: JsonStoreError) -> Self {
        match error {
            JsonStoreError::Io(error) => Error::Io(error),
            JsonStoreError::SerializationError(error) => Error::Serialization {
                message: format!("{}", error),
            },
            JsonStoreError::StoreError(store_error) => store_error,
            JsonStoreError::PathInvalid { .. }
            | JsonStoreError::UnsupportedVersion { .. }
            | JsonStoreError::NoConfigDir => Error::Storage {
                message: format!("{}", error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_stay_io_errors() {
        let error = JsonStoreError::from(io::Error::other("disk gone"));
        assert!(matches!(Error::from(error), Error::Io(_)));
    }

    #[test]
    fn version_mismatch_becomes_storage_error() {
        let error = JsonStoreError::UnsupportedVersion {
            found: 7,
            expected: 1,
        };

        match Error::from(error) {
            Error::Storage { message } => assert!(message.contains("version 7")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn serialization_errors_keep_their_message() {
        let json_error = serde_json::from_str::<u8>("{").unwrap_err();
        let expected = format!("{}", json_error);

        match Error::from(JsonStoreError::from(json_error)) {
            Error::Serialization { message } => assert_eq!(message, expected),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn store_errors_pass_through() {
        let error = JsonStoreError::from(Error::storage("locked"));
        assert!(matches!(Error::from(error), Error::Storage { message } if message == "locked"));
    }
}
