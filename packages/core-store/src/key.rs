//! Keys naming store slots.

use std::borrow::{Borrow, Cow};
use std::fmt;

/// Names one slot in a [`Store`](crate::Store).
///
/// Keys are opaque strings. Two keys built from equal strings are
/// interchangeable, whether they were created from a literal or an owned
/// string.
///
/// ```rust
/// use prefstore_core::Key;
///
/// const VOLUME: Key = Key::from_static("volume");
///
/// assert_eq!(VOLUME, Key::new(String::from("volume")));
/// assert_eq!(VOLUME, "volume".into());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Cow<'static, str>);

impl Key {
    /// Create a key from a static string.
    pub const fn from_static(s: &'static str) -> Self {
        Key(Cow::Borrowed(s))
    }

    /// Create a key from an owned string.
    pub fn new(s: impl Into<String>) -> Self {
        Key(Cow::Owned(s.into()))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Key {
    fn from(s: &'static str) -> Self {
        Key(Cow::Borrowed(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(Cow::Owned(s))
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}
