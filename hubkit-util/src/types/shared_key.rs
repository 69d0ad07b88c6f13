use std::fmt::Debug;
use std::ops::Deref;

/// A base64 encoded signing key.
///
/// The key never shows up in debug output, so configuration structs holding
/// one can be traced safely.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey(String);

impl Deref for SharedKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

impl From<String> for SharedKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SharedKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
