use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// Name of one symmetric key inside secure storage, normally a push topic.
///
/// An alias must not be reused across unrelated purposes. It is non-empty and
/// free of control characters so it can be logged and hashed into file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Validates and wraps an alias.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidAlias`] if the alias is empty, whitespace
    /// only, or contains control characters.
    pub fn new(alias: impl Into<String>) -> KeyResult<Self> {
        let alias = alias.into();
        if alias.trim().is_empty() || alias.chars().any(char::is_control) {
            return Err(KeyError::InvalidAlias(alias));
        }
        Ok(Self(alias))
    }

    /// Returns the alias as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeyAlias {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyAlias> for String {
    fn from(alias: KeyAlias) -> Self {
        alias.0
    }
}
