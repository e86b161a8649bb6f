//! Ownership tokens identifying a lock instance.

use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated tokens, in alphanumeric characters (~142 bits).
pub const TOKEN_LENGTH: usize = 24;

/// Value stored under the lock key, proving which instance holds it.
///
/// Tokens are unique per lock instance, not per resource name, and never
/// change for the lifetime of the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnershipToken(String);

impl OwnershipToken {
    /// Generates a random token of [`TOKEN_LENGTH`] characters.
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Uses the supplied token, or generates one when it is absent or empty.
    pub fn supplied_or_generate(token: Option<String>) -> Self {
        match token {
            Some(token) if !token.is_empty() => Self(token),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OwnershipToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnershipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
