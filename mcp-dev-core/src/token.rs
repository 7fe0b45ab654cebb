//! Session token shared between the browser and the inspector's proxy server.

use std::fmt;

use crate::error::{LaunchError, LaunchResult};

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 32;

/// A 256-bit random credential, hex encoded.
///
/// `Debug` output is redacted; use [`SessionToken::as_str`] where the raw
/// value is required.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Read [`TOKEN_BYTES`] from the OS CSPRNG and hex encode them.
    ///
    /// # Errors
    ///
    /// `LaunchError::Entropy` if the OS source is unavailable.
    pub fn generate() -> LaunchResult<Self> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|e| LaunchError::Entropy {
            reason: e.to_string(),
        })?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Wrap an existing hex token.
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}
