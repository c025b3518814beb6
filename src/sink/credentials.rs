//! Credential providers for the remote ingestion endpoint.
//!
//! Secret material is never part of [`crate::config::Config`] and never
//! compiled in; it is resolved through a [`CredentialsProvider`] when a
//! request is made.

use crate::error::{Error, Result};

/// Environment variable holding the access key id.
pub const ACCESS_KEY_ENV: &str = "SENSORBAND_ACCESS_KEY";

/// Environment variable holding the secret key.
pub const SECRET_KEY_ENV: &str = "SENSORBAND_SECRET_KEY";

/// Access key pair for the ingestion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret key.
    pub secret_access_key: String,
}

impl Credentials {
    /// Create a key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Source of credentials.
pub trait CredentialsProvider: Send + Sync {
    /// Resolve the current credentials.
    fn credentials(&self) -> Result<Credentials>;
}

/// Reads credentials from environment variables on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    access_key_var: String,
    secret_key_var: String,
}

impl EnvCredentials {
    /// Read from [`ACCESS_KEY_ENV`] and [`SECRET_KEY_ENV`].
    pub fn new() -> Self {
        Self::with_vars(ACCESS_KEY_ENV, SECRET_KEY_ENV)
    }

    /// Read from custom variable names.
    pub fn with_vars(access_key_var: impl Into<String>, secret_key_var: impl Into<String>) -> Self {
        Self {
            access_key_var: access_key_var.into(),
            secret_key_var: secret_key_var.into(),
        }
    }

    fn read_var(name: &str) -> Result<String> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(Error::CredentialsMissing(format!("{name} is not set"))),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialsProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            access_key_id: Self::read_var(&self.access_key_var)?,
            secret_access_key: Self::read_var(&self.secret_key_var)?,
        })
    }
}

/// Fixed credentials injected by the embedding host.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    /// Wrap a key pair.
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}
