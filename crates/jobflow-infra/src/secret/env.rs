//! Environment variable secret provider.
//!
//! Key resolution: first `JOBFLOW_SECRET_<KEY>`, then `<KEY>` directly. The
//! prefixed form lets a secret be handed to jobflow without exporting it
//! under its bare name to every other process in the shell.

use jobflow_core::secret::SecretProvider;
use jobflow_types::error::SecretError;

/// Prefix checked before the bare key.
pub const SECRET_PREFIX: &str = "JOBFLOW_SECRET_";

/// Read-only secret provider over the process environment.
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretProvider for EnvSecretProvider {
    async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(SecretError::InvalidValue(format!(
                "'{key}' is not a valid environment variable name"
            )));
        }

        for name in [format!("{SECRET_PREFIX}{key}"), key.to_string()] {
            match std::env::var(&name) {
                Ok(value) => return Ok(Some(value)),
                Err(std::env::VarError::NotPresent) => {}
                Err(std::env::VarError::NotUnicode(_)) => {
                    // Secrets must be valid strings; treat as absent.
                    tracing::warn!(variable = name.as_str(), "ignoring non-unicode secret value");
                }
            }
        }
        Ok(None)
    }
}
