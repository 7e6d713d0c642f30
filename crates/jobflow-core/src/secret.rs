//! Secret provider trait definition.

use jobflow_types::error::SecretError;

/// Trait for secret lookup backends (environment, vault, ...).
///
/// The executor resolves each secret a task contract declares through this
/// trait before the job's process is spawned, and injects the value into
/// the process environment under the secret's name.
pub trait SecretProvider: Send + Sync {
    /// Retrieve a secret value by key.
    /// Returns None if the secret does not exist in this provider.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, SecretError>> + Send;
}
