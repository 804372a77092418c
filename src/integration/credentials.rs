//! Credential resolution seam.

use async_trait::async_trait;

use crate::error::Result;

/// Decrypts and validates stored integration credentials.
///
/// The platform supplies the real implementation (KMS, envelope encryption,
/// etc.); the orchestration layer only asks two questions.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Whether the stored credential document is an encrypted envelope.
    fn is_encrypted(&self, credentials: &serde_json::Value) -> bool;

    /// Decrypt an encrypted credential document into its plaintext form.
    async fn decrypt(&self, credentials: &serde_json::Value) -> Result<serde_json::Value>;
}

/// Resolver for deployments storing credentials in the clear (development,
/// tests). Treats nothing as encrypted and returns documents unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCredentialResolver;

#[async_trait]
impl CredentialResolver for PassthroughCredentialResolver {
    fn is_encrypted(&self, _credentials: &serde_json::Value) -> bool {
        false
    }

    async fn decrypt(&self, credentials: &serde_json::Value) -> Result<serde_json::Value> {
        Ok(credentials.clone())
    }
}
