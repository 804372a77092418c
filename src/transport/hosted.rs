//! Hosted tool transport: remote provider-managed tool references.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Posture, RuntimeSettings};
use crate::context::RequestContext;
use crate::error::Result;
use crate::integration::IntegrationDescriptor;

use super::token::TokenSigner;
use super::{ToolSource, TransportAdapter};

/// Reference to a remote, provider-managed tool endpoint.
///
/// The orchestration layer never connects to it; the model provider invokes
/// the endpoint directly. Because the catalog lives remotely, individual
/// tools cannot be enumerated or filtered here.
#[derive(Debug, Clone)]
pub struct HostedToolReference {
    pub integration: String,
    pub label: String,
    pub url: String,
    /// `Bearer <token>` header value in production posture; absent otherwise.
    pub authorization: Option<String>,
}

/// Adapter for the hosted transport. Opens no local connection.
pub struct HostedAdapter {
    settings: Arc<RuntimeSettings>,
}

impl HostedAdapter {
    pub fn new(settings: Arc<RuntimeSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TransportAdapter for HostedAdapter {
    async fn create(
        &self,
        descriptor: &IntegrationDescriptor,
        ctx: &RequestContext,
    ) -> Result<ToolSource> {
        let url = descriptor.credential_str("remoteUrl")?.to_owned();
        let label = descriptor.credential_str("remoteLabel")?.to_owned();

        let authorization = match self.settings.posture {
            Posture::Production => {
                let signer = TokenSigner::new(
                    self.settings.hosted.signing_key.as_bytes().to_vec(),
                    self.settings.hosted.token_ttl_secs,
                )?;
                let token = signer.issue(
                    &ctx.organization_id,
                    descriptor.kind,
                    &descriptor.credentials,
                )?;
                Some(format!("Bearer {token}"))
            }
            Posture::Development => None,
        };

        tracing::debug!(
            integration = %descriptor.name,
            label = %label,
            "Resolved hosted tool reference"
        );

        Ok(ToolSource::Hosted(HostedToolReference {
            integration: descriptor.name.clone(),
            label,
            url,
            authorization,
        }))
    }
}
