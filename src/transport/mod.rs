//! Tool-transport layer: one adapter per transport protocol.
//!
//! Every integration kind maps to exactly one adapter through an exhaustive
//! match, so adding a transport is a checked, explicit addition rather than a
//! new string branch.

pub mod backoff;
pub mod hosted;
pub mod http;
pub mod server;
pub mod stdio;
pub mod token;

pub use backoff::ReconnectPolicy;
pub use hosted::{HostedAdapter, HostedToolReference};
pub use http::{HttpAdapter, HttpAuth};
pub use server::{RmcpConnection, ServerConnection, ServerHandle, ServerToolSchema};
pub use stdio::StdioAdapter;
pub use token::{HostedClaims, TokenSigner};

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::integration::{IntegrationDescriptor, IntegrationKind};

/// Runtime artifact produced by one transport adapter.
#[derive(Debug)]
pub enum ToolSource {
    /// Reference to tools delegated entirely to a remote provider; never
    /// connected locally and not independently enumerable.
    Hosted(HostedToolReference),
    /// Connected server handle exposing an enumerable catalog.
    Server(ServerHandle),
}

impl ToolSource {
    /// Name of the integration this source came from.
    pub fn integration(&self) -> &str {
        match self {
            Self::Hosted(reference) => &reference.integration,
            Self::Server(handle) => handle.integration(),
        }
    }

    /// Release the source. Idempotent; a no-op for hosted references.
    pub async fn close(&self) -> Result<()> {
        match self {
            Self::Hosted(_) => Ok(()),
            Self::Server(handle) => handle.close().await,
        }
    }

    /// Whether the source holds no open connection.
    pub async fn is_closed(&self) -> bool {
        match self {
            Self::Hosted(_) => true,
            Self::Server(handle) => handle.is_closed().await,
        }
    }
}

/// One transport protocol's construction path.
///
/// `create` either returns a fully connected source or an error; it never
/// leaves a half-connected handle behind (connecting is the last step of a
/// successful create). Errors are absorbed by the orchestrator, not the
/// adapter.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    async fn create(
        &self,
        descriptor: &IntegrationDescriptor,
        ctx: &RequestContext,
    ) -> Result<ToolSource>;
}

/// What a per-integration tool-selection filter actually does at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEffect {
    /// Catalog enumerated locally and filtered client-side.
    Enforced,
    /// Filter forwarded to the server via header; honoring it is up to the
    /// deployment.
    ServerSide,
    /// Transport cannot enumerate tools; the filter is configuration-only.
    NoEffect,
}

/// Effect a configured `selected_tools` filter has for this descriptor, or
/// `None` when no filter is configured.
pub fn filter_effect(descriptor: &IntegrationDescriptor) -> Option<FilterEffect> {
    if descriptor.selected_tools.is_empty() {
        return None;
    }
    match descriptor.kind {
        IntegrationKind::Stdio => Some(FilterEffect::Enforced),
        IntegrationKind::Http => Some(FilterEffect::ServerSide),
        IntegrationKind::Hosted => Some(FilterEffect::NoEffect),
        // Vendor tool handlers are resolved outside the transport layer.
        IntegrationKind::VendorBuiltin => None,
    }
}

pub(crate) fn default_client_info() -> rmcp::model::ClientInfo {
    rmcp::model::ClientInfo {
        protocol_version: rmcp::model::ProtocolVersion::LATEST,
        ..Default::default()
    }
}
