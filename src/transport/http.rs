//! Streaming HTTP tool transport with bounded reconnection.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use rmcp::service::ServiceExt;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use serde::{Deserialize, Serialize};

use crate::config::{Posture, RuntimeSettings};
use crate::context::RequestContext;
use crate::error::{Result, SwitchyardError};
use crate::integration::IntegrationDescriptor;

use super::backoff::ReconnectPolicy;
use super::server::{map_client_initialize_error, RmcpConnection, RunningClient, ServerHandle};
use super::{default_client_info, ToolSource, TransportAdapter};

/// Header carrying the selected-tool filter to deployments that support
/// server-side catalog filtering.
pub const SELECTED_TOOLS_HEADER: &str = "x-mcp-selected-tools";

/// Authentication block accepted by the HTTP transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HttpAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    ApiKeyHeader {
        #[serde(rename = "headerName")]
        header_name: String,
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl HttpAuth {
    /// Parse the optional `auth` block from a credential document.
    pub fn from_credentials(credentials: &serde_json::Value) -> Result<Self> {
        match credentials.get("auth") {
            None | Some(serde_json::Value::Null) => Ok(Self::None),
            Some(block) => serde_json::from_value(block.clone()).map_err(|e| {
                SwitchyardError::Configuration(format!("invalid auth block: {e}"))
            }),
        }
    }
}

/// Adapter for persistent streaming HTTP tool servers.
pub struct HttpAdapter {
    settings: Arc<RuntimeSettings>,
}

impl HttpAdapter {
    pub fn new(settings: Arc<RuntimeSettings>) -> Self {
        Self { settings }
    }

    fn reconnect_policy(&self) -> ReconnectPolicy {
        match self.settings.posture {
            Posture::Production => ReconnectPolicy::from_settings(&self.settings.reconnect),
            Posture::Development => ReconnectPolicy::single_attempt(),
        }
    }

    async fn connect_once(&self, endpoint: &str, headers: HeaderMap) -> Result<RunningClient> {
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let transport = StreamableHttpClientTransport::with_client(
            client,
            StreamableHttpClientTransportConfig::with_uri(endpoint.to_owned()),
        );

        default_client_info()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(map_client_initialize_error)
    }
}

#[async_trait]
impl TransportAdapter for HttpAdapter {
    async fn create(
        &self,
        descriptor: &IntegrationDescriptor,
        _ctx: &RequestContext,
    ) -> Result<ToolSource> {
        let endpoint = descriptor.credential_str("endpointUrl")?.to_owned();
        let auth = HttpAuth::from_credentials(&descriptor.credentials)?;
        let headers = build_headers(&descriptor.name, &auth, descriptor)?;

        let policy = self.reconnect_policy();
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts {
            match self.connect_once(&endpoint, headers.clone()).await {
                Ok(service) => {
                    tracing::debug!(
                        integration = %descriptor.name,
                        attempt,
                        "Connected streaming HTTP tool server"
                    );
                    // Filtering happens server-side (if at all); expose the
                    // catalog as the server reports it.
                    return Ok(ToolSource::Server(ServerHandle::new(
                        descriptor.name.clone(),
                        Box::new(RmcpConnection::new(service)),
                        None,
                    )));
                }
                Err(error) => {
                    if attempt < policy.max_attempts {
                        let delay = policy.jittered_delay_for(attempt);
                        tracing::warn!(
                            integration = %descriptor.name,
                            attempt,
                            max_attempts = policy.max_attempts,
                            error = %error,
                            "Reconnecting tool server after error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        // Exhausted the reconnect budget.
        if policy.max_attempts > 1 {
            return Err(SwitchyardError::Timeout(
                policy.total_budget().as_millis() as u64
            ));
        }
        Err(last_error
            .unwrap_or_else(|| SwitchyardError::Connection("connect never attempted".into())))
    }
}

fn build_headers(
    integration: &str,
    auth: &HttpAuth,
    descriptor: &IntegrationDescriptor,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    match auth {
        HttpAuth::None => {}
        HttpAuth::Bearer { token } => {
            headers.insert(AUTHORIZATION, header_value(integration, format!("Bearer {token}"))?);
        }
        HttpAuth::ApiKeyHeader {
            header_name,
            api_key,
        } => {
            let name = HeaderName::from_bytes(header_name.as_bytes()).map_err(|_| {
                SwitchyardError::Configuration(format!(
                    "integration '{integration}' has invalid header name '{header_name}'"
                ))
            })?;
            headers.insert(name, header_value(integration, api_key.clone())?);
        }
        HttpAuth::Basic { username, password } => {
            let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
            headers.insert(AUTHORIZATION, header_value(integration, format!("Basic {encoded}"))?);
        }
    }

    if !descriptor.selected_tools.is_empty() {
        let names: Vec<&str> = descriptor.selected_tools.iter().map(String::as_str).collect();
        let value = serde_json::to_string(&names)?;
        headers.insert(
            HeaderName::from_static(SELECTED_TOOLS_HEADER),
            header_value(integration, value)?,
        );
    }

    Ok(headers)
}

fn header_value(integration: &str, value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|_| {
        SwitchyardError::Configuration(format!(
            "integration '{integration}' has a header value with invalid characters"
        ))
    })
}
