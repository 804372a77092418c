//! Connected tool-server handles and the rmcp-backed connection.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, Content, JsonObject, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError},
};
use tokio::sync::Mutex;

use crate::error::{Result, SwitchyardError};

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type RunningClient = RunningService<RoleClient, DynClientService>;

/// Tool description enumerated from a connected server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Low-level operations of one connected tool server.
///
/// The production implementation wraps an rmcp running service; tests swap
/// in mocks.
#[async_trait]
pub trait ServerConnection: Send {
    async fn list_tools(&mut self) -> Result<Vec<ServerToolSchema>>;
    async fn call_tool(&mut self, name: &str, arguments: serde_json::Value)
        -> Result<serde_json::Value>;
    async fn close(&mut self) -> Result<()>;
}

struct HandleState {
    connection: Option<Box<dyn ServerConnection>>,
}

/// Shared handle to one connected tool server.
///
/// Cloned into every tool bridged from the server; `close` is idempotent and
/// leaves later calls failing with a connection error instead of panicking.
#[derive(Clone)]
pub struct ServerHandle {
    integration: String,
    /// Client-side tool filter; `None` means the catalog is exposed as-is.
    filter: Option<BTreeSet<String>>,
    state: Arc<Mutex<HandleState>>,
}

impl ServerHandle {
    pub fn new(
        integration: impl Into<String>,
        connection: Box<dyn ServerConnection>,
        filter: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            integration: integration.into(),
            filter,
            state: Arc::new(Mutex::new(HandleState {
                connection: Some(connection),
            })),
        }
    }

    /// Name of the integration this handle belongs to.
    pub fn integration(&self) -> &str {
        &self.integration
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.connection.is_none()
    }

    /// Enumerate the server catalog, applying the client-side filter.
    pub async fn list_tools(&self) -> Result<Vec<ServerToolSchema>> {
        let mut state = self.state.lock().await;
        let connection = state.connection.as_mut().ok_or_else(|| {
            SwitchyardError::Connection(format!(
                "tool server for integration '{}' is closed",
                self.integration
            ))
        })?;

        let tools = connection.list_tools().await?;
        Ok(match &self.filter {
            Some(selected) => tools
                .into_iter()
                .filter(|tool| selected.contains(&tool.name))
                .collect(),
            None => tools,
        })
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut state = self.state.lock().await;
        let connection = state.connection.as_mut().ok_or_else(|| {
            SwitchyardError::Connection(format!(
                "tool server for integration '{}' is closed",
                self.integration
            ))
        })?;
        connection.call_tool(name, arguments).await
    }

    /// Close the underlying connection. Benign no-op when already closed.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.connection.take() {
            Some(mut connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("integration", &self.integration)
            .field("filter", &self.filter)
            .finish()
    }
}

/// [`ServerConnection`] backed by an rmcp running service.
pub struct RmcpConnection {
    service: Option<RunningClient>,
}

impl RmcpConnection {
    pub fn new(service: RunningClient) -> Self {
        Self {
            service: Some(service),
        }
    }

    fn service_mut(&mut self) -> Result<&mut RunningClient> {
        self.service
            .as_mut()
            .ok_or_else(|| SwitchyardError::Connection("tool server session is closed".into()))
    }
}

#[async_trait]
impl ServerConnection for RmcpConnection {
    async fn list_tools(&mut self) -> Result<Vec<ServerToolSchema>> {
        let session = self.service_mut()?;

        let tools = match session.list_all_tools().await {
            Ok(tools) => tools,
            // Some servers mishandle cursor pagination; fall back to one page.
            Err(ServiceError::UnexpectedResponse) => {
                let page = session
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error("list_tools", e))?;
                page.tools
            }
            Err(e) => return Err(map_service_error("list_tools", e)),
        };

        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let arguments = coerce_tool_arguments(arguments)?;
        let session = self.service_mut()?;

        let result = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;

        map_call_result(name, result)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(service) = self.service.take() {
            service
                .cancel()
                .await
                .map_err(|e| SwitchyardError::Connection(format!("close failed: {e}")))?;
        }
        Ok(())
    }
}

fn map_tool_schema(tool: rmcp::model::Tool) -> ServerToolSchema {
    ServerToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                SwitchyardError::InvalidArgument(format!(
                    "tool arguments must be valid JSON: {e}"
                ))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(SwitchyardError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<serde_json::Value> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| text_content.clone())
            .unwrap_or_else(|| "tool returned an error result".into());

        return Err(SwitchyardError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    if let Some(text) = text_content {
        return Ok(serde_json::Value::String(text));
    }
    Ok(serde_json::Value::Array(
        result
            .content
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect(),
    ))
}

pub(crate) fn map_client_initialize_error(error: ClientInitializeError) -> SwitchyardError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            SwitchyardError::Connection(format!("initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            SwitchyardError::Connection(format!("initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => SwitchyardError::Connection(format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => {
            SwitchyardError::Connection("initialize cancelled".into())
        }
        other => SwitchyardError::Connection(format!("initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> SwitchyardError {
    match error {
        ServiceError::McpError(error) => SwitchyardError::Connection(format!(
            "{context}: server error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportSend(error) => {
            SwitchyardError::Connection(format!("{context}: transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            SwitchyardError::Connection(format!("{context}: transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            SwitchyardError::Connection(format!("{context}: unexpected server response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            SwitchyardError::Connection(format!("{context}: request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => SwitchyardError::Timeout(timeout.as_millis() as u64),
        other => SwitchyardError::Connection(format!("{context}: service error: {other}")),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{test_tool, MockConnection};
    use super::*;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn handle_filters_catalog_when_selection_present() {
        let (connection, _closes) = MockConnection::with_tools(&["a", "b", "c"]);
        let filter = Some(["a".to_string(), "b".to_string()].into_iter().collect());
        let handle = ServerHandle::new("local", Box::new(connection), filter);

        let tools = handle.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn handle_passes_catalog_through_without_filter() {
        let (connection, _closes) = MockConnection::with_tools(&["a", "b"]);
        let handle = ServerHandle::new("remote", Box::new(connection), None);

        assert_eq!(handle.list_tools().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn double_close_is_a_benign_noop() {
        let (connection, closes) = MockConnection::with_tools(&[]);
        let handle = ServerHandle::new("local", Box::new(connection), None);

        handle.close().await.unwrap();
        handle.close().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(handle.is_closed().await);
    }

    #[tokio::test]
    async fn closed_handle_rejects_tool_calls() {
        let (connection, _closes) = MockConnection::with_tools(&["a"]);
        let handle = ServerHandle::new("local", Box::new(connection), None);
        handle.close().await.unwrap();

        let err = handle.call_tool("a", json!({})).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Connection(message) if message.contains("closed")));
    }

    #[test]
    fn coerce_tool_arguments_accepts_object_and_stringified_object() {
        let from_obj = coerce_tool_arguments(json!({"city": "nyc"}))
            .expect("object arguments should parse")
            .expect("object should be present");
        assert_eq!(from_obj.get("city"), Some(&json!("nyc")));

        let from_str = coerce_tool_arguments(json!(r#"{"city":"la"}"#))
            .expect("stringified object should parse")
            .expect("object should be present");
        assert_eq!(from_str.get("city"), Some(&json!("la")));
    }

    #[test]
    fn coerce_tool_arguments_rejects_non_object() {
        let err = coerce_tool_arguments(json!(["bad"])).expect_err("array should be rejected");
        assert!(matches!(err, SwitchyardError::InvalidArgument(_)));
    }

    #[test]
    fn map_call_result_surfaces_error_payload_as_tool_execution() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "lookup failed" }
            ],
            "isError": true
        }))
        .expect("fixture call result should deserialize");

        let err = map_call_result("lookup", result).unwrap_err();
        assert!(matches!(
            err,
            SwitchyardError::ToolExecution { tool_name, message }
            if tool_name == "lookup" && message.contains("lookup failed")
        ));
    }

    #[test]
    fn map_call_result_prefers_structured_content() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "fallback" }
            ],
            "structuredContent": { "rows": 3 },
            "isError": false
        }))
        .unwrap();

        let value = map_call_result("lookup", result).unwrap();
        assert_eq!(value["rows"], 3);
    }

    #[test]
    fn tool_schema_mapping_keeps_filterable_names() {
        let schema = test_tool("lookup");
        assert_eq!(schema.name, "lookup");
        assert_eq!(schema.input_schema["type"], "object");
    }
}
