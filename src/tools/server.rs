//! Bridge server-enumerated tools into the core [`Tool`] trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::{ServerHandle, ServerToolSchema};

use super::tool::{Tool, ToolArguments, ToolParameters};

/// One tool enumerated from a connected server, bound to its handle.
///
/// Holds a clone of the shared handle; once the handle is closed, execution
/// fails with a connection error rather than panicking.
pub struct ServerTool {
    handle: ServerHandle,
    name: String,
    description: String,
    parameters: ToolParameters,
}

impl ServerTool {
    pub fn new(handle: ServerHandle, schema: ServerToolSchema) -> Self {
        Self {
            handle,
            name: schema.name,
            description: schema.description.unwrap_or_default(),
            parameters: ToolParameters::from_schema(schema.input_schema),
        }
    }

    /// Name of the integration the backing server belongs to.
    pub fn integration(&self) -> &str {
        self.handle.integration()
    }
}

#[async_trait]
impl Tool for ServerTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value> {
        self.handle.call_tool(&self.name, args.raw().clone()).await
    }
}

impl std::fmt::Debug for ServerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTool")
            .field("name", &self.name)
            .field("integration", &self.handle.integration())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwitchyardError;
    use crate::transport::server::test_support::{test_tool, MockConnection};
    use serde_json::json;

    #[tokio::test]
    async fn server_tool_delegates_execution_to_its_handle() {
        let (connection, _closes) = MockConnection::with_tools(&["lookup"]);
        let handle = ServerHandle::new("crm", Box::new(connection), None);
        let tool = ServerTool::new(handle, test_tool("lookup"));

        assert_eq!(tool.name(), "lookup");
        assert_eq!(tool.integration(), "crm");

        let result = tool
            .execute(&ToolArguments::new(json!({"q": "acme"})))
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn execution_after_close_fails_cleanly() {
        let (connection, _closes) = MockConnection::with_tools(&["lookup"]);
        let handle = ServerHandle::new("crm", Box::new(connection), None);
        let tool = ServerTool::new(handle.clone(), test_tool("lookup"));

        handle.close().await.unwrap();
        let err = tool
            .execute(&ToolArguments::new(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::Connection(_)));
    }
}
