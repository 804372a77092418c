//! Universal tools: always-available tools every agent can opt into,
//! independent of any configured integration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SwitchyardError;

use super::tool::{FnTool, Tool, ToolParameters};

/// A tool executed by the model provider itself (for example provider-side
/// web search). The orchestration layer only declares it; there is nothing
/// to connect or close.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderTool {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Resolved universal tools for one agent.
pub struct UniversalTools {
    pub custom_tools: Vec<Arc<dyn Tool>>,
    pub builtin_provider_tools: Vec<ProviderTool>,
}

/// Registry of universal tools, filtered per agent by selected names.
pub struct UniversalToolRegistry {
    custom_tools: Vec<Arc<dyn Tool>>,
    provider_tools: Vec<ProviderTool>,
}

impl UniversalToolRegistry {
    /// Registry with the stock universal tools.
    pub fn with_defaults() -> Self {
        Self {
            custom_tools: vec![current_time_tool(), calculator_tool()],
            provider_tools: vec![ProviderTool {
                name: "web_search".into(),
                config: serde_json::json!({}),
            }],
        }
    }

    pub fn empty() -> Self {
        Self {
            custom_tools: Vec::new(),
            provider_tools: Vec::new(),
        }
    }

    /// Tools filtered by the agent's selected-tool names. An empty selection
    /// means every universal tool is available.
    pub fn get_all_tools(&self, selected: &[String]) -> UniversalTools {
        if selected.is_empty() {
            return UniversalTools {
                custom_tools: self.custom_tools.clone(),
                builtin_provider_tools: self.provider_tools.clone(),
            };
        }

        UniversalTools {
            custom_tools: self
                .custom_tools
                .iter()
                .filter(|tool| selected.iter().any(|name| name == tool.name()))
                .cloned()
                .collect(),
            builtin_provider_tools: self
                .provider_tools
                .iter()
                .filter(|tool| selected.iter().any(|name| name == &tool.name))
                .cloned()
                .collect(),
        }
    }
}

/// Create the `current_time` tool.
pub fn current_time_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "current_time",
        "Get the current UTC time",
        ToolParameters::empty(),
        |_args| async move {
            let now = chrono::Utc::now();
            Ok(serde_json::json!({
                "current_time": now.to_rfc3339(),
                "timezone": "UTC",
                "unix_timestamp": now.timestamp(),
            }))
        },
    ))
}

/// Create the `calculator` tool for basic arithmetic.
pub fn calculator_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "calculator",
        "Perform a basic arithmetic operation on two numbers",
        ToolParameters::object()
            .string_enum("operation", "The operation to apply", &["add", "subtract", "multiply", "divide"], true)
            .number("a", "Left operand", true)
            .number("b", "Right operand", true)
            .build(),
        |args| async move {
            let operation = args.get_str("operation")?.to_owned();
            let a = args.get_f64("a")?;
            let b = args.get_f64("b")?;

            let result = match operation.as_str() {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" => {
                    if b == 0.0 {
                        return Err(SwitchyardError::ToolExecution {
                            tool_name: "calculator".into(),
                            message: "division by zero".into(),
                        });
                    }
                    a / b
                }
                other => {
                    return Err(SwitchyardError::InvalidArgument(format!(
                        "unknown operation '{other}'"
                    )))
                }
            };

            Ok(serde_json::json!({ "result": result }))
        },
    ))
}
