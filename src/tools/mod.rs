//! Tool system: the agent-callable tool trait, server-bridged tools, and the
//! universal tool registry.

pub mod server;
pub mod tool;
pub mod universal;

pub use server::ServerTool;
pub use tool::{FnTool, Tool, ToolArguments, ToolParameters};
pub use universal::{ProviderTool, UniversalToolRegistry, UniversalTools};
