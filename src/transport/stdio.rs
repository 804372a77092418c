//! Stdio tool transport: local child-process servers.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use rmcp::service::ServiceExt;
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;

use crate::config::RuntimeSettings;
use crate::context::RequestContext;
use crate::error::{Result, SwitchyardError};
use crate::integration::IntegrationDescriptor;

use super::server::{map_client_initialize_error, RmcpConnection, ServerHandle};
use super::{default_client_info, ToolSource, TransportAdapter};

/// Adapter for local stdio tool servers.
pub struct StdioAdapter {
    _settings: Arc<RuntimeSettings>,
}

impl StdioAdapter {
    pub fn new(settings: Arc<RuntimeSettings>) -> Self {
        Self {
            _settings: settings,
        }
    }
}

#[async_trait]
impl TransportAdapter for StdioAdapter {
    async fn create(
        &self,
        descriptor: &IntegrationDescriptor,
        _ctx: &RequestContext,
    ) -> Result<ToolSource> {
        let command_line = descriptor.credential_str("command")?;
        let (program, args) = parse_command_line(&descriptor.name, command_line)?;

        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(env) = descriptor.credentials.get("env").and_then(|v| v.as_object()) {
            for (key, value) in env {
                if let Some(value) = value.as_str() {
                    command.env(key, value);
                }
            }
        }

        let transport = TokioChildProcess::new(command).map_err(|e| {
            SwitchyardError::Connection(format!(
                "failed to spawn '{program}' for integration '{}': {e}",
                descriptor.name
            ))
        })?;

        let service = default_client_info()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(map_client_initialize_error)?;

        tracing::debug!(
            integration = %descriptor.name,
            program = %program,
            "Connected stdio tool server"
        );

        let filter = if descriptor.selected_tools.is_empty() {
            None
        } else {
            Some(descriptor.selected_tools.clone())
        };
        Ok(ToolSource::Server(ServerHandle::new(
            descriptor.name.clone(),
            Box::new(RmcpConnection::new(service)),
            filter,
        )))
    }
}

/// Split a configured command line into program and arguments, rejecting
/// strings that cannot possibly launch cleanly. Failing here is cheaper than
/// leaking a broken child process.
fn parse_command_line(integration: &str, command_line: &str) -> Result<(String, Vec<String>)> {
    // Shell metacharacters mean the string was written for a shell we never
    // invoke; it would not do what its author expects.
    let metacharacters =
        Regex::new(r#"[;&|<>$`"'\\()]"#).expect("static pattern must compile");
    if metacharacters.is_match(command_line) {
        return Err(SwitchyardError::Configuration(format!(
            "integration '{integration}' has a command with shell metacharacters"
        )));
    }

    let mut tokens = command_line.split_whitespace();
    let program = tokens.next().ok_or_else(|| {
        SwitchyardError::Configuration(format!(
            "integration '{integration}' has an empty command"
        ))
    })?;

    let program_pattern =
        Regex::new(r"^[A-Za-z0-9_.+/-]+$").expect("static pattern must compile");
    if !program_pattern.is_match(program) {
        return Err(SwitchyardError::Configuration(format!(
            "integration '{integration}' has a malformed command token '{program}'"
        )));
    }

    Ok((
        program.to_owned(),
        tokens.map(str::to_owned).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::IntegrationKind;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn descriptor(credentials: serde_json::Value) -> IntegrationDescriptor {
        IntegrationDescriptor {
            kind: IntegrationKind::Stdio,
            name: "local-tools".into(),
            credentials,
            selected_tools: BTreeSet::new(),
            enabled: true,
        }
    }

    #[test]
    fn command_line_splits_interpreter_and_arguments() {
        let (program, args) =
            parse_command_line("local-tools", "python3 server.py --port 8000").unwrap();
        assert_eq!(program, "python3");
        assert_eq!(args, vec!["server.py", "--port", "8000"]);
    }

    #[test]
    fn command_line_rejects_shell_metacharacters() {
        for bad in ["python3; rm -rf /", "$(which python)", "a|b"] {
            let err = parse_command_line("local-tools", bad).unwrap_err();
            assert!(
                matches!(err, SwitchyardError::Configuration(_)),
                "expected configuration error for {bad:?}"
            );
        }
    }

    #[test]
    fn blank_command_is_rejected() {
        assert!(parse_command_line("local-tools", "   ").is_err());
    }

    #[tokio::test]
    async fn create_fails_before_spawn_on_malformed_command() {
        let adapter = StdioAdapter::new(Arc::new(RuntimeSettings::default()));
        let err = adapter
            .create(
                &descriptor(json!({"command": "node server.js && echo pwned"})),
                &RequestContext::new("org-1", "agent-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_surfaces_spawn_failure_for_nonexistent_program() {
        let adapter = StdioAdapter::new(Arc::new(RuntimeSettings::default()));
        let err = adapter
            .create(
                &descriptor(json!({"command": "/nonexistent/switchyard-test-server"})),
                &RequestContext::new("org-1", "agent-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::Connection(_)));
    }
}
