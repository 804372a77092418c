//! Guardrail pipelines built from declarative names.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;
use crate::integration::GuardrailSpec;

/// Outcome of one guardrail evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl GuardrailVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// A pre- or post-execution validation step applied to model input or output.
#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, content: &str) -> Result<GuardrailVerdict>;
}

/// Ordered validation pipeline.
pub type GuardrailPipeline = Vec<Arc<dyn Guardrail>>;

/// Run a pipeline in order, stopping at the first blocking verdict.
pub async fn run_pipeline(pipeline: &GuardrailPipeline, content: &str) -> Result<GuardrailVerdict> {
    for guardrail in pipeline {
        let verdict = guardrail.evaluate(content).await?;
        if !verdict.allowed {
            tracing::info!(
                guardrail = %guardrail.name(),
                "Guardrail blocked content"
            );
            return Ok(verdict);
        }
    }
    Ok(GuardrailVerdict::allow())
}

/// Builds input/output guardrail pipelines from declared names.
///
/// Unknown names and construction failures are logged and skipped; a
/// misdeclared guardrail never fails agent construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuardrailRegistry;

impl GuardrailRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn input_guardrails(&self, spec: &GuardrailSpec) -> GuardrailPipeline {
        self.build(&spec.input, spec)
    }

    pub fn output_guardrails(&self, spec: &GuardrailSpec) -> GuardrailPipeline {
        self.build(&spec.output, spec)
    }

    fn build(&self, names: &[String], spec: &GuardrailSpec) -> GuardrailPipeline {
        let mut pipeline = Vec::new();
        for name in names {
            match self.construct(name, spec) {
                Ok(guardrail) => pipeline.push(guardrail),
                Err(error) => {
                    tracing::warn!(
                        guardrail = %name,
                        error = %error,
                        "Skipping guardrail that failed to construct"
                    );
                }
            }
        }
        pipeline
    }

    fn construct(&self, name: &str, spec: &GuardrailSpec) -> Result<Arc<dyn Guardrail>> {
        match name {
            "max-length" => {
                let limit = spec
                    .thresholds
                    .get("max-length")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(10_000) as usize;
                Ok(Arc::new(MaxLengthGuardrail { limit }))
            }
            "blocked-terms" => {
                let terms: Vec<String> = spec
                    .custom_instructions
                    .as_deref()
                    .unwrap_or_default()
                    .split(',')
                    .map(|term| term.trim().to_lowercase())
                    .filter(|term| !term.is_empty())
                    .collect();
                if terms.is_empty() {
                    return Err(crate::error::SwitchyardError::Configuration(
                        "blocked-terms guardrail declared without terms".into(),
                    ));
                }
                Ok(Arc::new(BlockedTermsGuardrail { terms }))
            }
            "no-email-pii" => Ok(Arc::new(EmailPiiGuardrail {
                pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                    .expect("static pattern must compile"),
            })),
            other => Err(crate::error::SwitchyardError::Configuration(format!(
                "unknown guardrail '{other}'"
            ))),
        }
    }
}

struct MaxLengthGuardrail {
    limit: usize,
}

#[async_trait]
impl Guardrail for MaxLengthGuardrail {
    fn name(&self) -> &str {
        "max-length"
    }

    async fn evaluate(&self, content: &str) -> Result<GuardrailVerdict> {
        if content.chars().count() > self.limit {
            return Ok(GuardrailVerdict::block(format!(
                "content exceeds {} characters",
                self.limit
            )));
        }
        Ok(GuardrailVerdict::allow())
    }
}

struct BlockedTermsGuardrail {
    terms: Vec<String>,
}

#[async_trait]
impl Guardrail for BlockedTermsGuardrail {
    fn name(&self) -> &str {
        "blocked-terms"
    }

    async fn evaluate(&self, content: &str) -> Result<GuardrailVerdict> {
        let lowered = content.to_lowercase();
        for term in &self.terms {
            if lowered.contains(term) {
                return Ok(GuardrailVerdict::block(format!(
                    "content contains blocked term '{term}'"
                )));
            }
        }
        Ok(GuardrailVerdict::allow())
    }
}

struct EmailPiiGuardrail {
    pattern: Regex,
}

#[async_trait]
impl Guardrail for EmailPiiGuardrail {
    fn name(&self) -> &str {
        "no-email-pii"
    }

    async fn evaluate(&self, content: &str) -> Result<GuardrailVerdict> {
        if self.pattern.is_match(content) {
            return Ok(GuardrailVerdict::block("content contains an email address"));
        }
        Ok(GuardrailVerdict::allow())
    }
}
