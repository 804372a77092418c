//! Switchyard: agent runtime orchestration.
//!
//! Turns a declarative agent configuration into a live, tool-augmented
//! runnable agent by multiplexing three tool-transport protocols (hosted,
//! streaming HTTP, stdio) behind one adapter abstraction, and sustains
//! multi-turn conversation state across stateless requests with a
//! TTL-evicted session cache over a durable conversation store.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use switchyard::config::RuntimeSettings;
//! use switchyard::context::RequestContext;
//! use switchyard::factory::AgentFactory;
//! use switchyard::guardrails::GuardrailRegistry;
//! use switchyard::integration::PassthroughCredentialResolver;
//! use switchyard::orchestrator::IntegrationOrchestrator;
//! use switchyard::tools::UniversalToolRegistry;
//!
//! # async fn example(
//! #     catalog: Arc<dyn switchyard::integration::IntegrationCatalog>,
//! #     definition: switchyard::integration::AgentDefinition,
//! # ) -> switchyard::error::Result<()> {
//! let settings = Arc::new(RuntimeSettings::load()?);
//! let factory = AgentFactory::new(
//!     IntegrationOrchestrator::new(
//!         catalog,
//!         Arc::new(PassthroughCredentialResolver),
//!         settings,
//!     ),
//!     GuardrailRegistry::new(),
//!     Arc::new(UniversalToolRegistry::with_defaults()),
//! );
//!
//! let ctx = RequestContext::new("org-1", definition.id.clone());
//! let (agent, cleanup) = factory.create(&definition, &ctx).await?;
//! // ... run the turn ...
//! cleanup.close_all().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod guardrails;
pub mod integration;
pub mod orchestrator;
pub mod session;
pub mod tools;
pub mod transport;

pub mod prelude;
