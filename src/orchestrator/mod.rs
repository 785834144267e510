//! Multi-agent orchestration core for the smart-home assistant.
//!
//! Turns a free-form user request into one or more LLM-agent invocations
//! and a single synthesized reply. See [`engine::Engine`] for the entry
//! point; [`workflow::WorkflowRuntime`] wires the router, dispatcher, and
//! aggregator executors that do the actual work.
//!
//! Concrete LLM provider adapters, embedding providers, skill/tool
//! implementations, auth, and the remote-agent wire transport are not part
//! of this crate — only the [`chat_client`], [`registry`], and [`task`]
//! traits those collaborators must implement.

pub mod aggregator;
pub mod chat_client;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod invoker;
pub mod observer;
pub mod registry;
pub mod router;
pub mod routing_cache;
pub mod session;
pub mod task;
pub mod types;
pub mod workflow;

pub use engine::Engine;
pub use types::OrchestratorResult;
