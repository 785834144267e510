//! Wires Router -> Dispatch -> Aggregator as a fixed, typed pipeline.
//!
//! There is no reflection or mode-keyed dispatch here: every run walks the
//! same three stages in the same order, so the call chain is explicit and
//! traceable end to end rather than routed through a registry lookup.

use std::time::Instant;

use super::aggregator::AggregatorExecutor;
use super::dispatch::DispatchExecutor;
use super::observer::ObserverBus;
use super::router::RouterExecutor;
use super::types::{OrchestratorResult, RequestContext};

/// Per-run telemetry mirroring the span tags described in §4.5:
/// `{workflow.name, workflow.start.executor, success, error.message,
/// execution.time.ms, output.length}`.
#[derive(Debug, Clone)]
pub struct WorkflowSpan {
    pub workflow_name: String,
    pub start_executor: &'static str,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub output_length: usize,
}

pub struct WorkflowRuntime {
    router: RouterExecutor,
    dispatcher: DispatchExecutor,
    aggregator: AggregatorExecutor,
    name: String,
}

impl WorkflowRuntime {
    pub fn new(
        name: impl Into<String>,
        router: RouterExecutor,
        dispatcher: DispatchExecutor,
        aggregator: AggregatorExecutor,
    ) -> Self {
        Self {
            router,
            dispatcher,
            aggregator,
            name: name.into(),
        }
    }

    /// Runs Router -> Dispatch -> Aggregator to completion. This pipeline
    /// has no failure exit: the router, dispatcher, and aggregator already
    /// never throw (per §4.2-§4.4), so `run` always returns a usable
    /// `OrchestratorResult` alongside the span describing how it went.
    pub async fn run(
        &self,
        user_message: &str,
        context: &RequestContext,
        observers: &ObserverBus,
    ) -> (OrchestratorResult, WorkflowSpan) {
        let started = Instant::now();

        let choice = self.router.route(user_message).await;
        observers.routing_completed(&choice, None).await;

        let responses = self
            .dispatcher
            .dispatch(&choice, user_message, context, observers)
            .await;

        let result = self.aggregator.aggregate(responses, observers).await;

        let span = WorkflowSpan {
            workflow_name: self.name.clone(),
            start_executor: "router",
            success: true,
            error_message: None,
            execution_time_ms: started.elapsed().as_millis() as u64,
            output_length: result.text.len(),
        };

        (result, span)
    }
}
