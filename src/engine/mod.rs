// Triage engine - gates, decisions, execution, workflow and dispatch

//! # Engine Module
//!
//! The execution layer of the triage core:
//!
//! - `gates`: pure routing functions over recorded tool results
//! - `decision`: multi-criteria autonomy scoring and plan selection
//! - `executor`: dependency-ordered action execution with rate limits,
//!   retries and rollback
//! - `workflow`: the node graph, checkpointing and suspension handling
//! - `dispatcher`: worker pool, bounded submission queue and the
//!   transport-agnostic submission API

pub mod decision;
pub mod dispatcher;
pub mod executor;
pub mod gates;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use decision::DecisionEngine;
pub use dispatcher::{RunHandle, TriageEngine};
pub use executor::{ActionExecutor, ActionResult, ExecutionReport, ExecutorConfig};
pub use gates::{ApprovalRoute, ComplianceRoute, SafetyRoute};
pub use workflow::{NodeOutcome, RunResult, WorkflowRunner};
