// Security Triage - Rust Edition
// A checkpointed incident-triage and autonomous-response engine for hospitality properties

//! # Security Triage Library
//!
//! This is the main library crate for the security triage core: a stateful,
//! checkpointed workflow engine that drives hotel security incidents through a
//! multi-stage pipeline (classify, assess risk, prioritize, safety gate,
//! compliance gate, playbook selection, response planning, autonomous action
//! execution, notification, evaluation).
//!
//! ## Core Components
//!
//! - [`IncidentState`]: the single mutable state value threaded through the workflow
//! - [`TriageEngine`]: submission API, worker pool and dispatch loop
//! - [`WorkflowRunner`]: the node graph, conditional routing and checkpointing
//! - [`ActionExecutor`]: dependency-ordered execution of response actions across
//!   the property-management, access-control and notification systems
//! - [`DecisionEngine`]: multi-criteria autonomy scoring and optimal-plan selection
//! - Memory layer: session store (in-memory or NATS KV), durable incident store
//!   (Postgres) and a TF-IDF similarity retriever over historical incidents
//!
//! Gates are pure functions over recorded tool results, so a workflow resumed
//! from a checkpoint routes identically to its first execution.

// Core domain models (incidents, playbooks, actions, plans, gate results)
pub mod models;

// Tool adapters: LLM-backed analyzers with deterministic fallbacks
pub mod tools;

// External hotel system clients (PMS, access control, notifications)
pub mod integrations;

// Memory layer: session store, persistent store, similarity retriever
pub mod memory;

// Engine implementations: gates, decision engine, executor, workflow, dispatcher
pub mod engine;

// Per-run quality evaluation and ROI accounting
pub mod evaluation;

// Environment-driven configuration
pub mod config;

// Re-export core domain types for easy access
pub use models::{
    Action,
    ActionType,
    Checkpoint,
    ComplianceFramework,
    ComplianceReport,
    DecisionPlan,
    FailurePolicy,
    IncidentCategory,
    IncidentMetadata,
    IncidentPriority,
    IncidentState,
    IncidentStatus,
    Playbook,
    ResponsePlan,
    RiskAssessment,
    SafetyCheck,
    WorkflowStep,
};

// Re-export engine types for convenience
pub use engine::{
    decision::DecisionEngine,
    dispatcher::{RunHandle, TriageEngine},
    executor::{ActionExecutor, ExecutionReport},
    workflow::WorkflowRunner,
};

pub use config::TriageConfig;
pub use evaluation::{Evaluator, QualityReport};
pub use memory::{InMemorySessionStore, PersistentStore, SessionStore};

// Core error types
use thiserror::Error;

/// Custom error types for triage-core operations
///
/// The variants follow the error taxonomy of the workflow contract: validation
/// failures are reported to the caller and never retried, transient I/O is
/// retried with backoff, permanent I/O is recorded and surfaced to the owning
/// node, and gate vetoes re-route the workflow instead of aborting it.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Bad input from the caller; reported immediately, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network-level or 5xx failure from an external system; retried with backoff
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Auth or 4xx failure from an external system; recorded, not retried
    #[error("Permanent I/O error: {0}")]
    PermanentIo(String),

    /// A node or action exceeded its deadline and honored the cancellation signal
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Model output could not be parsed; the tool-specific fallback path applies
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A safety or compliance gate declined the workflow
    #[error("Gate veto: {0}")]
    GateVeto(String),

    /// A state invariant was violated; fatal for the run, no recovery attempted
    #[error("Unsafe state: {0}")]
    UnsafeState(String),

    /// The submission queue is at its configured bound
    #[error("Queue full: {0}")]
    QueueFull(String),

    /// Rate limiting error
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// An incident, checkpoint or approval could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A resolve call arrived for an incident with no matching pending approval
    #[error("Not pending: {0}")]
    NotPending(String),

    /// Storage-related errors
    /// Using anyhow::Error for flexible error handling with NATS, Postgres and
    /// other storage backends
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for TriageError {
    fn from(err: std::io::Error) -> Self {
        TriageError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for TriageError {
    fn from(err: sqlx::Error) -> Self {
        TriageError::Storage(anyhow::anyhow!(err))
    }
}

impl TriageError {
    /// Whether a retry with backoff is worthwhile for this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, TriageError::TransientIo(_) | TriageError::RateLimited(_))
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, TriageError>;
