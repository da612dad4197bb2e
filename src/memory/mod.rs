// Memory layer - session cache, durable store and similarity retrieval

//! # Memory Module
//!
//! Three cooperating stores:
//!
//! - **Session store**: short-lived per-incident state plus a bounded ring of
//!   workflow checkpoints, with TTL expiry. Two implementations — in-memory
//!   and NATS JetStream KV — selected at construction; callers cannot tell
//!   which is active.
//! - **Persistent store**: the authoritative incident record at rest
//!   (Postgres), with append-only history, analytics buckets, compliance
//!   events and performance metrics.
//! - **Memory retriever**: TF-IDF similarity search and pattern summaries
//!   over the persistent store's recent incidents.

pub mod persistent;
pub mod retriever;
pub mod session;

pub use persistent::{AnalyticsBucket, IncidentRecord, PersistentStore, SearchFilters, SearchOrder};
pub use retriever::{HistoricalContext, IncidentPattern, MemoryRetriever, SimilarIncident};
pub use session::{InMemorySessionStore, NatsSessionStore, SessionStore};
