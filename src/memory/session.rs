// Session store - short-lived incident state and workflow checkpoints

//! # Session Store
//!
//! Keyed by incident id, the session store holds the most recent full
//! `IncidentState`, a bounded ring of checkpoints (the resume path reads the
//! newest) and, through the state itself, the pending-approval queue.
//!
//! Two implementations share one trait: `InMemorySessionStore` for
//! single-process deployments and tests, and `NatsSessionStore` backed by a
//! JetStream KV bucket whose `max_age` provides the TTL. Callers hold an
//! `Arc<dyn SessionStore>` and never branch on which one is active.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_nats::jetstream;
use tracing::debug;

use crate::models::{Checkpoint, IncidentState};
use crate::{Result, TriageError};

/// Checkpoints retained per incident; older entries are evicted from the ring
pub const CHECKPOINT_RING_SIZE: usize = 32;

/// Storage trait for per-incident session state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the latest full incident state.
    async fn put(&self, state: &IncidentState) -> Result<()>;

    /// Fetch the latest state for an incident, if present and unexpired.
    async fn get(&self, incident_id: &str) -> Result<Option<IncidentState>>;

    /// Append a checkpoint. Sequence numbers must be strictly monotonic:
    /// appending sequence N+2 after N is an invariant violation, fatal for
    /// the owning run.
    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// All retained checkpoints for an incident, oldest first.
    async fn checkpoints(&self, incident_id: &str) -> Result<Vec<Checkpoint>>;

    /// The newest retained checkpoint, used by resume logic.
    async fn latest_checkpoint(&self, incident_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints(incident_id).await?.into_iter().last())
    }

    /// Drop an incident's session data (terminal commit path).
    async fn remove(&self, incident_id: &str) -> Result<()>;

    /// Evict expired entries; returns how many were removed.
    async fn cleanup(&self) -> Result<usize>;
}

fn verify_sequence(previous: Option<u64>, next: u64, incident_id: &str) -> Result<()> {
    let expected = previous.map(|s| s + 1).unwrap_or(next);
    if next != expected && previous.is_some() {
        return Err(TriageError::UnsafeState(format!(
            "checkpoint sequence gap on {}: expected {}, got {}",
            incident_id, expected, next
        )));
    }
    Ok(())
}

struct StateEntry {
    state: IncidentState,
    expires_at: Instant,
}

struct CheckpointEntry {
    ring: VecDeque<Checkpoint>,
    expires_at: Instant,
}

/// In-memory session store for single-process deployments and tests.
///
/// Uses `std::sync::RwLock` rather than the async variant: every critical
/// section is a short map operation with no await points inside.
pub struct InMemorySessionStore {
    ttl: Duration,
    states: RwLock<HashMap<String, StateEntry>>,
    checkpoints: RwLock<HashMap<String, CheckpointEntry>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            states: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, state: &IncidentState) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.insert(
            state.incident_id.clone(),
            StateEntry {
                state: state.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, incident_id: &str) -> Result<Option<IncidentState>> {
        let states = self.states.read().unwrap();
        Ok(states
            .get(incident_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.state.clone()))
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().unwrap();
        let entry = checkpoints
            .entry(checkpoint.incident_id.clone())
            .or_insert_with(|| CheckpointEntry {
                ring: VecDeque::new(),
                expires_at: Instant::now() + self.ttl,
            });
        verify_sequence(
            entry.ring.back().map(|c| c.sequence),
            checkpoint.sequence,
            &checkpoint.incident_id,
        )?;
        entry.ring.push_back(checkpoint.clone());
        while entry.ring.len() > CHECKPOINT_RING_SIZE {
            entry.ring.pop_front();
        }
        entry.expires_at = Instant::now() + self.ttl;
        Ok(())
    }

    async fn checkpoints(&self, incident_id: &str) -> Result<Vec<Checkpoint>> {
        let checkpoints = self.checkpoints.read().unwrap();
        Ok(checkpoints
            .get(incident_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.ring.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, incident_id: &str) -> Result<()> {
        self.states.write().unwrap().remove(incident_id);
        self.checkpoints.write().unwrap().remove(incident_id);
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize> {
        let now = Instant::now();
        let mut removed = 0;
        {
            let mut states = self.states.write().unwrap();
            let before = states.len();
            states.retain(|_, entry| entry.expires_at > now);
            removed += before - states.len();
        }
        {
            let mut checkpoints = self.checkpoints.write().unwrap();
            let before = checkpoints.len();
            checkpoints.retain(|_, entry| entry.expires_at > now);
            removed += before - checkpoints.len();
        }
        Ok(removed)
    }
}

/// NATS JetStream KV session store for distributed deployments.
///
/// The bucket's `max_age` supplies the TTL, so `cleanup` is a no-op here;
/// expiry happens server-side and callers observe the same behavior as the
/// in-memory implementation.
pub struct NatsSessionStore {
    kv: jetstream::kv::Store,
}

impl NatsSessionStore {
    /// Bucket name used for incident sessions
    pub const BUCKET: &'static str = "incident-sessions";

    pub async fn connect(nats_url: &str, ttl: Duration) -> Result<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .with_context(|| format!("failed to connect to NATS at {}", nats_url))?;
        let js = jetstream::new(client);
        let kv = match js.get_key_value(Self::BUCKET).await {
            Ok(kv) => kv,
            Err(_) => js
                .create_key_value(jetstream::kv::Config {
                    bucket: Self::BUCKET.to_string(),
                    description: "incident session state and checkpoints".to_string(),
                    max_age: ttl,
                    ..Default::default()
                })
                .await
                .context("failed to create session KV bucket")?,
        };
        debug!(bucket = Self::BUCKET, "session store connected");
        Ok(Self { kv })
    }

    fn state_key(incident_id: &str) -> String {
        format!("state.{}", incident_id)
    }

    fn checkpoint_key(incident_id: &str) -> String {
        format!("ckpt.{}", incident_id)
    }

    async fn read_ring(&self, incident_id: &str) -> Result<VecDeque<Checkpoint>> {
        let entry = self
            .kv
            .get(Self::checkpoint_key(incident_id))
            .await
            .context("failed to read checkpoint ring")?;
        match entry {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(VecDeque::new()),
        }
    }
}

#[async_trait]
impl SessionStore for NatsSessionStore {
    async fn put(&self, state: &IncidentState) -> Result<()> {
        let bytes = serde_json::to_vec(state)?;
        self.kv
            .put(Self::state_key(&state.incident_id), bytes.into())
            .await
            .context("failed to write session state")?;
        Ok(())
    }

    async fn get(&self, incident_id: &str) -> Result<Option<IncidentState>> {
        let entry = self
            .kv
            .get(Self::state_key(incident_id))
            .await
            .context("failed to read session state")?;
        match entry {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut ring = self.read_ring(&checkpoint.incident_id).await?;
        verify_sequence(
            ring.back().map(|c| c.sequence),
            checkpoint.sequence,
            &checkpoint.incident_id,
        )?;
        ring.push_back(checkpoint.clone());
        while ring.len() > CHECKPOINT_RING_SIZE {
            ring.pop_front();
        }
        let bytes = serde_json::to_vec(&ring)?;
        self.kv
            .put(Self::checkpoint_key(&checkpoint.incident_id), bytes.into())
            .await
            .context("failed to write checkpoint ring")?;
        Ok(())
    }

    async fn checkpoints(&self, incident_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self.read_ring(incident_id).await?.into_iter().collect())
    }

    async fn remove(&self, incident_id: &str) -> Result<()> {
        self.kv
            .delete(Self::state_key(incident_id))
            .await
            .context("failed to delete session state")?;
        self.kv
            .delete(Self::checkpoint_key(incident_id))
            .await
            .context("failed to delete checkpoint ring")?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize> {
        // The bucket's max_age expires entries server-side.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentMetadata, WorkflowStep};

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(Duration::from_secs(60))
    }

    fn state() -> IncidentState {
        IncidentState::new("title", "description", IncidentMetadata::default())
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = store();
        let state = state();
        store.put(&state).await.unwrap();
        let loaded = store.get(&state.incident_id).await.unwrap().unwrap();
        assert_eq!(loaded.incident_id, state.incident_id);
        assert!(store.get("INC-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_ring_is_bounded() {
        let store = store();
        let state = state();
        for sequence in 1..=(CHECKPOINT_RING_SIZE as u64 + 8) {
            let cp = Checkpoint::capture(&state, WorkflowStep::ClassifyIncident, sequence).unwrap();
            store.append_checkpoint(&cp).await.unwrap();
        }
        let retained = store.checkpoints(&state.incident_id).await.unwrap();
        assert_eq!(retained.len(), CHECKPOINT_RING_SIZE);
        // The newest survive eviction
        assert_eq!(retained.last().unwrap().sequence, CHECKPOINT_RING_SIZE as u64 + 8);
        let latest = store.latest_checkpoint(&state.incident_id).await.unwrap().unwrap();
        assert_eq!(latest.sequence, CHECKPOINT_RING_SIZE as u64 + 8);
    }

    #[tokio::test]
    async fn sequence_gaps_are_rejected() {
        let store = store();
        let state = state();
        let first = Checkpoint::capture(&state, WorkflowStep::ValidateInput, 1).unwrap();
        store.append_checkpoint(&first).await.unwrap();
        let skipped = Checkpoint::capture(&state, WorkflowStep::AssessRisk, 3).unwrap();
        let err = store.append_checkpoint(&skipped).await.unwrap_err();
        assert!(matches!(err, TriageError::UnsafeState(_)));
    }

    #[tokio::test]
    async fn ttl_expiry_hides_state_and_cleanup_evicts() {
        let store = InMemorySessionStore::new(Duration::from_millis(10));
        let state = state();
        store.put(&state).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(store.get(&state.incident_id).await.unwrap().is_none());
        assert_eq!(store.cleanup().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_drops_state_and_checkpoints() {
        let store = store();
        let state = state();
        store.put(&state).await.unwrap();
        let cp = Checkpoint::capture(&state, WorkflowStep::ValidateInput, 1).unwrap();
        store.append_checkpoint(&cp).await.unwrap();
        store.remove(&state.incident_id).await.unwrap();
        assert!(store.get(&state.incident_id).await.unwrap().is_none());
        assert!(store.checkpoints(&state.incident_id).await.unwrap().is_empty());
    }
}
