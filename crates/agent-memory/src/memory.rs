// agent-memory/crates/agent-memory/src/memory.rs

use crate::error::Result;
use crate::memory_db::schema::{encode_embedding, encode_metadata, MemoryEntry, MemoryStats};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Durable storage primitives behind the long-term memory facade.
///
/// Implementations must order `query` results newest first, break timestamp
/// ties by insertion order (latest write first), and give `insert_or_replace`
/// full-row replacement semantics on id collision.
pub trait MemoryStore: Send + Sync {
    /// Create whatever backing structures the store needs. Safe to repeat.
    fn initialize(&self) -> Result<()>;

    /// Persist one entry, replacing any row with the same id. Returns the id.
    fn insert_or_replace(&self, entry: &MemoryEntry) -> Result<String>;

    /// At most `limit` entries for the agent (and session, if given), newest first.
    fn query(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>>;

    /// Counts and timestamp bounds for one agent; zeroed when it has no entries.
    fn aggregate(&self, agent_id: &str) -> Result<MemoryStats>;
}

/// Process-local store backed by a `DashMap`.
///
/// Nothing survives the process. Useful for tests and tooling that want the
/// store's ordering and replacement semantics without a file.
#[derive(Clone, Default)]
pub struct InMemoryMemoryStore {
    store: Arc<DashMap<String, (u64, MemoryEntry)>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl MemoryStore for InMemoryMemoryStore {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn insert_or_replace(&self, entry: &MemoryEntry) -> Result<String> {
        // Same encoding checks as the durable store so failures match.
        if let Some(metadata) = &entry.metadata {
            encode_metadata(metadata)?;
        }
        if let Some(embedding) = &entry.embedding {
            encode_embedding(embedding)?;
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.store.insert(entry.id.clone(), (seq, entry.clone()));
        Ok(entry.id.clone())
    }

    fn query(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let mut matches: Vec<(u64, MemoryEntry)> = self
            .store
            .iter()
            .filter(|item| {
                let entry = &item.value().1;
                entry.agent_id == agent_id
                    && session_id.map_or(true, |s| entry.session_id == s)
            })
            .map(|item| item.value().clone())
            .collect();

        matches.sort_by(|(seq_a, a), (seq_b, b)| {
            b.timestamp.cmp(&a.timestamp).then(seq_b.cmp(seq_a))
        });
        Ok(matches.into_iter().take(limit).map(|(_, entry)| entry).collect())
    }

    fn aggregate(&self, agent_id: &str) -> Result<MemoryStats> {
        let mut stats = MemoryStats::default();
        let mut sessions = HashSet::new();

        for item in self.store.iter() {
            let entry = &item.value().1;
            if entry.agent_id != agent_id {
                continue;
            }
            stats.total_memories += 1;
            sessions.insert(entry.session_id.clone());
            stats.first_memory = Some(match stats.first_memory {
                Some(first) => first.min(entry.timestamp),
                None => entry.timestamp,
            });
            stats.last_memory = Some(match stats.last_memory {
                Some(last) => last.max(entry.timestamp),
                None => entry.timestamp,
            });
        }
        stats.total_sessions = sessions.len() as u64;
        Ok(stats)
    }
}
