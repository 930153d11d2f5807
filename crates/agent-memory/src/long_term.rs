//! Long-term memory facade: the public operations agents call

use crate::config::MemoryConfig;
use crate::context_engine::{ContextWindow, CURRENT_SESSION_LIMIT, PAST_FETCH_LIMIT};
use crate::diagnostics::{DiagnosticsSink, Severity, TracingDiagnostics};
use crate::error::{MemoryError, Result};
use crate::memory::MemoryStore;
use crate::memory_db::{
    generate_id, MemoryEntry, MemoryStats, Role, SqliteMemoryStore, DEFAULT_IMPORTANCE_SCORE,
};
use chrono::{SubsecRound, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "LongTermMemory";

/// One turn to persist. Built by the caller; id and timestamp are assigned on write.
pub struct MemoryParams<'a> {
    pub role: Role,
    pub content: &'a str,
    pub agent_id: &'a str,
    pub session_id: &'a str,
    pub metadata: Option<Value>,
    pub importance_score: f32,
}

impl<'a> MemoryParams<'a> {
    pub fn new(role: Role, content: &'a str, agent_id: &'a str, session_id: &'a str) -> Self {
        Self {
            role,
            content,
            agent_id,
            session_id,
            metadata: None,
            importance_score: DEFAULT_IMPORTANCE_SCORE,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_importance_score(mut self, score: f32) -> Self {
        self.importance_score = score;
        self
    }
}

/// Persistent conversational memory for agents.
///
/// Construct one per process and configuration and pass it by reference.
pub struct LongTermMemory<S: MemoryStore = SqliteMemoryStore> {
    store: S,
    max_context_entries: usize,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl LongTermMemory<SqliteMemoryStore> {
    /// Open (creating if needed) the SQLite store named by `config`.
    ///
    /// A [`MemoryError::Schema`] here is fatal; do not continue without a store.
    pub fn open(config: &MemoryConfig) -> Result<Self> {
        Self::with_store(SqliteMemoryStore::new(&config.storage_location), config)
    }
}

impl<S: MemoryStore> LongTermMemory<S> {
    /// Wrap an arbitrary store and initialize it.
    pub fn with_store(store: S, config: &MemoryConfig) -> Result<Self> {
        let diagnostics: Arc<dyn DiagnosticsSink> = Arc::new(TracingDiagnostics::new());
        if let Err(e) = store.initialize() {
            report(
                diagnostics.as_ref(),
                Severity::Critical,
                "Failed to initialize memory store",
                None,
                &e,
            );
            return Err(e);
        }
        Ok(Self {
            store,
            max_context_entries: config.max_context_entries,
            diagnostics,
        })
    }

    /// Replace the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_context_entries(&self) -> usize {
        self.max_context_entries
    }

    /// Persist one turn and return its id.
    pub fn add_memory(&self, params: MemoryParams<'_>) -> Result<String> {
        let now = Utc::now().trunc_subsecs(6);
        let entry = MemoryEntry {
            id: generate_id(params.content, params.session_id, &now),
            timestamp: now,
            role: params.role,
            content: params.content.to_string(),
            agent_id: params.agent_id.to_string(),
            session_id: params.session_id.to_string(),
            embedding: None,
            metadata: params.metadata,
            importance_score: params.importance_score,
        };

        match self.store.insert_or_replace(&entry) {
            Ok(id) => {
                info!("Added memory for {}", entry.agent_id);
                Ok(id)
            }
            Err(e) => {
                self.report(
                    "Failed to add memory",
                    json!({"agent_id": entry.agent_id, "session_id": entry.session_id}),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// The `limit` most recent entries, oldest first.
    ///
    /// `limit` defaults to the configured maximum context size.
    pub fn get_recent_memories(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEntry>> {
        let limit = limit.unwrap_or(self.max_context_entries);
        if limit == 0 {
            return Ok(Vec::new());
        }

        match self.store.query(agent_id, session_id, limit) {
            Ok(mut entries) => {
                entries.reverse();
                Ok(entries)
            }
            Err(e) => {
                self.report(
                    "Failed to fetch recent memories",
                    json!({"agent_id": agent_id, "session_id": session_id, "limit": limit}),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// Gather the current-session and cross-session views for a prompt.
    pub fn context_window(
        &self,
        agent_id: &str,
        session_id: &str,
        include_past_sessions: bool,
    ) -> Result<ContextWindow> {
        let current =
            self.get_recent_memories(agent_id, Some(session_id), Some(CURRENT_SESSION_LIMIT))?;
        let cross_session = if include_past_sessions {
            Some(self.get_recent_memories(agent_id, None, Some(PAST_FETCH_LIMIT))?)
        } else {
            None
        };
        Ok(ContextWindow::assemble(session_id, current, cross_session))
    }

    /// Render the context window as prompt text.
    pub fn build_context_window(
        &self,
        agent_id: &str,
        session_id: &str,
        include_past_sessions: bool,
    ) -> Result<String> {
        Ok(self
            .context_window(agent_id, session_id, include_past_sessions)?
            .render())
    }

    pub fn get_statistics(&self, agent_id: &str) -> Result<MemoryStats> {
        self.store.aggregate(agent_id).map_err(|e| {
            self.report(
                "Failed to compute memory statistics",
                json!({"agent_id": agent_id}),
                &e,
            );
            e
        })
    }

    fn report(&self, message: &str, context: Value, error: &MemoryError) {
        report(
            self.diagnostics.as_ref(),
            Severity::Error,
            message,
            Some(&context),
            error,
        );
    }
}

fn report(
    sink: &dyn DiagnosticsSink,
    severity: Severity,
    message: &str,
    context: Option<&Value>,
    error: &MemoryError,
) {
    if let Err(sink_err) = sink.log(severity, COMPONENT, message, context, Some(error)) {
        warn!("Diagnostics sink failed while reporting '{}': {}", message, sink_err);
    }
}
