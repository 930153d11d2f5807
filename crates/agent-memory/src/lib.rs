// agent-memory/crates/agent-memory/src/lib.rs

pub mod config;
pub mod context_engine;
pub mod diagnostics;
pub mod error;
pub mod long_term;
pub mod memory;
pub mod memory_db;
pub mod telemetry;

// Public API exports
pub use config::MemoryConfig;
pub use context_engine::ContextWindow;
pub use diagnostics::{DiagnosticsSink, ExceptionInfo, Severity, TracingDiagnostics};
pub use error::{MemoryError, Result};
pub use long_term::{LongTermMemory, MemoryParams};
pub use memory::{InMemoryMemoryStore, MemoryStore};
pub use memory_db::{generate_id, MemoryEntry, MemoryStats, Role, SqliteMemoryStore};
