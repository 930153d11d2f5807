use crate::error::{MemoryError, Result};
use crate::memory::MemoryStore;
use crate::memory_db::migration::MigrationManager;
use crate::memory_db::schema::*;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits on a locked database before reporting contention.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SELECT_COLUMNS: &str =
    "id, timestamp, role, content, agent_id, session_id, embedding, metadata, importance_score";

/// SQLite-backed memory store.
///
/// Holds no connection between calls: every operation opens its own
/// connection and drops it on return, so each committed write is visible to
/// the next call and to other processes sharing the file.
#[derive(Debug, Clone)]
pub struct SqliteMemoryStore {
    db_path: PathBuf,
}

impl SqliteMemoryStore {
    /// Point at a database file without touching it. Call
    /// [`initialize`](MemoryStore::initialize) before use.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    /// Point at a database file and create its schema.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(db_path);
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn get_conn(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn row_to_entry(row: &Row<'_>) -> Result<MemoryEntry> {
        let timestamp_str: String = row.get(1)?;
        let timestamp = parse_timestamp(&timestamp_str).map_err(|e| conversion_error(1, e))?;

        let embedding = row
            .get::<_, Option<String>>(6)?
            .map(|raw| decode_embedding(&raw).map_err(|e| corrupt_column(6, e)))
            .transpose()?;
        let metadata = row
            .get::<_, Option<String>>(7)?
            .map(|raw| decode_metadata(&raw).map_err(|e| corrupt_column(7, e)))
            .transpose()?;

        Ok(MemoryEntry {
            id: row.get(0)?,
            timestamp,
            role: row.get(2)?,
            content: row.get(3)?,
            agent_id: row.get(4)?,
            session_id: row.get(5)?,
            embedding,
            metadata,
            importance_score: row.get::<_, f64>(8)? as f32,
        })
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MemoryError::schema(&self.db_path, e))?;
            }
        }

        let mut conn = self
            .get_conn()
            .map_err(|e| MemoryError::schema(&self.db_path, e))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| MemoryError::schema(&self.db_path, e))?;
        MigrationManager::new(&mut conn)
            .initialize_database()
            .map_err(|e| MemoryError::schema(&self.db_path, e))?;

        info!("Memory system initialized at {}", self.db_path.display());
        Ok(())
    }

    fn insert_or_replace(&self, entry: &MemoryEntry) -> Result<String> {
        // Encode first: a turn is never written without its metadata.
        let metadata_json = entry.metadata.as_ref().map(encode_metadata).transpose()?;
        let embedding_json = entry
            .embedding
            .as_deref()
            .map(encode_embedding)
            .transpose()?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO memories
             (id, timestamp, role, content, agent_id, session_id, embedding, metadata, importance_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &entry.id,
                format_timestamp(&entry.timestamp),
                entry.role,
                &entry.content,
                &entry.agent_id,
                &entry.session_id,
                embedding_json,
                metadata_json,
                entry.importance_score as f64,
            ],
        )?;

        debug!("Stored memory {} for agent {}", entry.id, entry.agent_id);
        Ok(entry.id.clone())
    }

    fn query(
        &self,
        agent_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.get_conn()?;

        let mut entries = Vec::new();
        match session_id {
            Some(session_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM memories
                     WHERE agent_id = ?1 AND session_id = ?2
                     ORDER BY timestamp DESC, rowid DESC
                     LIMIT ?3"
                ))?;
                let mut rows = stmt.query(params![agent_id, session_id, limit])?;
                while let Some(row) = rows.next()? {
                    entries.push(Self::row_to_entry(row)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM memories
                     WHERE agent_id = ?1
                     ORDER BY timestamp DESC, rowid DESC
                     LIMIT ?2"
                ))?;
                let mut rows = stmt.query(params![agent_id, limit])?;
                while let Some(row) = rows.next()? {
                    entries.push(Self::row_to_entry(row)?);
                }
            }
        }

        debug!(
            "Fetched {} memories for agent {} (session: {:?})",
            entries.len(),
            agent_id,
            session_id
        );
        Ok(entries)
    }

    fn aggregate(&self, agent_id: &str) -> Result<MemoryStats> {
        let conn = self.get_conn()?;
        let (total, sessions, first, last): (i64, i64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT session_id), MIN(timestamp), MAX(timestamp)
                 FROM memories
                 WHERE agent_id = ?1",
                [agent_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let first_memory = first
            .map(|raw| parse_timestamp(&raw).map_err(|e| conversion_error(2, e)))
            .transpose()?;
        let last_memory = last
            .map(|raw| parse_timestamp(&raw).map_err(|e| conversion_error(3, e)))
            .transpose()?;

        Ok(MemoryStats {
            total_memories: total as u64,
            total_sessions: sessions as u64,
            first_memory,
            last_memory,
        })
    }
}

fn conversion_error(column: usize, e: chrono::ParseError) -> MemoryError {
    MemoryError::Storage(rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(e),
    ))
}

/// A stored column that no longer decodes is a read failure, not a caller encoding error.
fn corrupt_column(column: usize, e: MemoryError) -> MemoryError {
    MemoryError::Storage(rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(e),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteMemoryStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteMemoryStore::open(dir.path().join("memory.db")).unwrap();
        (dir, store)
    }

    fn entry(id: &str, second: u32) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap(),
            role: Role::Assistant,
            content: format!("content {id}"),
            agent_id: "agent".to_string(),
            session_id: "s1".to_string(),
            embedding: None,
            metadata: None,
            importance_score: DEFAULT_IMPORTANCE_SCORE,
        }
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("memory.db");
        SqliteMemoryStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_fails_with_schema_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = SqliteMemoryStore::open(blocker.join("memory.db")).unwrap_err();
        assert!(matches!(err, MemoryError::Schema { .. }));
    }

    #[test]
    fn test_reserved_fields_round_trip() {
        let (_dir, store) = store();
        let mut e = entry("abc", 1);
        e.embedding = Some(vec![0.5, -0.25]);
        e.metadata = Some(json!({"mood": "curious"}));
        e.importance_score = 0.9;
        store.insert_or_replace(&e).unwrap();

        let back = store.query("agent", Some("s1"), 1).unwrap().remove(0);
        assert_eq!(back, e);
    }

    #[test]
    fn test_insert_or_replace_overwrites_whole_row() {
        let (_dir, store) = store();
        let mut first = entry("same", 1);
        first.metadata = Some(json!({"k": 1}));
        store.insert_or_replace(&first).unwrap();

        let second = entry("same", 2);
        store.insert_or_replace(&second).unwrap();

        let rows = store.query("agent", None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata, None);
        assert_eq!(rows[0].timestamp, second.timestamp);
    }

    #[test]
    fn test_serialization_failure_writes_nothing() {
        let (_dir, store) = store();
        let mut e = entry("bad", 1);
        e.metadata = Some(json!("scalar"));

        assert!(matches!(
            store.insert_or_replace(&e),
            Err(MemoryError::Serialization(_))
        ));
        assert_eq!(store.aggregate("agent").unwrap().total_memories, 0);
    }

    #[test]
    fn test_unknown_stored_role_is_storage_error() {
        let (_dir, store) = store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             INSERT INTO memories (id, timestamp, role, content, agent_id, session_id)
             VALUES ('ffffffffffffffff', '2025-01-01T00:00:00.000000Z', 'system', 'x', 'agent', 's1');",
        )
        .unwrap();

        let err = store.query("agent", None, 10).unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
    }

    #[test]
    fn test_corrupt_stored_metadata_is_storage_error() {
        let (_dir, store) = store();
        let conn = Connection::open(store.path()).unwrap();
        for (id, metadata) in [
            ("aaaaaaaaaaaaaaaa", "not json"),
            ("bbbbbbbbbbbbbbbb", r#"{"version":9,"data":{}}"#),
        ] {
            conn.execute("DELETE FROM memories", []).unwrap();
            conn.execute(
                "INSERT INTO memories (id, timestamp, role, content, agent_id, session_id, metadata)
                 VALUES (?1, '2025-01-01T00:00:00.000000Z', 'user', 'x', 'agent', 's1', ?2)",
                params![id, metadata],
            )
            .unwrap();

            let err = store.query("agent", Some("s1"), 10).unwrap_err();
            assert!(matches!(err, MemoryError::Storage(_)), "{metadata}: {err:?}");
        }
    }

    #[test]
    fn test_corrupt_stored_embedding_is_storage_error() {
        let (_dir, store) = store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO memories (id, timestamp, role, content, agent_id, session_id, embedding)
             VALUES ('cccccccccccccccc', '2025-01-01T00:00:00.000000Z', 'user', 'x', 'agent', 's1', '[oops')",
            [],
        )
        .unwrap();

        assert!(matches!(store.query("agent", None, 10), Err(MemoryError::Storage(_))));
    }
}
