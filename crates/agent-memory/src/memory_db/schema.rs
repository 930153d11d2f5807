//! Database schema definitions for the memory system
use crate::error::{MemoryError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Default importance assigned to new entries.
pub const DEFAULT_IMPORTANCE_SCORE: f32 = 0.5;

/// Current version of the stored metadata envelope.
pub const METADATA_VERSION: u32 = 1;

/// Speaker of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}', expected 'user' or 'assistant'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// One persisted conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    pub agent_id: String,
    pub session_id: String,
    /// Reserved; persisted but not read by any retrieval path.
    pub embedding: Option<Vec<f32>>,
    /// Caller-supplied mapping, opaque to the store.
    pub metadata: Option<Value>,
    /// Reserved; persisted but not read by any retrieval path.
    pub importance_score: f32,
}

/// Per-agent summary counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memories: u64,
    pub total_sessions: u64,
    pub first_memory: Option<DateTime<Utc>>,
    pub last_memory: Option<DateTime<Utc>>,
}

/// Schema applied by migration 1.
pub const SCHEMA_SQL: &str = include_str!("migrations/001_initial.sql");

/// Render a timestamp the way it is stored: RFC 3339, UTC, microsecond precision.
///
/// The fixed width keeps lexicographic order equal to chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[derive(Serialize, Deserialize)]
struct StoredMetadata {
    version: u32,
    data: Map<String, Value>,
}

/// Encode caller metadata into its versioned storage envelope.
///
/// Only JSON objects are accepted.
pub fn encode_metadata(metadata: &Value) -> Result<String> {
    let data = match metadata {
        Value::Object(map) => map.clone(),
        other => {
            return Err(MemoryError::Serialization(format!(
                "metadata must be a JSON object, got {}",
                json_kind(other)
            )))
        }
    };
    Ok(serde_json::to_string(&StoredMetadata {
        version: METADATA_VERSION,
        data,
    })?)
}

pub fn decode_metadata(raw: &str) -> Result<Value> {
    let stored: StoredMetadata = serde_json::from_str(raw)?;
    if stored.version != METADATA_VERSION {
        return Err(MemoryError::Serialization(format!(
            "unsupported metadata version {}",
            stored.version
        )));
    }
    Ok(Value::Object(stored.data))
}

/// Embeddings are stored as a JSON array; non-finite components would not survive that.
pub fn encode_embedding(embedding: &[f32]) -> Result<String> {
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(MemoryError::Serialization(format!(
            "embedding component {} is not finite",
            pos
        )));
    }
    Ok(serde_json::to_string(embedding)?)
}

pub fn decode_embedding(raw: &str) -> Result<Vec<f32>> {
    Ok(serde_json::from_str(raw)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = early + chrono::Duration::microseconds(1);
        let (a, b) = (format_timestamp(&early), format_timestamp(&later));

        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), later);
    }

    #[test]
    fn test_metadata_envelope() {
        let meta = json!({"source": "chat", "priority": 1});
        let encoded = encode_metadata(&meta).unwrap();

        let raw: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["data"]["source"], "chat");
        assert_eq!(decode_metadata(&encoded).unwrap(), meta);
    }

    #[test]
    fn test_metadata_rejects_non_objects() {
        for bad in [json!([1, 2]), json!("text"), json!(3), json!(null)] {
            match encode_metadata(&bad) {
                Err(MemoryError::Serialization(msg)) => assert!(msg.contains("JSON object")),
                other => panic!("expected serialization error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_metadata_unknown_version() {
        let err = decode_metadata(r#"{"version":7,"data":{}}"#).unwrap_err();
        assert!(matches!(err, MemoryError::Serialization(_)));
    }

    #[test]
    fn test_embedding_rejects_nan() {
        assert!(encode_embedding(&[0.1, f32::NAN]).is_err());
        let encoded = encode_embedding(&[0.25, -1.0]).unwrap();
        assert_eq!(decode_embedding(&encoded).unwrap(), vec![0.25, -1.0]);
    }
}
