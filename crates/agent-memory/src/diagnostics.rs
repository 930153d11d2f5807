//! Structured diagnostics sink used to report operational failures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Records retained by [`TracingDiagnostics`] for export.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Receiver for diagnostics. Called synchronously; callers never let a sink
/// failure replace the error being reported.
pub trait DiagnosticsSink: Send + Sync {
    fn log(
        &self,
        severity: Severity,
        component: &str,
        message: &str,
        context: Option<&Value>,
        error: Option<&(dyn std::error::Error + 'static)>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Variant or type name of the error, e.g. `Storage`.
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let debug = format!("{:?}", err);
        let kind: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        Self {
            kind: if kind.is_empty() { "Error".to_string() } else { kind },
            message: err.to_string(),
        }
    }
}

/// Sink that forwards to `tracing` and keeps the last [`HISTORY_LIMIT`] records.
#[derive(Debug)]
pub struct TracingDiagnostics {
    history: Mutex<VecDeque<DiagnosticRecord>>,
    started: Instant,
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            started: Instant::now(),
        }
    }
}

impl TracingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn history(&self) -> Vec<DiagnosticRecord> {
        match self.history.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Export retained records as pretty JSON.
    pub fn export_json(&self) -> anyhow::Result<String> {
        let export = serde_json::json!({
            "export_time": Utc::now().to_rfc3339(),
            "uptime_seconds": self.uptime_seconds(),
            "error_history": self.history(),
        });
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn log(
        &self,
        severity: Severity,
        component: &str,
        message: &str,
        context: Option<&Value>,
        error: Option<&(dyn std::error::Error + 'static)>,
    ) -> anyhow::Result<()> {
        let mut line = message.to_string();
        if let Some(ctx) = context {
            line.push_str(&format!(" | Context: {}", ctx));
        }
        if let Some(err) = error {
            line.push_str(&format!(" | Exception: {}", err));
        }

        match severity {
            Severity::Debug => debug!(component, "{}", line),
            Severity::Info => info!(component, "{}", line),
            Severity::Warning => warn!(component, "{}", line),
            Severity::Error => error!(component, "{}", line),
            Severity::Critical => error!(component, critical = true, "{}", line),
        }

        let record = DiagnosticRecord {
            timestamp: Utc::now(),
            severity,
            component: component.to_string(),
            message: message.to_string(),
            context: context.cloned(),
            exception: error.map(ExceptionInfo::from_error),
        };

        let mut history = self
            .history
            .lock()
            .map_err(|_| anyhow::anyhow!("diagnostics history lock poisoned"))?;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(record);
        Ok(())
    }
}
