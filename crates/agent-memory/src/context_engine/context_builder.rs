//! Builds prompt-ready context from current-session and cross-session memories

use crate::memory_db::MemoryEntry;
use std::fmt;
use tracing::debug;

/// Entries fetched from the current session.
pub const CURRENT_SESSION_LIMIT: usize = 5;
/// Entries fetched across all sessions when past context is requested.
pub const PAST_FETCH_LIMIT: usize = 5;
/// Past-session entries kept after filtering out the current session.
pub const PAST_KEEP_LIMIT: usize = 3;

pub const CURRENT_SECTION_HEADER: &str = "Current Conversation:";
pub const PAST_SECTION_HEADER: &str = "Relevant Past Context:";

/// The two views a context window is made from, both oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextWindow {
    pub current: Vec<MemoryEntry>,
    pub past: Vec<MemoryEntry>,
}

impl ContextWindow {
    /// Assemble a window from recency query results.
    ///
    /// `cross_session` is the agent-wide recency result in ascending order.
    /// Entries of `session_id` are dropped and the first [`PAST_KEEP_LIMIT`]
    /// of the remainder are kept. Truncation happens after the ascending
    /// reorder, so these are the oldest survivors of the fetched batch rather
    /// than the newest past entries.
    pub fn assemble(
        session_id: &str,
        current: Vec<MemoryEntry>,
        cross_session: Option<Vec<MemoryEntry>>,
    ) -> Self {
        let past: Vec<MemoryEntry> = cross_session
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| entry.session_id != session_id)
            .take(PAST_KEEP_LIMIT)
            .collect();

        debug!(
            "Assembled context window: {} current, {} past entries",
            current.len(),
            past.len()
        );
        Self { current, past }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.past.is_empty()
    }

    /// Render sections separated by a blank line. Empty sections are omitted.
    pub fn render(&self) -> String {
        [
            render_section(CURRENT_SECTION_HEADER, &self.current),
            render_section(PAST_SECTION_HEADER, &self.past),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

impl fmt::Display for ContextWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_section(header: &str, entries: &[MemoryEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut section = String::from(header);
    for entry in entries {
        section.push('\n');
        section.push_str(&format_line(entry));
    }
    Some(section)
}

/// `ROLE: content` with the role upper-cased.
pub fn format_line(entry: &MemoryEntry) -> String {
    format!("{}: {}", entry.role.as_str().to_uppercase(), entry.content)
}
