//! The extraction boundary. Everything about locating and reading the
//! target surface lives behind `ThreadSource`; the orchestrator never knows
//! which extraction strategy produced a batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque reference to one conversation/thread on the target surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadHandle {
    pub counterparty_id: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_ref: String,
}

/// A raw message observation, before classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("target surface unreachable: {0}")]
    Unreachable(String),
    #[error("target surface structure not recognized: {0}")]
    Unrecognized(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Page content extractor. Implementations may return partial or malformed
/// data; the orchestrator treats every call as fallible and retries per its
/// own policy.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// The thread handles currently observable on the surface.
    async fn list_handles(&self) -> Result<Vec<ThreadHandle>, SourceError>;

    /// Open a thread and wait until the loaded conversation header matches
    /// `expected_name` (see [`names_match`]). Returns false when the match
    /// did not arrive within `timeout`.
    async fn open_and_wait_for_load(
        &self,
        handle: &ThreadHandle,
        expected_name: &str,
        timeout: Duration,
    ) -> Result<bool, SourceError>;

    /// Messages currently readable for the handle. In leads mode this is
    /// called without opening the thread and yields whatever summary the
    /// surface exposes.
    async fn read_messages(&self, handle: &ThreadHandle)
        -> Result<Vec<ExtractedMessage>, SourceError>;

    /// Scroll or activate a "load more" affordance. True when more content
    /// became available.
    async fn advance_or_load_more(&self) -> Result<bool, SourceError>;
}

/// Fuzzy load confirmation: case-insensitive, whitespace-normalized, and
/// either side containing the other counts. Surfaces decorate names with
/// titles and status suffixes, so exact equality is too strict.
pub fn names_match(expected: &str, observed: &str) -> bool {
    let a = normalize_name(expected);
    let b = normalize_name(observed);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn normalize_name(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_exact_and_case() {
        assert!(names_match("Alice Chen", "alice chen"));
        assert!(names_match("ALICE CHEN", "Alice Chen"));
    }

    #[test]
    fn names_match_either_containment() {
        assert!(names_match("Alice Chen", "Alice Chen · Head of Sales"));
        assert!(names_match("Alice Chen · Head of Sales", "Alice Chen"));
    }

    #[test]
    fn names_match_collapses_whitespace() {
        assert!(names_match("Alice\n  Chen", "alice chen"));
    }

    #[test]
    fn names_match_rejects_different_and_empty() {
        assert!(!names_match("Alice Chen", "Bob Marsh"));
        assert!(!names_match("", "Alice Chen"));
        assert!(!names_match("Alice Chen", "   "));
    }
}
