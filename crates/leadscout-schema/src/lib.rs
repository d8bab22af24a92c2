use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classified intent of a single message.
///
/// `Unset` means the message was never sent to a classifier (own messages,
/// or records written before classification was configured).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Positive,
    Negative,
    Neutral,
    Unset,
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Unset
    }
}

/// One observed message inside a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
    /// RFC 3339 timestamp as observed on the surface; absent or unparsable
    /// values are preserved verbatim and handled by the merge sort.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub intent: Intent,
}

impl Message {
    /// Dedup identity: two observations with equal tuples are the same
    /// message no matter how many times extraction re-sees them.
    pub fn identity(&self) -> (&str, &str, Option<&str>) {
        (&self.sender, &self.text, self.timestamp.as_deref())
    }

    /// Timestamp parsed to an instant, if present and valid RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Canonical persisted record of one two-party conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Stable dedup key; never changes once assigned.
    pub counterparty_id: String,
    pub profile_ref: String,
    /// Sorted by timestamp where comparable; see the merge engine for the
    /// exact ordering contract.
    pub messages: Vec<Message>,
    /// Derived: true iff any counterparty message has positive intent.
    /// Always recomputed on merge, never carried forward.
    pub has_positive_intent: bool,
}

/// Read-side projection: the best positive-intent summary per counterparty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lead {
    pub counterparty_id: String,
    pub profile_ref: String,
    pub last_positive_message: String,
    #[serde(default)]
    pub last_positive_timestamp: Option<String>,
    pub positive_message_count: u32,
}

/// What a scraping pass harvests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// Classify only the visible last message of each thread.
    Leads,
    /// Open every thread and harvest the full message history.
    Conversations,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Scraping,
    Stopped,
    Completed,
}

/// Process-wide scrape lifecycle state, persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeSession {
    pub status: SessionStatus,
    #[serde(default)]
    pub mode: Option<ScrapeMode>,
    /// Counterparty ids already fully processed; skipped on resume unless a
    /// re-scan start cleared the set.
    #[serde(default)]
    pub resume_cursor: HashSet<String>,
    #[serde(default)]
    pub handles_processed: u32,
    #[serde(default)]
    pub positive_count: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ScrapeSession {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            mode: None,
            resume_cursor: HashSet::new(),
            handles_processed: 0,
            positive_count: 0,
            updated_at: None,
        }
    }
}

impl ScrapeSession {
    /// A brand-new scrape may only begin from idle or completed.
    pub fn can_start(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Idle | SessionStatus::Completed
        )
    }

    /// Resume only picks up a stopped pass, reusing mode and cursor.
    pub fn can_resume(&self) -> bool {
        self.status == SessionStatus::Stopped
    }
}

/// Events published on the bus while a scrape runs. The command surface
/// acknowledges immediately; progress flows through these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    ScrapeStarted {
        trace_id: Uuid,
        mode: ScrapeMode,
        rescan: bool,
    },
    ScrapeResumed {
        trace_id: Uuid,
        mode: ScrapeMode,
    },
    ScrapeStopped {
        trace_id: Uuid,
        handles_processed: u32,
    },
    ScrapeCompleted {
        trace_id: Uuid,
        handles_processed: u32,
        positive_count: u32,
    },
    HandleProcessed {
        counterparty_id: String,
        new_messages: u32,
        has_positive_intent: bool,
    },
    HandleSkipped {
        counterparty_id: String,
        reason: String,
    },
    LeadUpserted {
        counterparty_id: String,
        positive_message_count: u32,
    },
    LogLine {
        at: DateTime<Utc>,
        message: String,
    },
}

impl BusMessage {
    pub fn log(message: impl Into<String>) -> Self {
        BusMessage::LogLine {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_identity_distinguishes_timestamp() {
        let a = Message {
            sender: "Alice".into(),
            text: "hi".into(),
            timestamp: Some("2025-01-01T10:00:00Z".into()),
            intent: Intent::Unset,
        };
        let mut b = a.clone();
        assert_eq!(a.identity(), b.identity());
        b.timestamp = None;
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn parsed_timestamp_rejects_garbage() {
        let msg = Message {
            sender: "Alice".into(),
            text: "hi".into(),
            timestamp: Some("yesterday-ish".into()),
            intent: Intent::Unset,
        };
        assert!(msg.parsed_timestamp().is_none());

        let msg = Message {
            timestamp: Some("2025-01-01T10:00:00+02:00".into()),
            ..msg
        };
        assert!(msg.parsed_timestamp().is_some());
    }

    #[test]
    fn intent_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Intent::Positive).unwrap(), "\"positive\"");
        let parsed: Intent = serde_json::from_str("\"unset\"").unwrap();
        assert_eq!(parsed, Intent::Unset);
    }

    #[test]
    fn message_backward_compat_defaults() {
        // Records persisted before intent/timestamp existed still load.
        let old_json = r#"{"sender":"Alice","text":"hello"}"#;
        let msg: Message = serde_json::from_str(old_json).unwrap();
        assert_eq!(msg.intent, Intent::Unset);
        assert_eq!(msg.timestamp, None);
    }

    #[test]
    fn session_transition_guards() {
        let mut session = ScrapeSession::default();
        assert!(session.can_start());
        assert!(!session.can_resume());

        session.status = SessionStatus::Scraping;
        assert!(!session.can_start());
        assert!(!session.can_resume());

        session.status = SessionStatus::Stopped;
        assert!(!session.can_start());
        assert!(session.can_resume());

        session.status = SessionStatus::Completed;
        assert!(session.can_start());
        assert!(!session.can_resume());
    }

    #[test]
    fn bus_message_serde_roundtrip() {
        let msg = BusMessage::HandleProcessed {
            counterparty_id: "acct-42".into(),
            new_messages: 3,
            has_positive_intent: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let de: BusMessage = serde_json::from_str(&json).unwrap();
        match de {
            BusMessage::HandleProcessed {
                counterparty_id,
                new_messages,
                has_positive_intent,
            } => {
                assert_eq!(counterparty_id, "acct-42");
                assert_eq!(new_messages, 3);
                assert!(has_positive_intent);
            }
            _ => panic!("expected HandleProcessed"),
        }
    }

    #[test]
    fn scrape_session_serde_roundtrip() {
        let mut session = ScrapeSession::default();
        session.status = SessionStatus::Stopped;
        session.mode = Some(ScrapeMode::Conversations);
        session.resume_cursor.insert("acct-1".into());
        session.handles_processed = 7;

        let json = serde_json::to_string(&session).unwrap();
        let de: ScrapeSession = serde_json::from_str(&json).unwrap();
        assert_eq!(de, session);
    }
}
