//! SQLite-backed persistence for conversations, leads and the scrape session.
//!
//! Three keyed regions with whole-record get/set semantics. All access goes
//! through one connection mutex: callers that need read-modify-write (the
//! scout's merge cycle) rely on the enforced one-handle-at-a-time design, not
//! on multi-statement transactions.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use leadscout_schema::{Conversation, Lead, Message, ScrapeMode, ScrapeSession, SessionStatus};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored record is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversations
    // ─────────────────────────────────────────────────────────────────────

    pub async fn get_conversation(&self, counterparty_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                r#"SELECT counterparty_id, profile_ref, messages, has_positive_intent
                   FROM conversations WHERE counterparty_id = ?1"#,
                [counterparty_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((counterparty_id, profile_ref, messages_json, has_positive_intent)) => {
                let messages: Vec<Message> = serde_json::from_str(&messages_json)?;
                Ok(Some(Conversation {
                    counterparty_id,
                    profile_ref,
                    messages,
                    has_positive_intent,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn put_conversation(&self, convo: &Conversation) -> Result<()> {
        let messages_json = serde_json::to_string(&convo.messages)?;
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR REPLACE INTO conversations
               (counterparty_id, profile_ref, messages, has_positive_intent, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                convo.counterparty_id,
                convo.profile_ref,
                messages_json,
                convo.has_positive_intent,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT counterparty_id, profile_ref, messages, has_positive_intent
               FROM conversations ORDER BY counterparty_id"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut conversations = Vec::new();
        for row in rows {
            let (counterparty_id, profile_ref, messages_json, has_positive_intent) = row?;
            let messages: Vec<Message> = serde_json::from_str(&messages_json)?;
            conversations.push(Conversation {
                counterparty_id,
                profile_ref,
                messages,
                has_positive_intent,
            });
        }
        Ok(conversations)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Leads
    // ─────────────────────────────────────────────────────────────────────

    pub async fn get_lead(&self, counterparty_id: &str) -> Result<Option<Lead>> {
        let conn = self.conn.lock().await;
        let lead = conn
            .query_row(
                r#"SELECT counterparty_id, profile_ref, last_positive_message,
                          last_positive_timestamp, positive_message_count
                   FROM leads WHERE counterparty_id = ?1"#,
                [counterparty_id],
                row_to_lead,
            )
            .optional()?;
        Ok(lead)
    }

    pub async fn upsert_lead(&self, lead: &Lead) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR REPLACE INTO leads
               (counterparty_id, profile_ref, last_positive_message,
                last_positive_timestamp, positive_message_count, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                lead.counterparty_id,
                lead.profile_ref,
                lead.last_positive_message,
                lead.last_positive_timestamp,
                lead.positive_message_count as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT counterparty_id, profile_ref, last_positive_message,
                      last_positive_timestamp, positive_message_count
               FROM leads ORDER BY counterparty_id"#,
        )?;
        let rows = stmt.query_map([], row_to_lead)?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────

    /// Load the persisted session, or a fresh idle one if none exists yet.
    pub async fn load_session(&self) -> Result<ScrapeSession> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                r#"SELECT status, mode, resume_cursor, handles_processed,
                          positive_count, updated_at
                   FROM scrape_session WHERE id = 1"#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((status, mode, cursor_json, handles_processed, positive_count, updated_at)) => {
                let resume_cursor: HashSet<String> = serde_json::from_str(&cursor_json)?;
                Ok(ScrapeSession {
                    status: parse_status(&status),
                    mode: mode.as_deref().map(parse_mode),
                    resume_cursor,
                    handles_processed: handles_processed as u32,
                    positive_count: positive_count as u32,
                    updated_at: updated_at
                        .as_deref()
                        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                        .map(|t| t.with_timezone(&Utc)),
                })
            }
            None => Ok(ScrapeSession::default()),
        }
    }

    pub async fn save_session(&self, session: &ScrapeSession) -> Result<()> {
        let cursor_json = serde_json::to_string(&session.resume_cursor)?;
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR REPLACE INTO scrape_session
               (id, status, mode, resume_cursor, handles_processed, positive_count, updated_at)
               VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                format_status(session.status),
                session.mode.map(format_mode),
                cursor_json,
                session.handles_processed as i64,
                session.positive_count as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Reset the session to idle, keeping stored conversations and leads.
    pub async fn clear_session(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM scrape_session WHERE id = 1", [])?;
        Ok(())
    }

    /// Wipe everything: conversations, leads and session.
    pub async fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            r#"DELETE FROM conversations;
               DELETE FROM leads;
               DELETE FROM scrape_session;"#,
        )?;
        Ok(())
    }
}

fn row_to_lead(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
    Ok(Lead {
        counterparty_id: row.get(0)?,
        profile_ref: row.get(1)?,
        last_positive_message: row.get(2)?,
        last_positive_timestamp: row.get(3)?,
        positive_message_count: row.get::<_, i64>(4)? as u32,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Migrations
// ─────────────────────────────────────────────────────────────────────────

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS __leadscout_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"#,
    )?;

    let applied: std::collections::HashSet<i64> = {
        let mut stmt = conn.prepare("SELECT version FROM __leadscout_schema_version")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.filter_map(|r| r.ok()).collect()
    };

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            counterparty_id TEXT PRIMARY KEY,
            profile_ref TEXT NOT NULL,
            messages TEXT NOT NULL,
            has_positive_intent INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS leads (
            counterparty_id TEXT PRIMARY KEY,
            profile_ref TEXT NOT NULL,
            last_positive_message TEXT NOT NULL,
            last_positive_timestamp TEXT,
            positive_message_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS scrape_session (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL,
            mode TEXT,
            resume_cursor TEXT NOT NULL DEFAULT '[]',
            handles_processed INTEGER NOT NULL DEFAULT 0,
            positive_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_positive
            ON conversations(has_positive_intent);
        "#,
    )];

    for (version, sql) in migrations {
        if applied.contains(&version) {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO __leadscout_schema_version(version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────

fn format_status(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Idle => "idle",
        SessionStatus::Scraping => "scraping",
        SessionStatus::Stopped => "stopped",
        SessionStatus::Completed => "completed",
    }
}

fn parse_status(s: &str) -> SessionStatus {
    match s {
        "scraping" => SessionStatus::Scraping,
        "stopped" => SessionStatus::Stopped,
        "completed" => SessionStatus::Completed,
        _ => SessionStatus::Idle,
    }
}

fn format_mode(mode: ScrapeMode) -> &'static str {
    match mode {
        ScrapeMode::Leads => "leads",
        ScrapeMode::Conversations => "conversations",
    }
}

fn parse_mode(s: &str) -> ScrapeMode {
    match s {
        "conversations" => ScrapeMode::Conversations,
        _ => ScrapeMode::Leads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_schema::Intent;
    use tempfile::TempDir;

    fn sample_conversation() -> Conversation {
        Conversation {
            counterparty_id: "acct-1".into(),
            profile_ref: "https://example.com/in/acct-1".into(),
            messages: vec![Message {
                sender: "Alice".into(),
                text: "Interested!".into(),
                timestamp: Some("2025-03-01T09:00:00Z".into()),
                intent: Intent::Positive,
            }],
            has_positive_intent: true,
        }
    }

    #[tokio::test]
    async fn conversation_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).unwrap();

        let convo = sample_conversation();
        store.put_conversation(&convo).await.unwrap();

        let loaded = store.get_conversation("acct-1").await.unwrap().unwrap();
        assert_eq!(loaded, convo);
        assert!(store.get_conversation("acct-missing").await.unwrap().is_none());

        // Overwrite replaces, never duplicates.
        store.put_conversation(&convo).await.unwrap();
        assert_eq!(store.list_conversations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lead_upsert_replaces() {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).unwrap();

        let mut lead = Lead {
            counterparty_id: "acct-1".into(),
            profile_ref: "https://example.com/in/acct-1".into(),
            last_positive_message: "Interested!".into(),
            last_positive_timestamp: Some("2025-03-01T09:00:00Z".into()),
            positive_message_count: 1,
        };
        store.upsert_lead(&lead).await.unwrap();

        lead.last_positive_message = "Still interested!".into();
        lead.positive_message_count = 2;
        store.upsert_lead(&lead).await.unwrap();

        let leads = store.list_leads().await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].positive_message_count, 2);
        assert_eq!(leads[0].last_positive_message, "Still interested!");
    }

    #[tokio::test]
    async fn session_roundtrip_and_default() {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).unwrap();

        // No session saved yet: fresh idle.
        let session = store.load_session().await.unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.resume_cursor.is_empty());

        let mut session = ScrapeSession::default();
        session.status = SessionStatus::Stopped;
        session.mode = Some(ScrapeMode::Conversations);
        session.resume_cursor.insert("acct-1".into());
        session.resume_cursor.insert("acct-2".into());
        session.handles_processed = 2;
        session.positive_count = 1;
        store.save_session(&session).await.unwrap();

        let loaded = store.load_session().await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Stopped);
        assert_eq!(loaded.mode, Some(ScrapeMode::Conversations));
        assert_eq!(loaded.resume_cursor.len(), 2);
        assert_eq!(loaded.handles_processed, 2);
        assert_eq!(loaded.positive_count, 1);
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.db");

        {
            let store = Store::open(&path).unwrap();
            let mut session = ScrapeSession::default();
            session.status = SessionStatus::Stopped;
            session.resume_cursor.insert("acct-1".into());
            store.save_session(&session).await.unwrap();
        }

        let store = Store::open(&path).unwrap();
        let loaded = store.load_session().await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Stopped);
        assert!(loaded.resume_cursor.contains("acct-1"));
    }

    #[tokio::test]
    async fn clear_session_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).unwrap();

        store.put_conversation(&sample_conversation()).await.unwrap();
        let mut session = ScrapeSession::default();
        session.status = SessionStatus::Completed;
        store.save_session(&session).await.unwrap();

        store.clear_session().await.unwrap();
        assert_eq!(
            store.load_session().await.unwrap().status,
            SessionStatus::Idle
        );
        assert_eq!(store.list_conversations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_all_wipes_everything() {
        let tmp = TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("test.db")).unwrap();

        store.put_conversation(&sample_conversation()).await.unwrap();
        store
            .upsert_lead(&Lead {
                counterparty_id: "acct-1".into(),
                profile_ref: String::new(),
                last_positive_message: "Interested!".into(),
                last_positive_timestamp: None,
                positive_message_count: 1,
            })
            .await
            .unwrap();

        store.clear_all().await.unwrap();
        assert!(store.list_conversations().await.unwrap().is_empty());
        assert!(store.list_leads().await.unwrap().is_empty());
    }
}
