//! SQLite-backed conversation log for local development.
//!
//! Mirrors the hosted schema: `user_prompts` and `chatbot_responses`, the
//! latter pointing back at the prompt it answers.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use dashchat_core::conversation::{
    ConversationLog, ConversationTurn, parse_timestamp, sort_history,
};
use dashchat_core::error::{DashChatError, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS user_prompts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        prompt_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS chatbot_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        prompt_id INTEGER NOT NULL REFERENCES user_prompts(id),
        response_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_responses_prompt ON chatbot_responses(prompt_id);";

fn persist_err(e: rusqlite::Error) -> DashChatError {
    DashChatError::Persist(e.to_string())
}

/// Conversation log in a local SQLite file.
pub struct SqliteLog {
    conn: Mutex<Connection>,
}

impl SqliteLog {
    /// Open or create a SQLite database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| DashChatError::Persist(format!("SQLite open error: {}", e)))?;
        Self::init(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DashChatError::Persist(format!("SQLite error: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| DashChatError::Persist(format!("SQLite init error: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DashChatError::Persist(format!("SQLite lock poisoned: {}", e)))
    }

    fn read_turns(conn: &Connection, sql: &str, user: bool) -> Result<Vec<ConversationTurn>> {
        let mut stmt = conn.prepare(sql).map_err(persist_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(persist_err)?;

        let mut turns = Vec::new();
        for row in rows {
            let (prompt_id, text, created_at) = row.map_err(persist_err)?;
            let created_at = parse_timestamp(&created_at).ok_or_else(|| {
                DashChatError::Persist(format!("Bad created_at timestamp: {}", created_at))
            })?;
            turns.push(if user {
                ConversationTurn::user(prompt_id, &text, created_at)
            } else {
                ConversationTurn::bot(prompt_id, &text, created_at)
            });
        }
        Ok(turns)
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl ConversationLog for SqliteLog {
    async fn record(&self, prompt: &str, response: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(persist_err)?;

        tx.execute(
            "INSERT INTO user_prompts (prompt_text, created_at) VALUES (?1, ?2)",
            rusqlite::params![prompt, now_stamp()],
        )
        .map_err(persist_err)?;
        let prompt_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO chatbot_responses (prompt_id, response_text, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![prompt_id, response, now_stamp()],
        )
        .map_err(persist_err)?;

        tx.commit().map_err(persist_err)?;
        tracing::debug!("Recorded prompt #{} to SQLite", prompt_id);
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock()?;
        let mut turns = Self::read_turns(
            &conn,
            "SELECT id, prompt_text, created_at FROM user_prompts ORDER BY created_at",
            true,
        )?;
        turns.extend(Self::read_turns(
            &conn,
            "SELECT prompt_id, response_text, created_at FROM chatbot_responses ORDER BY created_at",
            false,
        )?);
        Ok(sort_history(turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashchat_core::conversation::TurnRole;

    #[tokio::test]
    async fn test_record_and_history() {
        let log = SqliteLog::in_memory().unwrap();
        log.record("weather in Tokyo?", "18°C and cloudy.").await.unwrap();
        log.record("and London?", "12°C and rainy.").await.unwrap();

        let history = log.history().await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].text, "weather in Tokyo?");
        assert_eq!(history[1].role, TurnRole::Bot);
        assert_eq!(history[1].prompt_id, history[0].prompt_id);
        assert_eq!(history[3].prompt_id, history[2].prompt_id);
        assert_ne!(history[0].prompt_id, history[2].prompt_id);
        assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_history_sorted_regardless_of_insert_order() {
        let log = SqliteLog::in_memory().unwrap();
        {
            let conn = log.lock().unwrap();
            conn.execute_batch(
                "INSERT INTO user_prompts (id, prompt_text, created_at) VALUES
                    (1, 'late', '2024-05-01T10:00:05Z'),
                    (2, 'early', '2024-05-01 09:00:00');
                 INSERT INTO chatbot_responses (prompt_id, response_text, created_at) VALUES
                    (2, 'early answer', '2024-05-01T09:00:01.500000+00:00'),
                    (1, 'late answer', '2024-05-01T10:00:06Z');",
            )
            .unwrap();
        }

        let texts: Vec<String> = log
            .history()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["early", "early answer", "late", "late answer"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dashchat.db");

        SqliteLog::open(&path)
            .unwrap()
            .record("hello", "hi there")
            .await
            .unwrap();

        let history = SqliteLog::open(&path).unwrap().history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, "hi there");
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_persist_error() {
        let log = SqliteLog::in_memory().unwrap();
        {
            let conn = log.lock().unwrap();
            conn.execute(
                "INSERT INTO user_prompts (prompt_text, created_at) VALUES ('x', 'yesterday')",
                [],
            )
            .unwrap();
        }
        assert!(matches!(log.history().await, Err(DashChatError::Persist(_))));
    }
}
