//! Conversation log: persisted prompt/response history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who authored a persisted turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
}

/// One persisted message. A bot turn carries the id of the user turn it
/// answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub prompt_id: i64,
}

impl ConversationTurn {
    pub fn user(prompt_id: i64, text: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.to_string(),
            created_at,
            prompt_id,
        }
    }

    pub fn bot(prompt_id: i64, text: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            role: TurnRole::Bot,
            text: text.to_string(),
            created_at,
            prompt_id,
        }
    }
}

/// Sort merged user and bot turns by creation time, ascending. Equal
/// timestamps keep their input order.
pub fn sort_history(mut turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    turns.sort_by_key(|t| t.created_at);
    turns
}

/// Parse a datastore timestamp. Accepts RFC 3339 with an offset, or a bare
/// `YYYY-MM-DD[T ]HH:MM:SS[.f]` which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Storage backend for the conversation log. Append-only: no updates, no
/// deletes.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Persist a prompt and the answer to it. The user turn is written
    /// first; the bot turn references the id it was given.
    async fn record(&self, prompt: &str, response: &str) -> Result<()>;

    /// Every persisted turn, both roles, oldest first.
    async fn history(&self) -> Result<Vec<ConversationTurn>>;
}

/// In-memory log for tests and offline runs.
pub struct InMemoryLog {
    turns: std::sync::Mutex<Vec<ConversationTurn>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            turns: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for InMemoryLog {
    async fn record(&self, prompt: &str, response: &str) -> Result<()> {
        let mut turns = self
            .turns
            .lock()
            .map_err(|e| crate::error::DashChatError::Persist(e.to_string()))?;
        let prompt_id = turns
            .iter()
            .map(|t| t.prompt_id)
            .max()
            .unwrap_or(0)
            + 1;
        turns.push(ConversationTurn::user(prompt_id, prompt, Utc::now()));
        turns.push(ConversationTurn::bot(prompt_id, response, Utc::now()));
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ConversationTurn>> {
        let turns = self
            .turns
            .lock()
            .map_err(|e| crate::error::DashChatError::Persist(e.to_string()))?;
        Ok(sort_history(turns.clone()))
    }
}
