//! Supabase conversation log, through the PostgREST API.
//!
//! Tables:
//! - `user_prompts(id, prompt_text, created_at)`
//! - `chatbot_responses(prompt_id, response_text, created_at)`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use dashchat_core::conversation::{
    ConversationLog, ConversationTurn, parse_timestamp, sort_history,
};
use dashchat_core::error::{DashChatError, Result};

/// Conversation log stored in a Supabase project.
pub struct SupabaseLog {
    client: Client,
    rest_url: String,
    key: String,
}

#[derive(Deserialize)]
struct PromptRow {
    id: i64,
    prompt_text: String,
    created_at: String,
}

#[derive(Deserialize)]
struct ResponseRow {
    prompt_id: i64,
    response_text: String,
    created_at: String,
}

impl SupabaseLog {
    pub fn new(url: &str, key: &str) -> Self {
        Self::with_timeout(url, key, Duration::from_secs(30))
    }

    pub fn with_timeout(url: &str, key: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            key: key.to_string(),
        }
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request
            .send()
            .await
            .map_err(|e| DashChatError::Persist(format!("Supabase request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DashChatError::Persist(format!("Supabase read failed: {}", e)))?;

        if !status.is_success() {
            return Err(DashChatError::Persist(format!(
                "Supabase error ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| DashChatError::Persist(format!("Unexpected Supabase response: {}", e)))
    }
}

fn timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(raw)
        .ok_or_else(|| DashChatError::Persist(format!("Bad created_at timestamp: {}", raw)))
}

#[async_trait]
impl ConversationLog for SupabaseLog {
    async fn record(&self, prompt: &str, response: &str) -> Result<()> {
        let inserted: Vec<PromptRow> = self
            .fetch(
                self.table(Method::POST, "user_prompts")
                    .header("Prefer", "return=representation")
                    .json(&json!({ "prompt_text": prompt })),
            )
            .await?;

        let prompt_id = inserted
            .first()
            .map(|row| row.id)
            .ok_or_else(|| DashChatError::Persist("Insert returned no prompt row".to_string()))?;

        let _: Vec<ResponseRow> = self
            .fetch(
                self.table(Method::POST, "chatbot_responses")
                    .header("Prefer", "return=representation")
                    .json(&json!({ "prompt_id": prompt_id, "response_text": response })),
            )
            .await?;

        tracing::debug!("Recorded prompt #{} to Supabase", prompt_id);
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ConversationTurn>> {
        let prompts: Vec<PromptRow> = self
            .fetch(self.table(Method::GET, "user_prompts").query(&[
                ("select", "id,prompt_text,created_at"),
                ("order", "created_at.asc"),
            ]))
            .await?;
        let responses: Vec<ResponseRow> = self
            .fetch(self.table(Method::GET, "chatbot_responses").query(&[
                ("select", "prompt_id,response_text,created_at"),
                ("order", "created_at.asc"),
            ]))
            .await?;

        let mut turns = Vec::with_capacity(prompts.len() + responses.len());
        for row in prompts {
            turns.push(ConversationTurn::user(
                row.id,
                &row.prompt_text,
                timestamp(&row.created_at)?,
            ));
        }
        for row in responses {
            turns.push(ConversationTurn::bot(
                row.prompt_id,
                &row.response_text,
                timestamp(&row.created_at)?,
            ));
        }

        tracing::debug!("Fetched {} turn(s) from Supabase", turns.len());
        Ok(sort_history(turns))
    }
}
