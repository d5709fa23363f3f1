//! LLM provider trait: the abstraction over the hosted model API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Content, ModelReply};
use crate::schema::ToolSchema;

/// One request to the model: the conversation so far plus the tool catalog.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<ToolSchema>,
    pub system_instruction: Option<String>,
}

/// LLM provider trait: implement this to plug in a model API.
///
/// # Example
///
/// ```rust,ignore
/// struct CannedProvider;
///
/// #[async_trait]
/// impl LlmProvider for CannedProvider {
///     fn name(&self) -> &str { "canned" }
///     fn model(&self) -> &str { "canned-1" }
///
///     async fn generate(&self, _request: GenerateRequest) -> Result<ModelReply> {
///         Ok(ModelReply::FinalText("hello".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Model the provider talks to.
    fn model(&self) -> &str;

    /// Send the conversation and decode the first candidate's reply.
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply>;
}

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Per-call timeout for the model API.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    1.0
}

fn default_top_k() -> u32 {
    1
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_base: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
