//! Tool-calling orchestrator: the loop between a prompt, the model and
//! the tool registry.
//!
//! Each prompt starts a fresh session:
//! 1. Send the prompt with the tool catalog
//! 2. If the model asks for a function, run it and send the result back
//! 3. Repeat until the model answers in plain text
//! 4. Record the prompt/answer pair and return the answer

use crate::conversation::ConversationLog;
use crate::error::{DashChatError, Result};
use crate::message::{Content, ModelReply, ToolCallRequest};
use crate::provider::{GenerateRequest, LlmProvider};
use crate::tool::ToolRegistry;

/// Configuration for the orchestrator loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tool round trips allowed before giving up.
    pub max_round_trips: usize,
    /// Optional system instruction sent with every request.
    pub system_instruction: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_round_trips: 8,
            system_instruction: None,
        }
    }
}

/// Where the loop currently is.
#[derive(Debug)]
enum State {
    AwaitingModel,
    AwaitingTool(ToolCallRequest),
    Done(String),
}

/// Drives one prompt to a final answer.
pub struct Orchestrator {
    pub config: OrchestratorConfig,
    pub tools: ToolRegistry,
}

impl Orchestrator {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            tools,
        }
    }

    pub fn with_config(config: OrchestratorConfig, tools: ToolRegistry) -> Self {
        Self { config, tools }
    }

    /// Run the tool-calling loop for a single prompt and return the model's
    /// final text. Nothing is persisted.
    pub async fn run(&self, provider: &dyn LlmProvider, prompt: &str) -> Result<String> {
        let tools = self.tools.schemas();
        let mut contents = vec![Content::user(prompt)];
        let mut round_trips = 0;
        let mut state = State::AwaitingModel;

        loop {
            state = match state {
                State::AwaitingModel => {
                    let request = GenerateRequest {
                        contents: contents.clone(),
                        tools: tools.clone(),
                        system_instruction: self.config.system_instruction.clone(),
                    };

                    match provider.generate(request).await? {
                        ModelReply::FunctionCall(call) => {
                            if round_trips >= self.config.max_round_trips {
                                tracing::error!(
                                    "Model still requesting '{}' after {} round trip(s), giving up",
                                    call.name,
                                    round_trips
                                );
                                return Err(DashChatError::MaxRoundTrips(
                                    self.config.max_round_trips,
                                ));
                            }
                            State::AwaitingTool(call)
                        }
                        ModelReply::FinalText(text) => State::Done(text),
                    }
                }
                State::AwaitingTool(call) => {
                    round_trips += 1;
                    tracing::info!(
                        "Model wants tool '{}' (round trip {}/{})",
                        call.name,
                        round_trips,
                        self.config.max_round_trips
                    );

                    let result = self.tools.invoke(&call.name, call.args.clone()).await;

                    contents.push(Content::model_call(&call));
                    contents.push(Content::function_response(&call.name, &result));
                    State::AwaitingModel
                }
                State::Done(text) => {
                    tracing::info!(
                        "Orchestrator finished after {} round trip(s), response: {} chars",
                        round_trips,
                        text.len()
                    );
                    return Ok(text);
                }
            };
        }
    }

    /// Run the loop, then record the prompt/answer pair. A persistence
    /// failure is logged and the answer is still returned.
    pub async fn process(
        &self,
        provider: &dyn LlmProvider,
        log: &dyn ConversationLog,
        prompt: &str,
    ) -> Result<String> {
        let answer = self.run(provider, prompt).await?;

        if let Err(e) = log.record(prompt, &answer).await {
            tracing::warn!("Failed to record conversation turn: {}", e);
        }

        Ok(answer)
    }
}
