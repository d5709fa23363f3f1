//! Deep search: question answering over documents indexed in a DeepSearcher
//! service (vector store + LLM reasoning).
//!
//! Querying and indexing are separate. The tool only ever queries; indexing
//! is an offline step driven by [`DeepSearchIndexer`] from the CLI.

use async_trait::async_trait;
use serde_json::{Value, json};

use dashchat_core::schema::{ParamType, ToolParameter};
use dashchat_core::tool::{ErrorKind, Tool, ToolError, ToolResult, required_str};

use super::upstream::UpstreamClient;

/// Ask the deep search service a question.
pub struct DeepSearchTool {
    upstream: UpstreamClient,
    base_url: String,
    max_iter: u32,
}

impl DeepSearchTool {
    pub fn new(upstream: UpstreamClient, base_url: &str, max_iter: u32) -> Self {
        Self {
            upstream,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_iter,
        }
    }
}

#[async_trait]
impl Tool for DeepSearchTool {
    fn name(&self) -> &str {
        "get_deepsearcher"
    }

    fn description(&self) -> &str {
        "Answers in-depth questions using a deep semantic search over documents \
         previously indexed into a vector database (for example, company \
         sustainability reports). Use this when the question is about the \
         content of those documents rather than live data."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "search_info",
            ParamType::String,
            "The question to research against the indexed documents. \
             Example: 'What are Singtel's sustainability efforts in 2024?'",
        )]
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let question = match required_str(&args, "search_info") {
            Ok(q) => q,
            Err(e) => return ToolResult::Err(e),
        };
        tracing::info!("get_deepsearcher: \"{}\"", question);

        let url = format!("{}/query/", self.base_url);
        let query = [
            ("original_query", question.to_string()),
            ("max_iter", self.max_iter.to_string()),
        ];

        let body = match self.upstream.get_json(&url, &query).await {
            Ok(b) => b,
            Err(e) => return ToolResult::Err(e),
        };

        match body.get("result") {
            Some(answer) => ToolResult::Ok(json!({ "result": answer })),
            None => ToolResult::Err(ToolError::new(
                ErrorKind::JsonDecodeError,
                "Deep search response has no 'result' field.",
            )),
        }
    }
}

/// Loads web pages or documents into a deep search collection.
pub struct DeepSearchIndexer {
    upstream: UpstreamClient,
    base_url: String,
}

impl DeepSearchIndexer {
    pub fn new(upstream: UpstreamClient, base_url: &str) -> Self {
        Self {
            upstream,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Crawl `urls` into `collection`. Returns the service's reply.
    pub async fn load_website(
        &self,
        urls: &[String],
        collection: &str,
        description: Option<&str>,
    ) -> Result<Value, ToolError> {
        if urls.is_empty() {
            return Err(ToolError::invocation("at least one URL is required"));
        }
        if collection.contains(char::is_whitespace) {
            return Err(ToolError::invocation(format!(
                "collection name '{}' must not contain whitespace",
                collection
            )));
        }

        let mut body = json!({
            "urls": urls,
            "collection_name": collection,
        });
        if let Some(desc) = description {
            body["collection_description"] = json!(desc);
        }

        tracing::info!(
            "Indexing {} URL(s) into collection '{}'",
            urls.len(),
            collection
        );
        let request = self
            .upstream
            .client()
            .post(format!("{}/load-website/", self.base_url))
            .json(&body);
        self.upstream.send_json(request).await
    }
}
