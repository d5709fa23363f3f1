//! Web search tool: query a JSON search API and return titles, summaries
//! and links.
//!
//! The default backend is Jina Search (`s.jina.ai`), which answers
//! `GET /?q=...` with `{"data": [{"title", "url", "description", "content"}]}`.
//! An API key is optional and sent as a bearer token.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use dashchat_core::schema::{ParamType, ToolParameter};
use dashchat_core::tool::{ErrorKind, Tool, ToolError, ToolResult, optional_u64, required_str};

use super::upstream::UpstreamClient;

const DEFAULT_MAX_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 300;

/// One search hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub summary: String,
    pub link: String,
}

/// Web search over a JSON search API.
pub struct WebSearchTool {
    upstream: UpstreamClient,
    base_url: String,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(upstream: UpstreamClient, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            upstream,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let mut request = self
            .upstream
            .client()
            .get(format!("{}/", self.base_url))
            .query(&[("q", query)])
            .header("Accept", "application/json")
            .header("X-Retain-Images", "none");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = self.upstream.send_json(request).await?;
        parse_results(&body, max_results)
    }
}

/// Pull results out of a search response. The list may sit under `data`,
/// `results` or `items`; entries without a link are dropped.
pub fn parse_results(body: &Value, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
    let items = body["data"]
        .as_array()
        .or_else(|| body["results"].as_array())
        .or_else(|| body["items"].as_array())
        .ok_or_else(|| {
            ToolError::new(
                ErrorKind::JsonDecodeError,
                "Search response has no 'data', 'results' or 'items' list.",
            )
        })?;

    let results = items
        .iter()
        .filter_map(|item| {
            let link = item["url"]
                .as_str()
                .or_else(|| item["link"].as_str())
                .or_else(|| item["href"].as_str())?
                .to_string();
            if link.is_empty() {
                return None;
            }

            let title = item["title"].as_str().unwrap_or("No Title").to_string();
            let summary = item["description"]
                .as_str()
                .or_else(|| item["snippet"].as_str())
                .or_else(|| item["body"].as_str())
                .map(str::to_string)
                .or_else(|| item["content"].as_str().map(truncate_snippet))
                .unwrap_or_else(|| "No Summary".to_string());

            Some(SearchResult { title, summary, link })
        })
        .take(max_results)
        .collect();

    Ok(results)
}

fn truncate_snippet(text: &str) -> String {
    let t = text.trim();
    match t.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &t[..idx]),
        None => t.to_string(),
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "perform_web_search"
    }

    fn description(&self) -> &str {
        "Performs a web search based on a given query string. \
         The tool retrieves a list of search result titles and summaries. \
         You can specify the maximum number of results to return."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "query",
                ParamType::String,
                "The search query string to use for the web search. \
                 Example: 'current events in technology', 'Python tutorials', 'latest weather news'.",
            ),
            ToolParameter::optional(
                "max_results",
                ParamType::Integer,
                "Optional. The maximum number of search results to retrieve. \
                 Defaults to 5 if not specified.",
            ),
        ]
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let query = match required_str(&args, "query") {
            Ok(q) => q.trim(),
            Err(e) => return ToolResult::Err(e),
        };
        let max_results = optional_u64(&args, "max_results")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        tracing::info!("perform_web_search: \"{}\" (max={})", query, max_results);

        self.search(query, max_results)
            .await
            .map(|results| {
                tracing::debug!("perform_web_search: {} result(s)", results.len());
                json!({ "results": results })
            })
            .into()
    }
}
