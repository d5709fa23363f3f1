//! Tool system: the capabilities advertised to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DashChatError, Result};
use crate::schema::{ToolParameter, ToolSchema};

/// Failure classes a tool can report back to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream answered with a non-2xx status.
    #[serde(rename = "HTTPError")]
    HttpError,
    /// Transport failure: timeout, DNS, connection refused.
    #[serde(rename = "RequestException")]
    RequestException,
    /// Upstream body was not the JSON we expected.
    #[serde(rename = "JSONDecodeError")]
    JsonDecodeError,
    /// The model asked for a tool we don't have.
    #[serde(rename = "NotFound")]
    NotFound,
    /// The model's arguments don't fit the tool.
    #[serde(rename = "InvocationError")]
    InvocationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpError => "HTTPError",
            Self::RequestException => "RequestException",
            Self::JsonDecodeError => "JSONDecodeError",
            Self::NotFound => "NotFound",
            Self::InvocationError => "InvocationError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified tool failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvocationError, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of a tool invocation. Tools never fail past their own boundary;
/// every failure is captured here and handed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Ok(Value),
    Err(ToolError),
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok(_) => None,
            Self::Err(e) => Some(e.kind),
        }
    }

    /// JSON form fed back to the model: the payload itself, or an
    /// `{"error", "message", "details"}` object.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Ok(payload) => payload.clone(),
            Self::Err(e) => {
                let mut v = json!({
                    "error": e.kind.as_str(),
                    "message": e.message,
                });
                if let Some(details) = &e.details {
                    v["details"] = json!(details);
                }
                v
            }
        }
    }
}

impl From<std::result::Result<Value, ToolError>> for ToolResult {
    fn from(r: std::result::Result<Value, ToolError>) -> Self {
        match r {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err(e),
        }
    }
}

/// A capability the model can call.
///
/// # Example
///
/// ```rust,ignore
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echo the given text" }
///     fn parameters(&self) -> Vec<ToolParameter> {
///         vec![ToolParameter::required("text", ParamType::String, "Text to echo")]
///     }
///
///     async fn execute(&self, args: Value) -> ToolResult {
///         match required_str(&args, "text") {
///             Ok(text) => ToolResult::Ok(json!({ "text": text })),
///             Err(e) => ToolResult::Err(e),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name the model calls.
    fn name(&self) -> &str;

    /// What the tool does, in words the model reads.
    fn description(&self) -> &str;

    /// Ordered parameter list.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Run the tool. Must not panic on bad arguments.
    async fn execute(&self, args: Value) -> ToolResult;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invocation(format!("missing required string argument '{}'", key)))
}

/// Fetch an optional string argument; empty strings count as absent.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Fetch an optional integer argument. Models sometimes send integers as
/// floats (`5.0`), so those are accepted too.
pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    let v = args.get(key)?;
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// Registry of tools, built once at startup and handed to the orchestrator.
/// Keeps registration order so the advertised catalog is stable.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        tracing::debug!("Registered tool: {}", name);
        match self.tools.iter().position(|t| t.name() == name) {
            Some(idx) => self.tools[idx] = Box::new(tool),
            None => self.tools.push(Box::new(tool)),
        }
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
            .ok_or_else(|| DashChatError::ToolNotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Schemas of every registered tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Invoke a tool by name. Unknown names come back as a `NotFound`
    /// result rather than an error.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        let tool = match self.resolve(name) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!("{}", e);
                return ToolResult::Err(ToolError::new(
                    ErrorKind::NotFound,
                    format!("Tool '{}' not found", name),
                ));
            }
        };

        tracing::info!("Executing tool: {} with args: {}", name, args);

        let result = tool.execute(args).await;
        match &result {
            ToolResult::Ok(payload) => {
                tracing::debug!("Tool {} completed ({} bytes)", name, payload.to_string().len())
            }
            ToolResult::Err(e) => tracing::error!("Tool {} failed: {}", name, e),
        }
        result
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
