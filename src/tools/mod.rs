//! Tool trait and registry
//!
//! Tools are capabilities the model may call during a verification turn.
//! The only production tool is `web_search`, backed by the DuckDuckGo
//! instant answer API.

use crate::error::LicenseCheckError;
use crate::llm::{ToolCall, ToolSpec};
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";
const DEFAULT_MAX_RESULTS: usize = 8;

/// Trait for a single tool callable by the model
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the argument object
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<String>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function specs offered to the model, in name order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    /// Execute one model-issued tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .get(&call.function.name)
            .ok_or_else(|| LicenseCheckError::ToolNotFound(call.function.name.clone()))?;

        let arguments: Value = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                LicenseCheckError::InvalidToolInput(format!(
                    "arguments for {} are not valid JSON: {}",
                    call.function.name, e
                ))
            })?
        };

        tool.execute(&arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_query(arguments: &Value) -> Result<String> {
    arguments
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            LicenseCheckError::InvalidToolInput("Expected non-empty 'query'".to_string())
        })
}

//
// ================= Web Search =================
//

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .user_agent(concat!("license-check-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: DUCKDUCKGO_ENDPOINT.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    async fn search(&self, query: &str) -> Result<InstantAnswer> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| LicenseCheckError::Search(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseCheckError::Search(format!(
                "search endpoint returned {}",
                status
            )));
        }

        // The endpoint labels JSON as `application/x-javascript`; decode by hand.
        let body = response
            .text()
            .await
            .map_err(|e| LicenseCheckError::Search(format!("unreadable body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| LicenseCheckError::Search(format!("invalid JSON: {}", e)))
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for current information. Input: a search query about a software product, its license terms or pricing."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<String> {
        let query = require_query(arguments)?;
        debug!(query = %query, "Running web search");

        let answer = self.search(&query).await?;
        Ok(format_results(&query, &answer, self.max_results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    abstract_source: String,
    results: Vec<Topic>,
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Topic {
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    /// Present on grouped topics
    topics: Vec<Topic>,
}

fn collect_topics<'a>(topics: &'a [Topic], out: &mut Vec<&'a Topic>) {
    for topic in topics {
        if topic.topics.is_empty() {
            if !topic.text.is_empty() {
                out.push(topic);
            }
        } else {
            collect_topics(&topic.topics, out);
        }
    }
}

/// Render search hits as plain text lines for the model.
fn format_results(query: &str, answer: &InstantAnswer, max_results: usize) -> String {
    let mut lines = Vec::new();

    if !answer.abstract_text.is_empty() {
        let source = if answer.abstract_source.is_empty() {
            answer.heading.as_str()
        } else {
            answer.abstract_source.as_str()
        };
        lines.push(format!(
            "[{}] {} ({})",
            source, answer.abstract_text, answer.abstract_url
        ));
    }

    let mut topics = Vec::new();
    collect_topics(&answer.results, &mut topics);
    collect_topics(&answer.related_topics, &mut topics);

    for topic in topics {
        if lines.len() >= max_results {
            break;
        }
        lines.push(format!("- {} ({})", topic.text, topic.first_url));
    }

    if lines.is_empty() {
        format!("No results found for '{}'.", query)
    } else {
        lines.join("\n")
    }
}

/// Create a registry holding the web search tool.
pub fn create_default_registry(timeout: Duration) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new(timeout)?));
    Ok(registry)
}
