//! Search-augmented licensing agent
//!
//! Drives a chat model through a bounded tool-calling loop. The model may
//! call `web_search` any number of times per round; the final textual turn
//! is the agent's output.

use super::prompts::{user_prompt, SYSTEM_PROMPT};
use crate::error::LicenseCheckError;
use crate::llm::{ChatMessage, ChatModel};
use crate::models::InputRecord;
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Tool-calling rounds before the model is asked to answer without tools.
pub const MAX_TOOL_ROUNDS: usize = 6;

/// Conversation handed to the agent for one software entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub system: String,
    pub user: String,
}

impl AgentRequest {
    pub fn for_record(record: &InputRecord) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: user_prompt(record.name(), record.version()),
        }
    }
}

/// Language-model agent boundary: conversation in, final text out.
#[async_trait]
pub trait LicenseAgent: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<String>;
}

pub struct SearchAgent {
    model: Box<dyn ChatModel>,
    tools: ToolRegistry,
    max_tool_rounds: usize,
}

impl SearchAgent {
    pub fn new(model: Box<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            max_tool_rounds: MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }
}

#[async_trait]
impl LicenseAgent for SearchAgent {
    async fn invoke(&self, request: &AgentRequest) -> Result<String> {
        let specs = self.tools.specs();
        let mut messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];

        for round in 0..=self.max_tool_rounds {
            let offer_tools = round < self.max_tool_rounds && !specs.is_empty();
            let reply = self
                .model
                .complete(&messages, offer_tools.then_some(specs.as_slice()))
                .await?;

            if offer_tools && reply.wants_tools() {
                debug!(
                    round,
                    calls = reply.tool_calls.len(),
                    "Model requested tool calls"
                );

                let content = Some(reply.text.clone()).filter(|t| !t.is_empty());
                messages.push(ChatMessage::assistant_tool_calls(
                    content,
                    reply.tool_calls.clone(),
                ));

                for call in &reply.tool_calls {
                    let output = match self.tools.execute(call).await {
                        Ok(output) => output,
                        // model-side mistakes are reported back so it can correct itself
                        Err(e @ LicenseCheckError::ToolNotFound(_))
                        | Err(e @ LicenseCheckError::InvalidToolInput(_)) => {
                            warn!(tool = %call.function.name, error = %e, "Rejected tool call");
                            format!("Error: {}", e)
                        }
                        Err(e) => return Err(e),
                    };
                    messages.push(ChatMessage::tool_result(call.id.as_str(), output));
                }
                continue;
            }

            // empty text goes through heuristic extraction like any unparseable reply
            if reply.text.trim().is_empty() {
                warn!(round, "Model returned an empty final answer");
            }
            return Ok(reply.text.trim().to_string());
        }

        Err(LicenseCheckError::Llm(format!(
            "no final answer after {} tool rounds",
            self.max_tool_rounds
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AssistantReply, FunctionCall, ToolCall, ToolSpec};
    use crate::tools::Tool;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned replies and records what each turn offered.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<AssistantReply>>>,
        turns: Arc<Mutex<Vec<(usize, bool)>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<AssistantReply>>) -> (Self, Arc<Mutex<Vec<(usize, bool)>>>) {
            let turns = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    replies: Mutex::new(replies.into()),
                    turns: turns.clone(),
                },
                turns,
            )
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: Option<&[ToolSpec]>,
        ) -> Result<AssistantReply> {
            self.turns.lock().unwrap().push((messages.len(), tools.is_some()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LicenseCheckError::Llm("script exhausted".to_string())))
        }
    }

    struct StubSearch {
        fail: bool,
    }

    #[async_trait]
    impl Tool for StubSearch {
        fn name(&self) -> &'static str {
            "web_search"
        }

        fn description(&self) -> &'static str {
            "stub"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _arguments: &Value) -> Result<String> {
            if self.fail {
                Err(LicenseCheckError::Search("rate limited".to_string()))
            } else {
                Ok("- WinRAR is trialware (https://www.win-rar.com/)".to_string())
            }
        }
    }

    fn text(content: &str) -> Result<AssistantReply> {
        Ok(AssistantReply {
            text: content.to_string(),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
        })
    }

    fn search_call(name: &str) -> Result<AssistantReply> {
        Ok(AssistantReply {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: r#"{"query": "winrar license"}"#.to_string(),
                },
            }],
            finish_reason: Some("tool_calls".to_string()),
        })
    }

    fn registry(fail: bool) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubSearch { fail }));
        registry
    }

    fn request() -> AgentRequest {
        AgentRequest::for_record(&InputRecord::new("WinRAR", None, None).unwrap())
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let (model, turns) = ScriptedModel::new(vec![text("  {\"status_licenciamento\": \"Sim\"}  ")]);
        let agent = SearchAgent::new(Box::new(model), registry(false));

        let output = agent.invoke(&request()).await.unwrap();
        assert_eq!(output, "{\"status_licenciamento\": \"Sim\"}");
        assert_eq!(*turns.lock().unwrap(), vec![(2, true)]);
    }

    #[tokio::test]
    async fn test_tool_round_feeds_results_back() {
        let (model, turns) = ScriptedModel::new(vec![search_call("web_search"), text("final")]);
        let agent = SearchAgent::new(Box::new(model), registry(false));

        assert_eq!(agent.invoke(&request()).await.unwrap(), "final");
        // system + user, then + assistant tool call + tool result
        assert_eq!(*turns.lock().unwrap(), vec![(2, true), (4, true)]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let (model, _) = ScriptedModel::new(vec![search_call("browse"), text("recovered")]);
        let agent = SearchAgent::new(Box::new(model), registry(false));

        assert_eq!(agent.invoke(&request()).await.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_search_failure_fails_invocation() {
        let (model, _) = ScriptedModel::new(vec![search_call("web_search"), text("unused")]);
        let agent = SearchAgent::new(Box::new(model), registry(true));

        let result = agent.invoke(&request()).await;
        assert!(matches!(result, Err(LicenseCheckError::Search(_))));
    }

    #[tokio::test]
    async fn test_last_round_withholds_tools() {
        let (model, turns) = ScriptedModel::new(vec![
            search_call("web_search"),
            search_call("web_search"),
            text("forced answer"),
        ]);
        let agent = SearchAgent::new(Box::new(model), registry(false)).with_max_tool_rounds(2);

        assert_eq!(agent.invoke(&request()).await.unwrap(), "forced answer");
        let offered: Vec<bool> = turns.lock().unwrap().iter().map(|(_, t)| *t).collect();
        assert_eq!(offered, vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_empty_final_answer_is_returned_as_text() {
        let (model, turns) = ScriptedModel::new(vec![text("   ")]);
        let agent = SearchAgent::new(Box::new(model), registry(false));

        assert_eq!(agent.invoke(&request()).await.unwrap(), "");
        assert_eq!(turns.lock().unwrap().len(), 1);
    }
}
