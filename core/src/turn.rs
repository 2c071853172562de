//! Conversation turn orchestration
//!
//! One turn runs the two-pass protocol: ask the model whether a tool is
//! needed, and when it is, invoke the tool through the provider and ask the
//! model again with the result appended. Per turn the state machine is
//! `AwaitingFirstModelResponse -> (DirectAnswer | ToolRequested) ->
//! AwaitingSecondModelResponse -> Done`.

use crate::error::{ProviderError, Result};
use crate::llm::{ChatOptions, ContentBlock, LlmMessage, LlmResponse};
use crate::session::SessionManager;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// System instruction attached to every model request
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant; use tools when needed.";

/// Role of a chat message on the turn-request/response boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Function,
}

/// One message on the turn-request/response boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn function(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Function,
            content: content.into(),
        }
    }
}

/// One user-message-in request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// The new user message
    pub user_message: String,
    /// Caller-supplied prior conversation, oldest first
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Messages produced by one turn, in order.
///
/// Content text is a contract: callers key UI behavior off literal substrings
/// in returned content, so the function message carries the normalized tool
/// output verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub new_messages: Vec<ChatMessage>,
}

/// A model's structured request to invoke a named tool
#[derive(Debug, Clone, PartialEq)]
pub struct CallIntent {
    /// Call id issued by the model (synthesized when absent)
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Serialized arguments exactly as the model produced them
    pub raw_arguments: String,
}

/// What the model decided on the first pass
#[derive(Debug, Clone, PartialEq)]
enum TurnDecision {
    /// Plain text answer; the turn is done
    Direct(String),
    /// The model wants a tool invoked
    CallTool(CallIntent),
}

impl TurnDecision {
    /// Classify a first-pass response. A call intent takes precedence over
    /// any text riding along with it; the text is discarded.
    fn from_response(response: &LlmResponse) -> Self {
        for block in response.message.tool_uses() {
            if let ContentBlock::ToolUse {
                id,
                name,
                arguments,
            } = block
            {
                let id = if id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    id.clone()
                };
                return TurnDecision::CallTool(CallIntent {
                    id,
                    name: name.clone(),
                    raw_arguments: arguments.clone(),
                });
            }
        }

        TurnDecision::Direct(response.message.get_text().unwrap_or_default())
    }
}

/// Routes one turn through the two-pass protocol against the shared session
pub struct Orchestrator {
    sessions: Arc<SessionManager>,
    options: ChatOptions,
}

impl Orchestrator {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            options: ChatOptions::default(),
        }
    }

    /// Override the chat options used for model calls
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one turn to completion or failure.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResponse> {
        let session = self.sessions.session().await?;

        // The model sees the entire catalog every turn; no narrowing based on
        // message content.
        let functions = session.catalog.to_tool_definitions();
        let messages = base_messages(&request);

        let first = session
            .llm
            .chat_completion(messages.clone(), Some(functions), Some(self.options.clone()))
            .await?;

        match TurnDecision::from_response(&first) {
            TurnDecision::Direct(text) => Ok(TurnResponse {
                new_messages: vec![ChatMessage::assistant(text)],
            }),
            TurnDecision::CallTool(intent) => {
                tracing::debug!(tool = %intent.name, "model requested a tool call");
                self.finish_tool_turn(&session, messages, intent).await
            }
        }
    }

    async fn finish_tool_turn(
        &self,
        session: &crate::session::Session,
        mut messages: Vec<LlmMessage>,
        intent: CallIntent,
    ) -> Result<TurnResponse> {
        if !session.catalog.contains(&intent.name) {
            return Err(ProviderError::ToolCall {
                name: intent.name.clone(),
                message: "tool is not present in the discovered catalog".to_string(),
            }
            .into());
        }

        let arguments = resolve_arguments(&intent);
        let output = session.provider.call_tool(&intent.name, arguments).await?;
        let tool_text = output.text();

        // Replay the exact call intent, then the normalized result, in that
        // order; the model's record of what it asked for must match what it
        // receives back.
        messages.push(LlmMessage::tool_use(
            intent.id.clone(),
            intent.name.clone(),
            intent.raw_arguments.clone(),
        ));
        messages.push(LlmMessage::tool_result(intent.id.clone(), tool_text.clone()));

        let second = session
            .llm
            .chat_completion(messages, None, Some(self.options.clone()))
            .await?;
        let final_text = second.message.get_text().unwrap_or_default();

        Ok(TurnResponse {
            new_messages: vec![
                ChatMessage::assistant(format!(
                    "Called {} with {}",
                    intent.name, intent.raw_arguments
                )),
                ChatMessage::function(tool_text),
                ChatMessage::assistant(final_text),
            ],
        })
    }
}

/// System instruction + prior history + the new user message.
///
/// Function-role history entries are echoes of earlier tool results; they are
/// accepted on the way in but not replayed to the model.
fn base_messages(request: &TurnRequest) -> Vec<LlmMessage> {
    let mut messages = vec![LlmMessage::system(SYSTEM_INSTRUCTION)];

    for entry in &request.history {
        match entry.role {
            ChatRole::User => messages.push(LlmMessage::user(&entry.content)),
            ChatRole::Assistant => messages.push(LlmMessage::assistant(&entry.content)),
            ChatRole::Function => {}
        }
    }

    messages.push(LlmMessage::user(&request.user_message));
    messages
}

/// Parse the intent's raw arguments into an argument object.
///
/// Unparsable or non-object arguments are substituted with an empty set
/// rather than failing the turn; the substitution is logged.
fn resolve_arguments(intent: &CallIntent) -> Map<String, Value> {
    let raw = intent.raw_arguments.trim();
    if raw.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(_) => {
            tracing::warn!(
                tool = %intent.name,
                "tool arguments were not an object; substituting an empty argument set"
            );
            Map::new()
        }
        Err(e) => {
            tracing::warn!(
                tool = %intent.name,
                "failed to parse tool arguments ({}); substituting an empty argument set",
                e
            );
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolCatalog;
    use crate::error::{Error, LlmError};
    use crate::llm::{LlmClient, MessageContent, MessageRole, ToolDefinition};
    use crate::provider::{ToolDescriptor, ToolOutput, ToolProvider};
    use crate::session::{Session, SessionConnector};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct RecordedRequest {
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
    }

    /// Replays a scripted sequence of responses and records every request.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<LlmResponse>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            messages: Vec<LlmMessage>,
            tools: Option<Vec<ToolDefinition>>,
            _options: Option<ChatOptions>,
        ) -> Result<LlmResponse> {
            self.requests
                .lock()
                .unwrap()
                .push(RecordedRequest { messages, tools });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| {
                    Error::Llm(LlmError::Unavailable {
                        message: "script exhausted".to_string(),
                    })
                })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    /// Fixed catalog plus a scripted tool result; records every invocation.
    struct ScriptedProvider {
        tools: Vec<ToolDescriptor>,
        result: Value,
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl ScriptedProvider {
        fn new(result: Value) -> Self {
            Self {
                tools: vec![ToolDescriptor {
                    name: "create_hubspot_contact".to_string(),
                    description: "Create a new contact in HubSpot".to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "email": {"type": "string"}
                        },
                        "required": ["name", "email"]
                    }),
                }],
                result,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Map<String, Value>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolProvider for ScriptedProvider {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> Result<ToolOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));

            let output = ToolOutput::from_value(self.result.clone())?;
            if output.is_error {
                return Err(ProviderError::ToolCall {
                    name: name.to_string(),
                    message: output.text(),
                }
                .into());
            }
            Ok(output)
        }
    }

    struct FixedConnector {
        llm: Arc<ScriptedLlm>,
        provider: Arc<ScriptedProvider>,
    }

    #[async_trait]
    impl SessionConnector for FixedConnector {
        async fn connect(&self) -> Result<Session> {
            let provider: Arc<dyn ToolProvider> = self.provider.clone();
            let catalog = ToolCatalog::discover(provider.as_ref()).await?;
            Ok(Session {
                llm: self.llm.clone(),
                provider,
                catalog,
            })
        }
    }

    fn orchestrator(
        llm: Arc<ScriptedLlm>,
        provider: Arc<ScriptedProvider>,
    ) -> Orchestrator {
        Orchestrator::new(Arc::new(SessionManager::with_connector(Arc::new(
            FixedConnector { llm, provider },
        ))))
    }

    fn direct(text: &str) -> LlmResponse {
        LlmResponse {
            message: LlmMessage::assistant(text),
            usage: None,
            model: "scripted".to_string(),
            finish_reason: None,
        }
    }

    fn tool_call(raw_arguments: &str) -> LlmResponse {
        LlmResponse {
            message: LlmMessage::tool_use("call_1", "create_hubspot_contact", raw_arguments),
            usage: None,
            model: "scripted".to_string(),
            finish_reason: None,
        }
    }

    fn success_result() -> Value {
        json!({"content": [{"type": "text", "text": "Contact created successfully"}]})
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let llm = Arc::new(ScriptedLlm::new(vec![direct("I don't have weather access.")]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        let response = orchestrator
            .run_turn(TurnRequest {
                user_message: "What's the weather like?".to_string(),
                history: vec![],
            })
            .await
            .unwrap();

        assert_eq!(
            response.new_messages,
            vec![ChatMessage::assistant("I don't have weather access.")]
        );
        assert!(provider.calls().is_empty());
        assert_eq!(llm.request_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let raw = r#"{"name":"Jane Doe","email":"jane@example.com"}"#;
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call(raw),
            direct("Contact created successfully. Jane Doe is now in the CRM."),
        ]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        let response = orchestrator
            .run_turn(TurnRequest {
                user_message: "Create a contact named Jane Doe, jane@example.com".to_string(),
                history: vec![],
            })
            .await
            .unwrap();

        assert_eq!(response.new_messages.len(), 3);
        assert_eq!(
            response.new_messages[0],
            ChatMessage::assistant(format!("Called create_hubspot_contact with {}", raw))
        );
        assert_eq!(
            response.new_messages[1],
            ChatMessage::function("Contact created successfully")
        );
        assert!(response.new_messages[2]
            .content
            .contains("Contact created successfully"));

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "create_hubspot_contact");
        assert_eq!(calls[0].1.get("name"), Some(&json!("Jane Doe")));
        assert_eq!(calls[0].1.get("email"), Some(&json!("jane@example.com")));
    }

    #[tokio::test]
    async fn test_tool_error_fails_the_turn() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call(r#"{"name":"Jane Doe","email":"jane@example.com"}"#),
            direct("unreachable"),
        ]));
        let provider = Arc::new(ScriptedProvider::new(json!({
            "content": [{"type": "text", "text": "duplicate email"}],
            "isError": true
        })));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        let result = orchestrator
            .run_turn(TurnRequest {
                user_message: "Create a contact named Jane Doe, jane@example.com".to_string(),
                history: vec![],
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Provider(ProviderError::ToolCall { .. }))
        ));
        // No fabricated success: the second model pass never happens.
        assert_eq!(llm.request_count(), 1);
    }

    #[tokio::test]
    async fn test_call_intent_takes_precedence_over_text() {
        let first = LlmResponse {
            message: LlmMessage {
                role: MessageRole::Assistant,
                content: MessageContent::Blocks(vec![
                    ContentBlock::Text {
                        text: "Let me create that contact for you.".to_string(),
                    },
                    ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: "create_hubspot_contact".to_string(),
                        arguments: r#"{"name":"Jane","email":"j@e.com"}"#.to_string(),
                    },
                ]),
            },
            usage: None,
            model: "scripted".to_string(),
            finish_reason: None,
        };
        let llm = Arc::new(ScriptedLlm::new(vec![first, direct("All done.")]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        let response = orchestrator
            .run_turn(TurnRequest {
                user_message: "Create Jane".to_string(),
                history: vec![],
            })
            .await
            .unwrap();

        // The tool ran and the accompanying text was discarded.
        assert_eq!(provider.calls().len(), 1);
        assert!(response
            .new_messages
            .iter()
            .all(|m| m.content != "Let me create that contact for you."));
    }

    #[tokio::test]
    async fn test_unparsable_arguments_fall_back_to_empty_set() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call("{not valid json"),
            direct("Done."),
        ]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        orchestrator
            .run_turn(TurnRequest {
                user_message: "Create a contact".to_string(),
                history: vec![],
            })
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.is_empty());

        // The replayed intent still carries the raw string untouched.
        let requests = llm.requests.lock().unwrap();
        let replayed = requests[1]
            .messages
            .iter()
            .flat_map(|m| m.tool_uses())
            .next()
            .cloned();
        match replayed {
            Some(ContentBlock::ToolUse { arguments, .. }) => {
                assert_eq!(arguments, "{not valid json");
            }
            other => panic!("expected replayed tool use, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_pass_message_ordering() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call(r#"{"name":"Jane","email":"j@e.com"}"#),
            direct("Done."),
        ]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        orchestrator
            .run_turn(TurnRequest {
                user_message: "Create Jane".to_string(),
                history: vec![
                    ChatMessage::assistant("Hello! I can call tools if needed."),
                    ChatMessage::user("Hi there"),
                    ChatMessage::function("stale tool echo"),
                ],
            })
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);

        // Pass 2 sees: system, history (function entries dropped), user,
        // replayed intent, tool result. Never reordered.
        let roles: Vec<MessageRole> = requests[1]
            .messages
            .iter()
            .map(|m| m.role.clone())
            .collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
            ]
        );

        // Pass 1 carried the full catalog; pass 2 carries no tool schema.
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(1));
        assert!(requests[1].tools.is_none());
    }

    #[tokio::test]
    async fn test_catalog_schema_is_stable_across_turns() {
        let llm = Arc::new(ScriptedLlm::new(vec![direct("one"), direct("two")]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        for message in ["first", "second"] {
            orchestrator
                .run_turn(TurnRequest {
                    user_message: message.to_string(),
                    history: vec![],
                })
                .await
                .unwrap();
        }

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].tools, requests[1].tools);
    }

    #[tokio::test]
    async fn test_intent_for_unknown_tool_is_rejected() {
        let first = LlmResponse {
            message: LlmMessage::tool_use("call_1", "drop_all_contacts", "{}"),
            usage: None,
            model: "scripted".to_string(),
            finish_reason: None,
        };
        let llm = Arc::new(ScriptedLlm::new(vec![first]));
        let provider = Arc::new(ScriptedProvider::new(success_result()));
        let orchestrator = orchestrator(llm.clone(), provider.clone());

        let result = orchestrator
            .run_turn(TurnRequest {
                user_message: "do something".to_string(),
                history: vec![],
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Provider(ProviderError::ToolCall { .. }))
        ));
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_turn_request_wire_shape() {
        let request: TurnRequest = serde_json::from_str(
            r#"{"userMessage": "hi", "history": [{"role": "assistant", "content": "hello"}]}"#,
        )
        .unwrap();
        assert_eq!(request.user_message, "hi");
        assert_eq!(request.history[0].role, ChatRole::Assistant);

        let response = TurnResponse {
            new_messages: vec![ChatMessage::assistant("hello")],
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(
            encoded,
            json!({"newMessages": [{"role": "assistant", "content": "hello"}]})
        );
    }
}
