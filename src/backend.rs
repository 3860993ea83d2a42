use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::conversation::{Message, Role};
use crate::error::GuideError;

/// Anything that can turn a conversation into one block of text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, conversation: &[Message]) -> Result<String, GuideError>;
}

const ERROR_BODY_LIMIT: usize = 400;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct HttpTransport {
    client: Client,
    label: String,
    base_url: String,
    headers: Vec<(&'static str, String)>,
}

impl HttpTransport {
    fn new(
        label: &str,
        base_url: &str,
        headers: Vec<(&'static str, String)>,
    ) -> Result<Self, GuideError> {
        let client = Client::builder()
            .user_agent(concat!("cmdguide/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                GuideError::backend(label, format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            label: label.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GuideError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();
        let mut request = self.client.post(&url).json(body);
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|err| {
            GuideError::backend(&self.label, format!("request to {url} failed: {err}"))
        })?;
        let status = response.status();
        tracing::debug!(
            backend = %self.label,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend responded"
        );

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GuideError::backend(
                &self.label,
                format!("HTTP {}: {}", status, truncate(text.trim(), ERROR_BODY_LIMIT)),
            ));
        }

        response.json::<T>().await.map_err(|err| {
            GuideError::backend(&self.label, format!("unreadable response body: {err}"))
        })
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut = text.chars().take(limit).collect::<String>();
    format!("{cut}... truncated")
}

fn bearer_headers(api_key: Option<String>) -> Vec<(&'static str, String)> {
    api_key
        .filter(|key| !key.trim().is_empty())
        .map(|key| vec![("authorization", format!("Bearer {key}"))])
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions (OpenAI, DeepSeek, Groq, Gemini compat)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsBackend {
    transport: HttpTransport,
    model: String,
    max_tokens: Option<u32>,
}

impl ChatCompletionsBackend {
    pub fn new(
        label: &str,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        max_tokens: Option<u32>,
    ) -> Result<Self, GuideError> {
        Ok(Self {
            transport: HttpTransport::new(label, base_url, bearer_headers(api_key))?,
            model: model.to_string(),
            max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        &self.transport.label
    }

    async fn generate(&self, conversation: &[Message]) -> Result<String, GuideError> {
        let request = ChatRequest {
            model: &self.model,
            messages: conversation,
            max_tokens: self.max_tokens,
        };
        let response: ChatResponse = self
            .transport
            .post_json("/chat/completions", &request)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GuideError::backend(self.name(), "no choices in response"))
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible legacy completions (fine-tuned completion models)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

pub struct CompletionPromptBackend {
    transport: HttpTransport,
    model: String,
    max_tokens: Option<u32>,
}

impl CompletionPromptBackend {
    pub fn new(
        label: &str,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        max_tokens: Option<u32>,
    ) -> Result<Self, GuideError> {
        Ok(Self {
            transport: HttpTransport::new(label, base_url, bearer_headers(api_key))?,
            model: model.to_string(),
            max_tokens,
        })
    }
}

/// Flattens a conversation into a single prompt for completion-style models.
pub fn flatten_conversation(conversation: &[Message]) -> String {
    let mut prompt = conversation
        .iter()
        .map(|message| {
            format!(
                "{}: {}",
                message.role.as_str().to_uppercase(),
                message.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    prompt.push_str("\n\nCOMMANDS:\n");
    prompt
}

#[async_trait]
impl CompletionBackend for CompletionPromptBackend {
    fn name(&self) -> &str {
        &self.transport.label
    }

    async fn generate(&self, conversation: &[Message]) -> Result<String, GuideError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt: flatten_conversation(conversation),
            max_tokens: self.max_tokens,
        };
        let response: CompletionResponse =
            self.transport.post_json("/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.text)
            .ok_or_else(|| GuideError::backend(self.name(), "no choices in response"))
    }
}

// ---------------------------------------------------------------------------
// Anthropic messages API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicBackend {
    transport: HttpTransport,
    model: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        max_tokens: Option<u32>,
    ) -> Result<Self, GuideError> {
        let headers = vec![
            ("x-api-key", api_key),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        Ok(Self {
            transport: HttpTransport::new("anthropic", base_url, headers)?,
            model: model.to_string(),
            max_tokens: max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
        })
    }
}

/// Splits a conversation into Anthropic's `system` string and alternating messages.
///
/// Leading system messages form the system prompt. Replayed responses become
/// assistant turns, and a system message after the final user turn is folded
/// into that user turn because the API rejects a trailing assistant turn.
pub fn anthropic_payload(conversation: &[Message]) -> (String, Vec<AnthropicMessage>) {
    let leading = conversation
        .iter()
        .take_while(|message| message.role == Role::System)
        .count();
    let system = conversation[..leading]
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let rest = &conversation[leading..];
    let last_user = rest.iter().rposition(|message| message.role == Role::User);

    let mut messages: Vec<AnthropicMessage> = Vec::new();
    for (idx, message) in rest.iter().enumerate() {
        let role = match (message.role, last_user) {
            (Role::User, _) => "user",
            (Role::System, Some(last)) if idx > last => "user",
            (Role::System, _) => "assistant",
        };
        match messages.last_mut() {
            Some(previous) if previous.role == role => {
                previous.content.push_str("\n\n");
                previous.content.push_str(&message.content);
            }
            _ => messages.push(AnthropicMessage {
                role,
                content: message.content.clone(),
            }),
        }
    }

    (system, messages)
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.transport.label
    }

    async fn generate(&self, conversation: &[Message]) -> Result<String, GuideError> {
        let (system, messages) = anthropic_payload(conversation);
        let request = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
        });
        let response: AnthropicResponse = self.transport.post_json("/v1/messages", &request).await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(GuideError::backend(self.name(), "no text blocks in response"));
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Ollama local models
// ---------------------------------------------------------------------------

pub struct OllamaBackend {
    transport: HttpTransport,
    model: String,
    max_tokens: Option<u32>,
}

impl OllamaBackend {
    pub fn new(host: &str, model: &str, max_tokens: Option<u32>) -> Result<Self, GuideError> {
        Ok(Self {
            transport: HttpTransport::new("ollama", host, Vec::new())?,
            model: model.to_string(),
            max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.transport.label
    }

    async fn generate(&self, conversation: &[Message]) -> Result<String, GuideError> {
        let mut request = json!({
            "model": self.model,
            "messages": conversation,
            "stream": false,
        });
        if let Some(max_tokens) = self.max_tokens {
            request["options"] = json!({ "num_predict": max_tokens });
        }

        let response: Value = self.transport.post_json("/api/chat", &request).await?;
        response["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GuideError::backend(self.name(), "response has no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_conversation() -> Vec<Message> {
        vec![
            Message::system("persona"),
            Message::system("System information context: linux"),
            Message::user("find big files"),
            Message::system("du -ah . | sort -rh | head"),
            Message::user("only in /var"),
            Message::system("commands only"),
        ]
    }

    #[tokio::test]
    async fn chat_backend_posts_conversation_and_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "system", "content": "persona"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "du -sh /var/*"}}]
            })))
            .mount(&server)
            .await;

        let backend = ChatCompletionsBackend::new(
            "openai",
            &server.uri(),
            Some("test-key".to_string()),
            "gpt-4o-mini",
            None,
        )
        .expect("backend should build");
        let text = backend
            .generate(&sample_conversation()[..1])
            .await
            .expect("generate should succeed");
        assert_eq!(text, "du -sh /var/*");
    }

    #[tokio::test]
    async fn chat_backend_maps_http_errors_to_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let backend =
            ChatCompletionsBackend::new("openai", &server.uri(), None, "gpt-4o-mini", None)
                .expect("backend should build");
        let err = backend
            .generate(&sample_conversation())
            .await
            .expect_err("401 should fail");
        match err {
            GuideError::Backend { backend, message } => {
                assert_eq!(backend, "openai");
                assert!(message.contains("401"));
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_backend_rejects_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let backend = ChatCompletionsBackend::new("groq", &server.uri(), None, "llama", None)
            .expect("backend should build");
        assert!(matches!(
            backend.generate(&sample_conversation()).await,
            Err(GuideError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn completion_backend_sends_flattened_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .and(body_partial_json(json!({"model": "ft-model", "max_tokens": 75})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"text": " ls -la\n"}]
            })))
            .mount(&server)
            .await;

        let backend =
            CompletionPromptBackend::new("openai", &server.uri(), None, "ft-model", Some(75))
                .expect("backend should build");
        let text = backend
            .generate(&sample_conversation())
            .await
            .expect("generate should succeed");
        assert_eq!(text, " ls -la\n");
    }

    #[tokio::test]
    async fn ollama_backend_reads_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": false, "model": "llama3.2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "ss -tulpn"}
            })))
            .mount(&server)
            .await;

        let backend =
            OllamaBackend::new(&server.uri(), "llama3.2", None).expect("backend should build");
        let text = backend
            .generate(&sample_conversation())
            .await
            .expect("generate should succeed");
        assert_eq!(text, "ss -tulpn");
    }

    #[tokio::test]
    async fn anthropic_backend_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "anthropic-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "journalctl -u docker"}]
            })))
            .mount(&server)
            .await;

        let backend = AnthropicBackend::new(
            &server.uri(),
            "anthropic-key".to_string(),
            "claude-sonnet-4-20250514",
            None,
        )
        .expect("backend should build");
        let text = backend
            .generate(&sample_conversation())
            .await
            .expect("generate should succeed");
        assert_eq!(text, "journalctl -u docker");
    }

    #[test]
    fn anthropic_payload_hoists_system_and_alternates_roles() {
        let (system, messages) = anthropic_payload(&sample_conversation());
        assert_eq!(system, "persona\n\nSystem information context: linux");
        let roles = messages.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(messages[1].content, "du -ah . | sort -rh | head");
        assert_eq!(messages[2].content, "only in /var\n\ncommands only");
    }

    #[test]
    fn flattened_prompt_keeps_order_and_ends_with_cue() {
        let prompt =
            flatten_conversation(&[Message::system("be terse"), Message::user("list ports")]);
        assert_eq!(prompt, "SYSTEM: be terse\n\nUSER: list ports\n\nCOMMANDS:\n");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let cut = truncate(&body, 10);
        assert_eq!(cut, "xxxxxxxxxx... truncated");
    }
}
