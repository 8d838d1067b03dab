use super::{Backend, ChatRequest, ChunkStream, Completion, CompletionChunk, ToolCallDelta};
use crate::error::LlmError;
use crate::metrics::Usage;
use crate::types::{Message, Role, ToolCall};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Duration;
use tracing::debug;

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Where chat completion requests are sent and how they authenticate.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// OpenAI or any API speaking its chat completions dialect.
    OpenAi { base_url: String, api_key: String },
    Azure {
        endpoint: String,
        api_key: String,
        api_version: String,
        deployment: String,
    },
}

impl Endpoint {
    pub fn chat_url(&self) -> String {
        match self {
            Endpoint::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                endpoint,
                api_version,
                deployment,
                ..
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Endpoint::OpenAi { api_key, .. } => req.bearer_auth(api_key),
            Endpoint::Azure { api_key, .. } => req.header("api-key", api_key),
        }
    }
}

/// Chat completions backend for OpenAI-compatible and Azure OpenAI APIs.
#[derive(Clone)]
pub struct OpenAiChat {
    endpoint: Endpoint,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    http: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(60))
    }

    pub fn with_timeout(endpoint: Endpoint, model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            http,
        })
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "stream": stream,
        });
        if let Some(tools) = &request.tools {
            body["tools"] = json!(tools);
        }
        if let Some(choice) = &request.tool_choice {
            body["tool_choice"] = json!(choice);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = self.max_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let url = self.endpoint.chat_url();
        debug!(url = %url, "POST chat completion");
        let resp = self.endpoint.authorize(self.http.post(url)).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Backend for OpenAiChat {
    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        let resp = self.send(&self.body(request, false)).await?;
        let response_json: Value = resp.json().await?;
        parse_completion(&response_json)
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        let resp = self.send(&self.body(request, true)).await?;
        Ok(Box::pin(sse_chunks(resp)))
    }
}

fn wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });
    if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
        wire["tool_calls"] = json!(calls);
    }
    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            wire["tool_call_id"] = json!(id);
        }
    }
    wire
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .map(str::to_string)
                .or_else(|| v["error"].as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

#[derive(Deserialize)]
struct WireAssistant {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

pub(crate) fn parse_completion(response_json: &Value) -> Result<Completion, LlmError> {
    if let Some(error) = response_json.get("error") {
        return Err(LlmError::Api {
            status: 200,
            message: error_message(&error.to_string()),
        });
    }

    let message = response_json["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .map(|choice| &choice["message"])
        .ok_or_else(|| LlmError::Decode("No choices in response".to_string()))?;

    let wire: WireAssistant = serde_json::from_value(message.clone())?;
    let message = match wire.tool_calls.filter(|calls| !calls.is_empty()) {
        Some(calls) => Message::assistant_tool_calls(wire.content, calls),
        None => Message::assistant(wire.content.unwrap_or_default()),
    };
    let usage = response_json
        .get("usage")
        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());
    Ok(Completion { message, usage })
}

enum SseEvent {
    Chunk(CompletionChunk),
    Done,
    Skip,
}

fn sse_chunks(resp: reqwest::Response) -> impl Stream<Item = Result<CompletionChunk, LlmError>> + Send + 'static {
    let mut bytes = resp.bytes_stream();
    async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        'read: while let Some(next) = bytes.next().await {
            buffer.extend_from_slice(&next.map_err(LlmError::from)?);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(String::from_utf8_lossy(&line).trim())? {
                    SseEvent::Chunk(chunk) => {
                        yield chunk;
                    }
                    SseEvent::Done => break 'read,
                    SseEvent::Skip => {}
                }
            }
        }
    }
}

fn parse_sse_line(line: &str) -> Result<SseEvent, LlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    let event: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Skipping malformed stream chunk");
            return Ok(SseEvent::Skip);
        }
    };
    parse_stream_event(&event).map(SseEvent::Chunk)
}

pub(crate) fn parse_stream_event(event: &Value) -> Result<CompletionChunk, LlmError> {
    if let Some(error) = event.get("error") {
        return Err(LlmError::Backend(error_message(&error.to_string())));
    }
    let delta = &event["choices"][0]["delta"];
    let tool_calls = delta["tool_calls"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(pos, tc)| ToolCallDelta {
                    index: tc["index"].as_u64().map_or(pos, |i| i as usize),
                    id: tc["id"].as_str().map(str::to_string),
                    name: tc["function"]["name"].as_str().map(str::to_string),
                    arguments: tc["function"]["arguments"].as_str().map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CompletionChunk {
        content: delta["content"].as_str().map(str::to_string),
        tool_calls,
        usage: event
            .get("usage")
            .filter(|u| !u.is_null())
            .and_then(|u| serde_json::from_value(u.clone()).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_url_uses_deployment_and_version() {
        let endpoint = Endpoint::Azure {
            endpoint: "https://example.openai.azure.com/".into(),
            api_key: "k".into(),
            api_version: "2024-02-15-preview".into(),
            deployment: "gpt-4o".into(),
        };
        assert_eq!(
            endpoint.chat_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn tool_messages_keep_their_call_id_on_the_wire() {
        let wire = wire_message(&Message::tool("call_9", "add", "5", None));
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_9");
        assert!(wire.get("tool_call_name").is_none());
        assert!(wire.get("metrics").is_none());
    }

    #[test]
    fn completion_with_tool_calls_is_parsed() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "add", "arguments": "{\"first_int\":2,\"second_int\":3}"}
                }]
            }}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        });
        let completion = parse_completion(&body).unwrap();
        let calls = completion.message.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "add");
        assert_eq!(completion.usage.unwrap().total_tokens, 19);
    }

    #[test]
    fn empty_choices_is_a_decode_error() {
        let err = parse_completion(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
    }

    #[test]
    fn sse_lines_are_classified() {
        assert!(matches!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done));
        assert!(matches!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Skip));
        assert!(matches!(parse_sse_line("data: {not json").unwrap(), SseEvent::Skip));
        match parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap() {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.content.as_deref(), Some("Hi")),
            _ => panic!("expected a chunk"),
        }
    }
}
