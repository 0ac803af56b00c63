use crate::constants::endpoints;
use crate::error::CoTeacherError;
use crate::llm::traits::*;
use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Client for a local Ollama server speaking the `/api/chat` protocol.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// One line of a chat response. Streaming replies send many, the blocking
/// endpoint sends exactly one.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoints::OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, CoTeacherError> {
        self.client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_chat(
        &self,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, CoTeacherError> {
        let request = ChatRequest {
            model,
            messages,
            stream,
        };

        debug!(model, stream, messages = messages.len(), "sending Ollama chat request");

        let response = self
            .client
            .post(self.url(endpoints::OLLAMA_CHAT_PATH))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CoTeacherError::model_unavailable(format!(
                    "Ollama is not reachable at {}: {e}",
                    self.base_url
                ))
            })?;

        check_status(response).await
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a non-success status into `ModelUnavailable`, keeping Ollama's error text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CoTeacherError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ChatChunk>(&text)
        .ok()
        .and_then(|chunk| chunk.error)
        .unwrap_or(text);

    warn!(%status, %detail, "Ollama request failed");
    Err(CoTeacherError::model_unavailable(format!(
        "Ollama returned {status}: {detail}"
    )))
}

/// Splits a byte stream into complete newline-terminated lines.
///
/// Bytes are buffered until a newline arrives so that lines and multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Map one NDJSON line onto stream events.
pub(crate) fn parse_line(line: &str) -> Vec<StreamEvent> {
    let chunk: ChatChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => return vec![StreamEvent::Error(format!("malformed stream chunk: {e}"))],
    };

    if let Some(error) = chunk.error {
        return vec![StreamEvent::Error(error)];
    }

    let mut events = Vec::new();
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            events.push(StreamEvent::TextDelta(message.content));
        }
    }
    if chunk.done {
        events.push(StreamEvent::Done);
    }
    events
}

/// Forward the events of one line. Returns true once the stream is finished
/// or nobody is listening any more.
fn forward_line(tx: &mpsc::UnboundedSender<StreamEvent>, line: &str) -> bool {
    for event in parse_line(line) {
        let terminal = matches!(event, StreamEvent::Done | StreamEvent::Error(_));
        if tx.unbounded_send(event).is_err() || terminal {
            return true;
        }
    }
    false
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, model: &str, messages: &[Message]) -> Result<LlmResponse, CoTeacherError> {
        let response = self.post_chat(model, messages, false).await?;
        let chunk: ChatChunk = response.json().await.map_err(|e| {
            CoTeacherError::model_unavailable(format!("Unreadable Ollama reply: {e}"))
        })?;

        if let Some(error) = chunk.error {
            return Err(CoTeacherError::ModelUnavailable(error));
        }

        let content = chunk.message.map(|m| m.content).unwrap_or_default();
        let usage = match (chunk.prompt_eval_count, chunk.eval_count) {
            (Some(input), Some(output)) => Some(Usage {
                input_tokens: input,
                output_tokens: output,
            }),
            _ => None,
        };

        Ok(LlmResponse {
            message: Message::assistant(content),
            usage,
        })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, CoTeacherError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoTeacherError::Cancelled),
            response = self.post_chat(model, messages, true) => response?,
        };

        let (tx, rx) = mpsc::unbounded();
        let mut body = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = NdjsonDecoder::default();

            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("reply stream cancelled, dropping upstream body");
                        return;
                    }
                    chunk = body.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => {
                        for line in decoder.push(&bytes) {
                            if forward_line(&tx, &line) {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.unbounded_send(StreamEvent::Error(e.to_string()));
                        return;
                    }
                    None => break,
                }
            }

            if let Some(line) = decoder.finish() {
                if forward_line(&tx, &line) {
                    return;
                }
            }

            let _ = tx.unbounded_send(StreamEvent::Done);
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, CoTeacherError> {
        let response = self
            .client
            .get(self.url(endpoints::OLLAMA_TAGS_PATH))
            .send()
            .await
            .map_err(|e| {
                CoTeacherError::model_unavailable(format!(
                    "Ollama is not reachable at {}: {e}",
                    self.base_url
                ))
            })?;

        let tags: TagsResponse = check_status(response).await?.json().await.map_err(|e| {
            CoTeacherError::model_unavailable(format!("Unreadable Ollama model list: {e}"))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_joins_lines_split_across_chunks() {
        let mut decoder = NdjsonDecoder::default();

        assert!(decoder.push(b"{\"message\":{\"content\":\"Hel").is_empty());
        let lines = decoder.push(b"lo\"}}\n{\"done\":true}\n");

        assert_eq!(
            lines,
            vec![
                "{\"message\":{\"content\":\"Hello\"}}".to_string(),
                "{\"done\":true}".to_string(),
            ]
        );
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn decoder_keeps_multibyte_characters_intact() {
        let mut decoder = NdjsonDecoder::default();
        let text = "{\"message\":{\"content\":\"élève\"}}\n".as_bytes();

        // Split in the middle of the two-byte 'é'.
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        let lines = decoder.push(&text[split..]);

        assert_eq!(parse_line(&lines[0]), vec![StreamEvent::TextDelta("élève".into())]);
    }

    #[test]
    fn decoder_returns_unterminated_tail_on_finish() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(b"  \n{\"done\":true}").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("{\"done\":true}"));
    }

    #[test]
    fn parse_line_skips_empty_content() {
        let events = parse_line(r#"{"message":{"role":"assistant","content":""},"done":false}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn parse_line_emits_delta_then_done_for_final_chunk() {
        let events = parse_line(r#"{"message":{"role":"assistant","content":"!"},"done":true}"#);
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta("!".into()), StreamEvent::Done]
        );
    }

    #[test]
    fn parse_line_reports_server_errors() {
        let events = parse_line(r#"{"error":"model 'nope' not found"}"#);
        assert_eq!(events, vec![StreamEvent::Error("model 'nope' not found".into())]);
    }

    #[test]
    fn parse_line_reports_malformed_json() {
        let events = parse_line("not json");
        assert!(matches!(events.as_slice(), [StreamEvent::Error(msg)] if msg.contains("malformed")));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OllamaClient::new().with_base_url("http://127.0.0.1:9999/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9999");
        assert_eq!(client.url("/api/chat"), "http://127.0.0.1:9999/api/chat");
    }
}
