use coteacher_core::{
    Assistant, CoTeacherError, LlmClient, LlmResponse, Message, Role, SessionState, Settings,
    StreamEvent, Subject,
};
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// How the mock answers a streaming request.
#[derive(Clone)]
enum Script {
    /// Send these events, then close the channel.
    Events(Vec<StreamEvent>),
    /// Send one fragment, then hold the stream open until cancelled.
    HangAfter(String),
    /// Fail before any stream exists.
    Unreachable,
}

/// Mock model that replays a script and records what it was asked.
struct MockLlm {
    script: Script,
    models: Vec<String>,
    requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl MockLlm {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            models: vec!["llama3.2:latest".to_string(), "llama3:latest".to_string()],
            requests: Mutex::new(Vec::new()),
        })
    }

    fn replying(fragments: &[&str]) -> Arc<Self> {
        let mut events: Vec<StreamEvent> = fragments
            .iter()
            .map(|f| StreamEvent::TextDelta(f.to_string()))
            .collect();
        events.push(StreamEvent::Done);
        Self::new(Script::Events(events))
    }

    fn last_request(&self) -> (String, Vec<Message>) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, model: &str, messages: &[Message]) -> Result<LlmResponse, CoTeacherError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        match &self.script {
            Script::Events(events) => {
                let text: String = events
                    .iter()
                    .filter_map(|e| match e {
                        StreamEvent::TextDelta(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect();
                Ok(LlmResponse {
                    message: Message::assistant(text),
                    usage: None,
                })
            }
            _ => Err(CoTeacherError::model_unavailable("mock offline")),
        }
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<UnboundedReceiver<StreamEvent>, CoTeacherError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        let (tx, rx) = unbounded();
        match self.script.clone() {
            Script::Events(events) => {
                for event in events {
                    tx.unbounded_send(event).unwrap();
                }
            }
            Script::HangAfter(fragment) => {
                tokio::spawn(async move {
                    let _ = tx.unbounded_send(StreamEvent::TextDelta(fragment));
                    cancel.cancelled().await;
                });
            }
            Script::Unreachable => {
                return Err(CoTeacherError::model_unavailable("connection refused"));
            }
        }
        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, CoTeacherError> {
        Ok(self.models.clone())
    }
}

fn session_with_history() -> SessionState {
    let mut state = SessionState::new().with_subject(Subject::Science);
    state.push_user("What is a cell?");
    state.push_assistant("The basic unit of life.");
    state
}

#[tokio::test]
async fn test_send_records_query_and_reply() {
    let mock = MockLlm::replying(&["Mitochondria ", "make ", "energy."]);
    let assistant = Assistant::new(mock.clone());
    let mut state = session_with_history();

    let mut fragments = Vec::new();
    let reply = assistant
        .send(
            &mut state,
            "What do mitochondria do?",
            |f| fragments.push(f.to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(reply, "Mitochondria make energy.");
    assert_eq!(fragments, vec!["Mitochondria ", "make ", "energy."]);
    assert_eq!(state.len(), 4);
    assert_eq!(state.messages()[2], Message::user("What do mitochondria do?"));
    assert_eq!(state.messages()[3], Message::assistant("Mitochondria make energy."));
}

#[tokio::test]
async fn test_send_uses_session_model_and_single_user_prompt() {
    let mock = MockLlm::replying(&["ok"]);
    let assistant = Assistant::new(mock.clone());
    let mut state = session_with_history().with_model("llama3:latest");

    assistant
        .send(&mut state, "Next question", |_| {}, CancellationToken::new())
        .await
        .unwrap();

    let (model, messages) = mock.last_request();
    assert_eq!(model, "llama3:latest");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);

    let prompt = &messages[0].content;
    assert!(prompt.contains("Focus specifically on Science education and curriculum."));
    assert!(prompt.contains("User: What is a cell?\nAssistant: The basic unit of life.\nUser: Next question"));
    assert!(prompt.contains("Teacher's input: Next question"));
}

#[tokio::test]
async fn test_unreachable_model_leaves_conversation_unchanged() {
    let assistant = Assistant::new(MockLlm::new(Script::Unreachable));
    let mut state = session_with_history();
    let before = state.messages().to_vec();

    let result = assistant
        .send(&mut state, "Anyone there?", |_| {}, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(CoTeacherError::ModelUnavailable(_))));
    assert_eq!(state.messages(), before.as_slice());
}

#[tokio::test]
async fn test_mid_stream_error_discards_partial_reply() {
    let mock = MockLlm::new(Script::Events(vec![
        StreamEvent::TextDelta("Half an ans".into()),
        StreamEvent::Error("model crashed".into()),
    ]));
    let assistant = Assistant::new(mock);
    let mut state = session_with_history();
    let before = state.messages().to_vec();

    let mut rendered = String::new();
    let result = assistant
        .send(&mut state, "Go on", |f| rendered.push_str(f), CancellationToken::new())
        .await;

    match result {
        Err(CoTeacherError::ModelUnavailable(msg)) => assert_eq!(msg, "model crashed"),
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
    assert_eq!(rendered, "Half an ans");
    assert_eq!(state.messages(), before.as_slice());
}

#[tokio::test]
async fn test_cancelled_turn_is_rolled_back() {
    let assistant = Assistant::new(MockLlm::new(Script::HangAfter("Thinking".into())));
    let mut state = session_with_history();
    let before = state.messages().to_vec();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let result = assistant
        .send(&mut state, "Long answer please", move |_| trigger.cancel(), cancel)
        .await;

    assert!(matches!(result, Err(CoTeacherError::Cancelled)));
    assert_eq!(state.messages(), before.as_slice());
}

#[tokio::test]
async fn test_streamed_fragments_concatenate_to_blocking_reply() {
    let mock = MockLlm::replying(&["A ", "lesson ", "on ", "rivers", "."]);
    let assistant = Assistant::new(mock.clone());
    let state = SessionState::new();

    let stream = assistant
        .stream_reply(&state, "Plan a lesson", CancellationToken::new())
        .await
        .unwrap();
    let streamed: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

    let blocking = mock
        .chat(state.model(), &[Message::user("Plan a lesson")])
        .await
        .unwrap();

    assert_eq!(streamed.concat(), blocking.message.content);
    assert!(state.is_empty(), "stream_reply must not record anything");
}

#[tokio::test]
async fn test_dropping_reply_stream_keeps_caller_token_alive() {
    let assistant = Assistant::new(MockLlm::replying(&["x"]));
    let state = SessionState::new();
    let cancel = CancellationToken::new();

    let stream = assistant
        .stream_reply(&state, "q", cancel.clone())
        .await
        .unwrap();
    drop(stream);

    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_select_model_without_validation_accepts_anything() {
    let assistant = Assistant::new(MockLlm::replying(&[]));
    let mut state = SessionState::new();

    assistant.select_model(&mut state, "llama3.2-vision").await.unwrap();
    assert_eq!(state.model(), "llama3.2-vision");

    let result = assistant.select_model(&mut state, "  ").await;
    assert!(matches!(result, Err(CoTeacherError::InvalidInput(_))));
    assert_eq!(state.model(), "llama3.2-vision");
}

#[tokio::test]
async fn test_select_model_with_validation_checks_the_server() {
    let assistant = Assistant::new(MockLlm::replying(&[])).with_model_validation(true);
    let mut state = SessionState::new().with_model("llama3:latest");

    assistant.select_model(&mut state, "llama3.2").await.unwrap();
    assert_eq!(state.model(), "llama3.2");

    let result = assistant.select_model(&mut state, "mistral").await;
    assert!(matches!(result, Err(CoTeacherError::ModelUnavailable(_))));
    assert_eq!(state.model(), "llama3.2");
}

#[test]
fn test_from_settings_applies_context_window() {
    let mut settings = Settings::default();
    settings.session.context_messages = 4;

    let assistant = Assistant::from_settings(&settings).unwrap();
    assert_eq!(assistant.prompt_builder().context_messages(), 4);
}
