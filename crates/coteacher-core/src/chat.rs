use crate::config::Settings;
use crate::context::PromptBuilder;
use crate::error::CoTeacherError;
use crate::llm::{LlmClient, Message, OllamaClient, ReplyStream};
use crate::session::SessionState;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs chat turns for a session: prompt construction plus the model call.
///
/// Holds no conversation state of its own; every call takes the session
/// state it works on.
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    validate_models: bool,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            validate_models: false,
        }
    }

    /// An assistant talking to the Ollama server described in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, CoTeacherError> {
        let client = OllamaClient::new()
            .with_base_url(settings.llm.base_url.clone())
            .with_connect_timeout(Duration::from_secs(settings.llm.connect_timeout_secs))?;

        Ok(Self::new(Arc::new(client))
            .with_prompt_builder(
                PromptBuilder::new().with_context_messages(settings.session.context_messages),
            )
            .with_model_validation(settings.llm.validate_model))
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Check model names against the server when they are selected instead of
    /// waiting for the first request to fail.
    pub fn with_model_validation(mut self, enabled: bool) -> Self {
        self.validate_models = enabled;
        self
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn build_prompt(&self, query: &str, state: &SessionState) -> String {
        self.prompts.build(query, state)
    }

    /// Build the prompt for `query` and start streaming the reply.
    ///
    /// Does not touch `state`; the caller decides what to record.
    pub async fn stream_reply(
        &self,
        state: &SessionState,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<ReplyStream, CoTeacherError> {
        let prompt = self.build_prompt(query, state);
        debug!(model = state.model(), prompt_len = prompt.len(), "requesting reply");

        // Child token: dropping the stream stops this request without
        // cancelling the caller's token.
        let upstream = cancel.child_token();
        let events = self
            .llm
            .chat_stream(state.model(), &[Message::user(prompt)], upstream.clone())
            .await?;
        Ok(ReplyStream::new(events, upstream))
    }

    /// Run one full turn: record the query, stream the reply through
    /// `on_fragment`, and record the reply.
    ///
    /// The query is recorded before the prompt is built, so the history block
    /// ends with it. If the model fails or the turn is cancelled, the
    /// transcript is restored to what it was before the call and any partial
    /// reply is discarded.
    pub async fn send(
        &self,
        state: &mut SessionState,
        query: &str,
        on_fragment: impl FnMut(&str),
        cancel: CancellationToken,
    ) -> Result<String, CoTeacherError> {
        let checkpoint = state.len();
        state.push_user(query);

        let result = match self.stream_reply(state, query, cancel.clone()).await {
            Ok(stream) => stream.read_to_end(on_fragment).await,
            Err(e) => Err(e),
        };

        let result = match result {
            Ok(_) if cancel.is_cancelled() => Err(CoTeacherError::Cancelled),
            other => other,
        };

        match result {
            Ok(reply) => {
                info!(model = state.model(), reply_len = reply.len(), "reply complete");
                state.push_assistant(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "chat turn failed, rolling back");
                state.truncate(checkpoint);
                Err(e)
            }
        }
    }

    /// Switch the session's model.
    ///
    /// With validation enabled the server is asked first and an unknown
    /// model leaves the session unchanged.
    pub async fn select_model(
        &self,
        state: &mut SessionState,
        model: &str,
    ) -> Result<(), CoTeacherError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(CoTeacherError::InvalidInput("model name cannot be empty".into()));
        }

        if self.validate_models && !self.llm.model_exists(model).await? {
            return Err(CoTeacherError::model_unavailable(format!(
                "model '{model}' is not available on the server"
            )));
        }

        state.set_model(model);
        Ok(())
    }
}
