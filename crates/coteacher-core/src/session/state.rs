use crate::constants::{limits, models};
use crate::error::CoTeacherError;
use crate::llm::Message;
use crate::session::export::{self, ExportArtifact, ExportFormat};
use crate::session::subject::{ResponseStyle, Subject};
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A snapshot taken by [`SessionState::save`]. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub name: String,
    pub saved_at: NaiveDateTime,
    pub subject: Subject,
    pub messages: Vec<Message>,
}

/// Everything one interactive session knows. Lives as long as the session
/// and is handed to every handler explicitly.
#[derive(Debug, Clone)]
pub struct SessionState {
    messages: Vec<Message>,
    saved: BTreeMap<String, Conversation>,
    subject: Subject,
    style: ResponseStyle,
    model: String,
}

/// Local wall-clock time, the clock every session operation uses.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Name offered when the user saves without choosing one.
pub fn default_conversation_name(now: NaiveDateTime) -> String {
    format!("Conversation {}", now.format("%Y-%m-%d %H:%M"))
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            saved: BTreeMap::new(),
            subject: Subject::default(),
            style: ResponseStyle::default(),
            model: models::DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_style(mut self, style: ResponseStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    // ── Transcript ──────────────────────────────────────────────────────

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Drop everything appended after the transcript had `len` messages.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // ── Preferences ─────────────────────────────────────────────────────

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.subject = subject;
    }

    pub fn style(&self) -> ResponseStyle {
        self.style
    }

    pub fn set_style(&mut self, style: ResponseStyle) {
        self.style = style;
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    // ── Conversation management ─────────────────────────────────────────

    /// Snapshot the transcript under `name`, replacing any earlier save with that name.
    pub fn save(&mut self, name: &str) -> Result<&Conversation, CoTeacherError> {
        self.save_at(name, local_now())
    }

    pub fn save_at(
        &mut self,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<&Conversation, CoTeacherError> {
        if self.messages.is_empty() {
            return Err(CoTeacherError::EmptyConversation);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(CoTeacherError::InvalidInput(
                "conversation name cannot be empty".into(),
            ));
        }
        if name.chars().count() > limits::SAVED_NAME_MAX_CHARS {
            return Err(CoTeacherError::InvalidInput(format!(
                "conversation name is longer than {} characters",
                limits::SAVED_NAME_MAX_CHARS
            )));
        }

        let conversation = Conversation {
            name: name.to_string(),
            saved_at: now,
            subject: self.subject,
            messages: self.messages.clone(),
        };

        let replaced = self.saved.insert(name.to_string(), conversation).is_some();
        info!(name, messages = self.messages.len(), replaced, "saved conversation");

        Ok(&self.saved[name])
    }

    /// Restore the transcript and subject stored under `name`.
    pub fn load(&mut self, name: &str) -> Result<(), CoTeacherError> {
        let name = name.trim();
        let conversation = self
            .saved
            .get(name)
            .ok_or_else(|| CoTeacherError::NotFound(name.to_string()))?;

        self.messages = conversation.messages.clone();
        self.subject = conversation.subject;
        info!(name, messages = self.messages.len(), "loaded conversation");
        Ok(())
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportArtifact, CoTeacherError> {
        self.export_at(format, local_now())
    }

    pub fn export_at(
        &self,
        format: ExportFormat,
        now: NaiveDateTime,
    ) -> Result<ExportArtifact, CoTeacherError> {
        let artifact = export::render(&self.messages, format, now)?;
        debug!(filename = %artifact.filename, bytes = artifact.bytes.len(), "rendered export");
        Ok(artifact)
    }

    /// Empty the transcript. Saved conversations are untouched.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn saved(&self, name: &str) -> Option<&Conversation> {
        self.saved.get(name.trim())
    }

    /// Saved conversation names, most recently saved first.
    pub fn saved_names(&self) -> Vec<&str> {
        let mut conversations: Vec<&Conversation> = self.saved.values().collect();
        conversations.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.name.cmp(&b.name)));
        conversations.into_iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn chatted() -> SessionState {
        let mut state = SessionState::new().with_subject(Subject::Science);
        state.push_user("What is photosynthesis?");
        state.push_assistant("Plants turning light into sugar.");
        state
    }

    #[test]
    fn new_session_uses_defaults() {
        let state = SessionState::new();
        assert!(state.is_empty());
        assert_eq!(state.subject(), Subject::General);
        assert_eq!(state.style(), ResponseStyle::Balanced);
        assert_eq!(state.model(), "llama3.2:latest");
        assert!(state.saved_names().is_empty());
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut state = SessionState::new();
        for i in 0..5 {
            state.push_user(format!("m{i}"));
        }
        let tail: Vec<&str> = state.recent(2).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(state.recent(50).len(), 5);
    }

    #[test]
    fn save_requires_messages() {
        let mut state = SessionState::new();
        assert!(matches!(state.save("Empty"), Err(CoTeacherError::EmptyConversation)));
        assert!(state.saved_names().is_empty());
    }

    #[test]
    fn save_rejects_blank_name_without_storing() {
        let mut state = chatted();
        assert!(matches!(state.save("   "), Err(CoTeacherError::InvalidInput(_))));
        assert!(state.saved_names().is_empty());
    }

    #[test]
    fn saved_snapshot_is_independent_of_later_messages() {
        let mut state = chatted();
        state.save_at("Bio", at(0)).unwrap();
        state.push_user("And respiration?");

        assert_eq!(state.saved("Bio").unwrap().messages.len(), 2);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn load_unknown_name_is_not_found_and_changes_nothing() {
        let mut state = chatted();
        let before = state.messages().to_vec();

        assert!(matches!(state.load("missing"), Err(CoTeacherError::NotFound(n)) if n == "missing"));
        assert_eq!(state.messages(), before.as_slice());
        assert_eq!(state.subject(), Subject::Science);
    }

    #[test]
    fn padded_name_round_trips_through_save_and_load() {
        let mut state = chatted();
        state.save_at(" Unit 3 ", at(0)).unwrap();
        state.clear();

        state.load(" Unit 3 ").unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.saved_names(), vec!["Unit 3"]);
        assert!(state.saved(" Unit 3 ").is_some());
    }

    #[test]
    fn clear_keeps_saved_conversations() {
        let mut state = chatted();
        state.save_at("Keep", at(0)).unwrap();
        state.clear();

        assert!(state.is_empty());
        assert_eq!(state.saved_names(), vec!["Keep"]);
    }

    #[test]
    fn saved_names_are_most_recent_first() {
        let mut state = chatted();
        state.save_at("older", at(1)).unwrap();
        state.save_at("newer", at(5)).unwrap();
        state.save_at("middle", at(3)).unwrap();

        assert_eq!(state.saved_names(), vec!["newer", "middle", "older"]);
    }

    #[test]
    fn default_name_carries_the_timestamp() {
        assert_eq!(default_conversation_name(at(7)), "Conversation 2026-10-19 10:07");
    }
}
