use crate::constants::limits;
use crate::llm::Message;
use crate::session::{ResponseStyle, SessionState, Subject};

/// Builds the single composite prompt sent to the model: persona,
/// subject and style guidance, recent history and the teacher's query.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    context_messages: usize,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            persona: Self::default_persona(),
            context_messages: limits::CONTEXT_MESSAGES,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// How many trailing messages of history go into the prompt.
    pub fn with_context_messages(mut self, n: usize) -> Self {
        self.context_messages = n;
        self
    }

    pub fn context_messages(&self) -> usize {
        self.context_messages
    }

    pub fn build(&self, query: &str, state: &SessionState) -> String {
        let history = Self::context_block(state.recent(self.context_messages));
        let subject = Self::subject_guidance(state.subject()).unwrap_or_default();
        let style = Self::style_guidance(state.style()).unwrap_or_default();

        format!(
            "{persona}\n{subject}\n{style}\n\n\
             Previous conversation:\n{history}\n\n\
             Teacher's input: {query}\n\n\
             Now, please provide your response as a helpful teaching assistant.\n",
            persona = self.persona,
        )
    }

    /// `Role: content` lines, oldest first. Empty history gives an empty block.
    pub fn context_block(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn subject_guidance(subject: Subject) -> Option<String> {
        match subject {
            Subject::General => None,
            other => Some(format!(
                "Focus specifically on {} education and curriculum.",
                other.name()
            )),
        }
    }

    pub fn style_guidance(style: ResponseStyle) -> Option<&'static str> {
        match style {
            ResponseStyle::Concise => Some("Keep your responses very brief and to-the-point."),
            ResponseStyle::Balanced => None,
            ResponseStyle::Detailed => Some(
                "Provide comprehensive and detailed responses with examples when possible.",
            ),
        }
    }

    fn default_persona() -> String {
        "You are CoTeacher Assistant – a proactive, knowledgeable, and friendly helper \
        dedicated to supporting teachers with their day-to-day tasks and classroom management. \
        Your role is to provide clear, direct, and actionable answers to any questions that \
        teachers ask.\n\
        \n\
        Guidelines:\n\
        - Answer directly and concisely, but with enough detail to be helpful.\n\
        - If additional clarification is needed, ask targeted follow-up questions.\n\
        - When offering lesson plans, quizzes, training tips, timetables, or other assistance, \
        provide detailed, practical advice.\n\
        - Maintain a friendly, professional, and supportive tone.\n\
        - Format your responses with clear headings, bullet points, and organization when \
        appropriate."
            .to_string()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
