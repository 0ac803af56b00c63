pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod config;
pub mod session;
pub mod template;
pub mod chat;

// Re-export key types
pub use error::CoTeacherError;
pub use llm::{LlmClient, LlmResponse, Message, OllamaClient, ReplyStream, Role, StreamEvent};
pub use context::PromptBuilder;
pub use config::Settings;
pub use session::{Conversation, ExportArtifact, ExportFormat, ResponseStyle, SessionState, Subject};
pub use template::Template;
pub use chat::Assistant;
