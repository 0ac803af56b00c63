mod state;
mod subject;
pub mod export;

pub use state::{default_conversation_name, local_now, Conversation, SessionState};
pub use subject::{ResponseStyle, Subject};
pub use export::{ExportArtifact, ExportFormat};
