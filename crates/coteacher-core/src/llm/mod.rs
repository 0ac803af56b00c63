mod traits;
mod ollama;
mod stream;
pub mod catalog;

pub use traits::*;
pub use ollama::OllamaClient;
pub use stream::ReplyStream;
pub use catalog::{find_model, model_options, ModelOption};
