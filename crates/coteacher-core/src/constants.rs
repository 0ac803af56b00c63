/// CoTeacher centralized constants.
/// Model names, endpoints, limits and paths live here.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const LLAMA_3_2: &str = "llama3.2:latest";
    pub const LLAMA_3: &str = "llama3:latest";
    pub const LLAMA_3_2_VISION: &str = "llama3.2-vision";

    /// Selectable models as (identifier, display name), default first.
    pub const CATALOG: &[(&str, &str)] = &[
        (LLAMA_3_2, "Llama 3.2 (Recommended)"),
        (LLAMA_3, "Llama 3"),
        (LLAMA_3_2_VISION, "llama3.2-vision"),
    ];

    pub const DEFAULT_MODEL: &str = LLAMA_3_2;
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
    pub const OLLAMA_CHAT_PATH: &str = "/api/chat";
    pub const OLLAMA_TAGS_PATH: &str = "/api/tags";
}

// ─── Session Limits ───────────────────────────────────────────────────────────

pub mod limits {
    /// Messages of history embedded in each prompt.
    pub const CONTEXT_MESSAGES: usize = 10;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const SAVED_NAME_MAX_CHARS: usize = 120;
}

// ─── Export ───────────────────────────────────────────────────────────────────

pub mod export {
    pub const FILENAME_PREFIX: &str = "conversation_";
    pub const FILENAME_TIME_FORMAT: &str = "%Y%m%d_%H%M";
    pub const EXPORTED_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    pub const DOCUMENT_TITLE: &str = "Co-Teacher Assistant Conversation";
}

// ─── Config Paths ─────────────────────────────────────────────────────────────

pub mod paths {
    pub const CONFIG_DIR: &str = "coteacher";
    pub const CONFIG_FILE: &str = "config.toml";
}
