use crate::constants::export as consts;
use crate::error::CoTeacherError;
use crate::llm::{Message, Role};
use chrono::NaiveDateTime;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Html,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Text, Self::Json, Self::Html];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "Text",
            Self::Json => "JSON",
            Self::Html => "HTML",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = CoTeacherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" | "htm" => Ok(Self::Html),
            other => Err(CoTeacherError::InvalidInput(format!(
                "unknown export format: {other} (expected text, json or html)"
            ))),
        }
    }
}

/// A rendered export, ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Write the artifact into `dir` and return the full path.
    ///
    /// Goes through a temporary file and a rename so a reader never sees a
    /// half-written export.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, CoTeacherError> {
        fs::create_dir_all(dir)?;

        let path = dir.join(&self.filename);
        let tmp_path = path.with_extension(format!("{}.tmp", self.format.extension()));
        fs::write(&tmp_path, &self.bytes)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(path)
    }
}

/// `conversation_YYYYMMDD_HHMM.<ext>`
pub fn export_filename(format: ExportFormat, now: NaiveDateTime) -> String {
    format!(
        "{}{}.{}",
        consts::FILENAME_PREFIX,
        now.format(consts::FILENAME_TIME_FORMAT),
        format.extension()
    )
}

/// Render `messages` in `format`. Fails with `EmptyConversation` when there is nothing to export.
pub fn render(
    messages: &[Message],
    format: ExportFormat,
    now: NaiveDateTime,
) -> Result<ExportArtifact, CoTeacherError> {
    if messages.is_empty() {
        return Err(CoTeacherError::EmptyConversation);
    }

    let content = match format {
        ExportFormat::Text => render_text(messages),
        ExportFormat::Json => serde_json::to_string_pretty(messages)?,
        ExportFormat::Html => render_html(messages, now),
    };

    Ok(ExportArtifact {
        filename: export_filename(format, now),
        format,
        bytes: content.into_bytes(),
    })
}

fn render_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

const HTML_STYLE: &str = "\
        body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; line-height: 1.6; }
        .user { background-color: #e6f7ff; padding: 10px; border-radius: 8px; margin: 10px 0; }
        .assistant { background-color: #f0f5f9; padding: 10px; border-radius: 8px; margin: 10px 0; }
        h1 { color: #2c3e50; }
        .meta { color: #7f8c8d; font-size: 0.9em; }
";

fn render_html(messages: &[Message], now: NaiveDateTime) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&format!("    <title>{}</title>\n", consts::DOCUMENT_TITLE));
    html.push_str("    <meta charset=\"utf-8\">\n    <style>\n");
    html.push_str(HTML_STYLE);
    html.push_str("    </style>\n</head>\n<body>\n");
    html.push_str(&format!("    <h1>{}</h1>\n", consts::DOCUMENT_TITLE));
    html.push_str(&format!(
        "    <p class=\"meta\">Exported on: {}</p>\n",
        now.format(consts::EXPORTED_ON_FORMAT)
    ));
    html.push_str("    <div class=\"conversation\">\n");

    for message in messages {
        let class = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        html.push_str(&format!(
            "        <div class=\"{class}\">\n            <strong>{}:</strong>\n            <p>{}</p>\n        </div>\n",
            message.role.label(),
            escape_html(&message.content).replace('\n', "<br>")
        ));
    }

    html.push_str("    </div>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
