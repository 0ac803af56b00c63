use coteacher_core::llm::catalog::{find_model, model_options};
use coteacher_core::template::{builtin_templates, find_template, Template};
use coteacher_core::{ExportFormat, ResponseStyle, Subject};
use std::path::PathBuf;

/// Result of processing a slash command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Clear the current conversation.
    Clear,
    /// Quit the application.
    Quit,
    /// Save the conversation, under a generated name when none is given.
    Save(Option<String>),
    /// Load a saved conversation by name.
    Load(String),
    /// List saved conversations.
    ListSaved,
    /// Write the conversation to a file.
    Export {
        format: ExportFormat,
        directory: Option<PathBuf>,
    },
    SetSubject(Subject),
    SetStyle(ResponseStyle),
    /// Switch the model (already resolved from a catalog display name).
    SetModel(String),
    /// Ask the server which models it has.
    ListModels,
    /// Start filling in a template.
    UseTemplate(Template),
    /// Show subject, style, model and conversation size.
    ShowStatus,
    /// Change the color theme.
    ThemeChanged(String),
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let parts: Vec<&str> = input.trim().splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/clear" => CommandResult::Clear,
        "/status" => CommandResult::ShowStatus,

        // Conversation commands
        "/save" => {
            if arg.is_empty() {
                CommandResult::Save(None)
            } else {
                CommandResult::Save(Some(arg.to_string()))
            }
        }
        "/load" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /load <name>\nSee /saved for saved conversations.".into())
            } else {
                CommandResult::Load(arg.to_string())
            }
        }
        "/saved" | "/conversations" => CommandResult::ListSaved,
        "/export" => parse_export(arg),

        // Teaching preferences
        "/subject" => {
            if arg.is_empty() {
                let subjects: Vec<&str> = Subject::ALL.iter().map(|s| s.name()).collect();
                CommandResult::Message(format!(
                    "Subjects: {}\nUsage: /subject <name>",
                    subjects.join(", ")
                ))
            } else {
                match arg.parse::<Subject>() {
                    Ok(subject) => CommandResult::SetSubject(subject),
                    Err(e) => CommandResult::Message(e.to_string()),
                }
            }
        }
        "/style" => {
            if arg.is_empty() {
                let styles: Vec<&str> = ResponseStyle::ALL.iter().map(|s| s.name()).collect();
                CommandResult::Message(format!(
                    "Response styles: {}\nUsage: /style <name>",
                    styles.join(", ")
                ))
            } else {
                match arg.parse::<ResponseStyle>() {
                    Ok(style) => CommandResult::SetStyle(style),
                    Err(e) => CommandResult::Message(e.to_string()),
                }
            }
        }

        // Model commands
        "/model" => {
            if arg.is_empty() {
                let mut text = String::from("Suggested models:\n");
                for option in model_options() {
                    text.push_str(&format!("  {:<20} {}\n", option.id, option.display_name));
                }
                text.push_str("Usage: /model <name>  (see /models for what the server has)");
                CommandResult::Message(text)
            } else {
                let model = find_model(arg)
                    .map(|option| option.id.to_string())
                    .unwrap_or_else(|| arg.to_string());
                CommandResult::SetModel(model)
            }
        }
        "/models" => CommandResult::ListModels,

        // Templates
        "/templates" => list_templates(),
        "/template" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /template <number|name>\nSee /templates for the list.".into())
            } else {
                match find_template(arg) {
                    Some(template) => CommandResult::UseTemplate(template),
                    None => CommandResult::Message(format!(
                        "No template matches '{arg}'. See /templates for the list."
                    )),
                }
            }
        }

        "/theme" => {
            if arg.is_empty() {
                let themes = crate::theme::Theme::all_names().join(", ");
                CommandResult::Message(format!("Available themes: {themes}\nUsage: /theme <theme-name>"))
            } else {
                CommandResult::ThemeChanged(arg.to_string())
            }
        }
        "/version" => CommandResult::Message(format!("CoTeacher v{}", env!("CARGO_PKG_VERSION"))),

        // Unknown command
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn parse_export(arg: &str) -> CommandResult {
    let usage = "Usage: /export <text|json|html> [directory]";
    if arg.is_empty() {
        return CommandResult::Message(usage.into());
    }

    let mut parts = arg.splitn(2, ' ');
    let format = parts.next().unwrap_or_default();
    let directory = parts
        .next()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from);

    match format.parse::<ExportFormat>() {
        Ok(format) => CommandResult::Export { format, directory },
        Err(e) => CommandResult::Message(format!("{e}\n{usage}")),
    }
}

fn list_templates() -> CommandResult {
    let mut text = String::from("Quick templates:\n");
    for (i, template) in builtin_templates().iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", i + 1, template.name()));
        text.push_str(&format!("     {}\n", template.pattern()));
    }
    text.push_str("Usage: /template <number|name>");
    CommandResult::Message(text)
}

fn show_help() -> CommandResult {
    let help_text = "\
╭─ CoTeacher Commands ───────────────────────────────────────────╮

  CONVERSATION
    /save [name]              Save the conversation (default: dated name)
    /load <name>              Replace the conversation with a saved one
    /saved                    List saved conversations
    /export <fmt> [dir]       Export as text, json or html
    /clear                    Clear the conversation

  TEACHING
    /subject [name]           Show or set the subject focus
    /style [name]             Show or set the response style
    /templates                List quick templates
    /template <n|name>        Fill in a template and send it

  MODEL
    /model [name]             Show suggestions or switch model
    /models                   List models installed on the server

  OTHER
    /status                   Show subject, style, model and size
    /theme <name>             Change color theme
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit the application

  Esc or Ctrl+C cancels a reply in progress.

╰────────────────────────────────────────────────────────────────╯";

    CommandResult::Message(help_text.into())
}
