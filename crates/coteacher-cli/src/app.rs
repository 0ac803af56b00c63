use anyhow::Result;
use coteacher_core::session::{default_conversation_name, local_now};
use coteacher_core::template::field_label;
use coteacher_core::{
    Assistant, CoTeacherError, ExportFormat, Role, SessionState, Settings, Template,
};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Terminal,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{self, CommandResult};
use crate::theme::Theme;

// ── Single-prompt mode ──────────────────────────────────────────────────

pub async fn run_single_prompt(settings: &Settings, prompt: &str) -> Result<()> {
    let assistant = Assistant::from_settings(settings)?;
    let mut session = settings.new_session();

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = assistant
        .send(
            &mut session,
            prompt,
            |fragment| {
                print!("{fragment}");
                let _ = io::stdout().flush();
            },
            cancel,
        )
        .await;
    ctrl_c.abort();
    println!();

    match result {
        Ok(_) => Ok(()),
        Err(CoTeacherError::Cancelled) => {
            eprintln!("Cancelled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// ── Interactive TUI ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    User,
    Assistant,
    Notice,
    Warning,
}

#[derive(Debug, Clone)]
struct ChatItem {
    kind: ItemKind,
    content: String,
}

/// Results sent back to the UI loop by background tasks.
///
/// Tasks that need the session take it out of `AppState` and hand it back
/// here when they finish.
enum WorkerEvent {
    Fragment(String),
    TurnFinished {
        session: SessionState,
        query: String,
        result: Result<String, CoTeacherError>,
    },
    ModelSelected {
        session: SessionState,
        model: String,
        result: Result<(), CoTeacherError>,
    },
    Models(Result<Vec<String>, CoTeacherError>),
    Health(Result<(), CoTeacherError>),
}

/// A template whose fields are being asked for one at a time.
struct TemplateFill {
    template: Template,
    fields: Vec<String>,
    values: HashMap<String, String>,
    current: usize,
}

impl TemplateFill {
    fn new(template: Template) -> Self {
        let fields = template.fields().into_iter().map(str::to_string).collect();
        Self {
            template,
            fields,
            values: HashMap::new(),
            current: 0,
        }
    }

    fn current_label(&self) -> String {
        self.fields
            .get(self.current)
            .map(|f| field_label(f))
            .unwrap_or_default()
    }

    fn is_complete(&self) -> bool {
        self.current >= self.fields.len()
    }
}

struct AppState {
    // Input
    input: String,
    cursor_pos: usize,
    input_history: Vec<String>,
    history_pos: Option<usize>,

    // Chat
    items: Vec<ChatItem>,
    scroll_offset: usize,
    turn_start: usize,
    /// Index of the assistant item receiving fragments for the current turn.
    streaming_item: Option<usize>,

    /// `None` while a background task owns the session.
    session: Option<SessionState>,
    summary: String,
    turn_cancel: Option<CancellationToken>,
    template_fill: Option<TemplateFill>,

    // Status
    status_text: String,
    should_quit: bool,
    theme: Theme,

    export_dir: PathBuf,
    assistant: Arc<Assistant>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl AppState {
    fn new(
        settings: &Settings,
        theme_name: &str,
        assistant: Arc<Assistant>,
        events_tx: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let session = settings.new_session();
        let mut state = Self {
            input: String::new(),
            cursor_pos: 0,
            input_history: Vec::new(),
            history_pos: None,

            items: Vec::new(),
            scroll_offset: 0,
            turn_start: 0,
            streaming_item: None,

            session: None,
            summary: String::new(),
            turn_cancel: None,
            template_fill: None,

            status_text: "Ready".into(),
            should_quit: false,
            theme: Theme::by_name(theme_name),

            export_dir: settings.export.directory(),
            assistant,
            events_tx,
        };
        state.put_session(session);
        state.add_item(ItemKind::Notice, welcome_text());
        state
    }

    fn is_processing(&self) -> bool {
        self.session.is_none()
    }

    fn put_session(&mut self, session: SessionState) {
        self.summary = status_summary(&session);
        self.session = Some(session);
    }

    fn add_item(&mut self, kind: ItemKind, content: impl Into<String>) {
        self.items.push(ChatItem {
            kind,
            content: content.into(),
        });
        self.scroll_to_bottom();
    }

    fn notice(&mut self, content: impl Into<String>) {
        self.add_item(ItemKind::Notice, content);
    }

    fn warn(&mut self, content: impl Into<String>) {
        self.add_item(ItemKind::Warning, content);
    }

    fn scroll_to_bottom(&mut self) {
        // Will be resolved on next draw
        self.scroll_offset = usize::MAX;
    }

    fn set_input(&mut self, text: String) {
        self.cursor_pos = text.len();
        self.input = text;
    }

    fn push_history(&mut self, input: String) {
        if !input.is_empty() && self.input_history.last() != Some(&input) {
            self.input_history.push(input);
        }
        self.history_pos = None;
    }

    fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let pos = match self.history_pos {
            None => self.input_history.len().saturating_sub(1),
            Some(0) => 0,
            Some(p) => p - 1,
        };
        self.history_pos = Some(pos);
        self.set_input(self.input_history[pos].clone());
    }

    fn history_next(&mut self) {
        if let Some(pos) = self.history_pos {
            if pos + 1 >= self.input_history.len() {
                self.history_pos = None;
                self.set_input(String::new());
            } else {
                self.history_pos = Some(pos + 1);
                self.set_input(self.input_history[pos + 1].clone());
            }
        }
    }

    fn cancel_turn(&mut self) {
        if let Some(cancel) = &self.turn_cancel {
            cancel.cancel();
            self.status_text = "Cancelling...".into();
        }
    }
}

pub async fn run_tui(settings: Settings, theme_name: &str) -> Result<()> {
    let assistant = Arc::new(Assistant::from_settings(&settings)?);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<WorkerEvent>();
    let mut state = AppState::new(&settings, theme_name, assistant, events_tx);
    check_server(&state);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut state, &mut events_rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    events_rx: &mut mpsc::UnboundedReceiver<WorkerEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw_ui(f, state))?;

        // Process worker events (non-blocking)
        while let Ok(worker_event) = events_rx.try_recv() {
            handle_worker_event(state, worker_event);
        }

        if event::poll(std::time::Duration::from_millis(33))? {
            match event::read()? {
                Event::Key(key) => handle_key(state, key),
                Event::Paste(text) => {
                    if !state.is_processing() {
                        let text = text.replace('\r', "").replace('\n', " ");
                        state.input.insert_str(state.cursor_pos, &text);
                        state.cursor_pos += text.len();
                    }
                }
                _ => {}
            }
        }

        if state.should_quit {
            state.cancel_turn();
            return Ok(());
        }
    }
}

fn welcome_text() -> String {
    "\
Welcome to your CoTeacher Assistant!

I can help you with your teaching tasks:
  - Create lesson plans that engage your students
  - Generate quizzes and assessments aligned with learning objectives
  - Suggest classroom activities for different subjects and age groups
  - Help with classroom management strategies
  - Provide resources for professional development

Type your question below and press Enter.
Tip: /templates lists quick templates, /subject and /style tune my answers, /help shows every command."
        .to_string()
}

fn status_summary(session: &SessionState) -> String {
    format!(
        "{} | {} | {} | {} msgs",
        session.model(),
        session.subject(),
        session.style(),
        session.len()
    )
}

// ── Chat turns and background work ──────────────────────────────────────

fn start_turn(state: &mut AppState, query: String) {
    let Some(mut session) = state.session.take() else {
        state.warn("Wait for the current reply to finish (Esc cancels it).");
        return;
    };

    begin_turn_view(state, &query);

    let cancel = CancellationToken::new();
    state.turn_cancel = Some(cancel.clone());

    let assistant = state.assistant.clone();
    let tx = state.events_tx.clone();
    tokio::spawn(async move {
        let fragments = tx.clone();
        let result = assistant
            .send(
                &mut session,
                &query,
                |fragment| {
                    let _ = fragments.send(WorkerEvent::Fragment(fragment.to_string()));
                },
                cancel,
            )
            .await;
        let _ = tx.send(WorkerEvent::TurnFinished {
            session,
            query,
            result,
        });
    });
}

fn begin_turn_view(state: &mut AppState, query: &str) {
    state.turn_start = state.items.len();
    state.streaming_item = None;
    state.add_item(ItemKind::User, query);
    state.status_text = "Thinking...".into();
}

/// Drop the user and assistant items of a turn the session rolled back.
fn discard_turn_view(state: &mut AppState) {
    if let Some(index) = state.streaming_item.take() {
        if index < state.items.len() {
            state.items.remove(index);
        }
    }
    if state
        .items
        .get(state.turn_start)
        .is_some_and(|item| item.kind == ItemKind::User)
    {
        state.items.remove(state.turn_start);
    }
}

fn select_model(state: &mut AppState, model: String) {
    let Some(mut session) = state.session.take() else {
        state.warn("Wait for the current reply to finish (Esc cancels it).");
        return;
    };
    state.status_text = format!("Switching to {model}...");

    let assistant = state.assistant.clone();
    let tx = state.events_tx.clone();
    tokio::spawn(async move {
        let result = assistant.select_model(&mut session, &model).await;
        let _ = tx.send(WorkerEvent::ModelSelected {
            session,
            model,
            result,
        });
    });
}

fn list_models(state: &mut AppState) {
    state.status_text = "Asking the server for models...".into();
    let llm = state.assistant.llm().clone();
    let tx = state.events_tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(WorkerEvent::Models(llm.list_models().await));
    });
}

fn check_server(state: &AppState) {
    let llm = state.assistant.llm().clone();
    let tx = state.events_tx.clone();
    tokio::spawn(async move {
        let _ = tx.send(WorkerEvent::Health(llm.check_health().await));
    });
}

fn handle_worker_event(state: &mut AppState, event: WorkerEvent) {
    match event {
        WorkerEvent::Fragment(text) => {
            match state.streaming_item.and_then(|i| state.items.get_mut(i)) {
                Some(item) => item.content.push_str(&text),
                None => {
                    state.status_text = "Streaming...".into();
                    state.add_item(ItemKind::Assistant, text);
                    state.streaming_item = Some(state.items.len() - 1);
                }
            }
            state.scroll_to_bottom();
        }
        WorkerEvent::TurnFinished {
            session,
            query,
            result,
        } => {
            state.put_session(session);
            state.turn_cancel = None;

            match result {
                Ok(reply) => {
                    match state.streaming_item.take().and_then(|i| state.items.get_mut(i)) {
                        Some(item) => item.content = reply,
                        None => state.add_item(ItemKind::Assistant, reply),
                    }
                    state.status_text = "Ready".into();
                }
                Err(e) => {
                    // The session dropped the turn, so the view does too.
                    discard_turn_view(state);
                    if state.input.is_empty() {
                        state.set_input(query);
                    }
                    match e {
                        CoTeacherError::Cancelled => {
                            state.notice("Reply cancelled. Your message is back in the input box.");
                            state.status_text = "Cancelled".into();
                        }
                        other => {
                            state.warn(format!(
                                "{other}\nIs Ollama running? Your message is back in the input box."
                            ));
                            state.status_text = "Error".into();
                        }
                    }
                }
            }
            state.scroll_to_bottom();
        }
        WorkerEvent::ModelSelected {
            session,
            model,
            result,
        } => {
            state.put_session(session);
            match result {
                Ok(()) => {
                    state.notice(format!("Model switched to {model}."));
                    state.status_text = "Ready".into();
                }
                Err(e) => {
                    state.warn(format!("Could not switch to {model}: {e}"));
                    state.status_text = "Error".into();
                }
            }
        }
        WorkerEvent::Models(result) => {
            match result {
                Ok(models) if models.is_empty() => {
                    state.notice("The server has no models installed. Try `ollama pull llama3.2`.")
                }
                Ok(models) => {
                    let current = state.session.as_ref().map(|s| s.model().to_string());
                    let mut text = String::from("Models on the server:\n");
                    for model in &models {
                        let marker = if current.as_deref() == Some(model.as_str()) {
                            "*"
                        } else {
                            " "
                        };
                        text.push_str(&format!("  {marker} {model}\n"));
                    }
                    text.push_str("Use /model <name> to switch.");
                    state.notice(text);
                }
                Err(e) => state.warn(format!("Could not list models: {e}")),
            }
            if !state.is_processing() {
                state.status_text = "Ready".into();
            }
        }
        WorkerEvent::Health(Err(e)) => {
            state.warn(format!("{e}\nStart the server with `ollama serve`, then try again."));
        }
        WorkerEvent::Health(Ok(())) => {}
    }
}

// ── Commands ────────────────────────────────────────────────────────────

fn handle_command_result(state: &mut AppState, result: CommandResult) {
    match result {
        CommandResult::Message(text) => state.notice(text),
        CommandResult::Quit => state.should_quit = true,
        CommandResult::NotACommand => {}
        CommandResult::ThemeChanged(name) => {
            if Theme::all_names().contains(&name.as_str()) {
                state.theme = Theme::by_name(&name);
                state.notice(format!("Theme changed to {name}."));
            } else {
                state.warn(format!(
                    "Unknown theme '{name}'. Available: {}",
                    Theme::all_names().join(", ")
                ));
            }
        }
        CommandResult::ListModels => list_models(state),
        CommandResult::SetModel(model) => select_model(state, model),
        CommandResult::UseTemplate(template) => begin_template(state, template),
        other => {
            let Some(mut session) = state.session.take() else {
                state.warn("Wait for the current reply to finish (Esc cancels it).");
                return;
            };
            apply_session_command(state, &mut session, other);
            state.put_session(session);
        }
    }
}

/// Commands that read or change the session synchronously.
fn apply_session_command(state: &mut AppState, session: &mut SessionState, result: CommandResult) {
    match result {
        CommandResult::Clear => {
            session.clear();
            state.items.clear();
            state.notice("Chat history cleared! What can I help you with?");
            state.scroll_offset = 0;
        }
        CommandResult::Save(name) => {
            let name = name.unwrap_or_else(|| default_conversation_name(local_now()));
            match session.save(&name) {
                Ok(saved) => {
                    let text = format!(
                        "Saved '{}' ({} messages).",
                        saved.name,
                        saved.messages.len()
                    );
                    state.notice(text);
                }
                Err(e) => state.warn(format!("Could not save: {e}")),
            }
        }
        CommandResult::Load(name) => match session.load(&name) {
            Ok(()) => {
                let count = session.len();
                let subject = session.subject();
                state.items.clear();
                state.items.extend(transcript_items(session));
                state.notice(format!(
                    "Loaded '{name}' ({count} messages, subject {subject})."
                ));
            }
            Err(e) => state.warn(format!("{e}\nSee /saved for saved conversations.")),
        },
        CommandResult::ListSaved => {
            let names = session.saved_names();
            if names.is_empty() {
                state.notice("No saved conversations yet. Use /save [name].");
            } else {
                let mut text = String::from("Saved conversations:\n");
                for name in names {
                    if let Some(conversation) = session.saved(name) {
                        text.push_str(&format!(
                            "  {}  ({} messages, {}, saved {})\n",
                            conversation.name,
                            conversation.messages.len(),
                            conversation.subject,
                            conversation.saved_at.format("%Y-%m-%d %H:%M")
                        ));
                    }
                }
                text.push_str("Use /load <name> to restore one.");
                state.notice(text);
            }
        }
        CommandResult::Export { format, directory } => {
            let dir = directory.unwrap_or_else(|| state.export_dir.clone());
            match export_to(session, format, &dir) {
                Ok(path) => state.notice(format!("Exported {format} to {}", path.display())),
                Err(e) => state.warn(format!("Could not export: {e}")),
            }
        }
        CommandResult::SetSubject(subject) => {
            session.set_subject(subject);
            state.notice(format!("Now focusing on {subject}."));
        }
        CommandResult::SetStyle(style) => {
            session.set_style(style);
            state.notice(format!("Response style set to {style}."));
        }
        CommandResult::ShowStatus => {
            let text = format!(
                "Subject: {}\nStyle:   {}\nModel:   {}\nMessages: {}\nSaved:   {}\nExports: {}",
                session.subject(),
                session.style(),
                session.model(),
                session.len(),
                session.saved_names().len(),
                state.export_dir.display()
            );
            state.notice(text);
        }
        _ => {}
    }
}

fn transcript_items(session: &SessionState) -> Vec<ChatItem> {
    session
        .messages()
        .iter()
        .map(|m| ChatItem {
            kind: match m.role {
                Role::User => ItemKind::User,
                Role::Assistant => ItemKind::Assistant,
            },
            content: m.content.clone(),
        })
        .collect()
}

fn export_to(
    session: &SessionState,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf, CoTeacherError> {
    let path = session.export(format)?.write_to(dir)?;
    tracing::info!(path = %path.display(), "exported conversation");
    Ok(path)
}

// ── Templates ───────────────────────────────────────────────────────────

fn begin_template(state: &mut AppState, template: Template) {
    if state.is_processing() {
        state.warn("Wait for the current reply to finish (Esc cancels it).");
        return;
    }

    let fill = TemplateFill::new(template);
    if fill.is_complete() {
        finish_template(state, fill);
        return;
    }

    state.notice(format!(
        "Template: {}\n  {}\nEnter each value and press Enter (Esc to cancel).",
        fill.template.name(),
        fill.template.pattern()
    ));
    state.template_fill = Some(fill);
}

fn submit_template_value(state: &mut AppState, value: String) {
    let Some(mut fill) = state.template_fill.take() else {
        return;
    };

    let value = value.trim().to_string();
    if value.is_empty() {
        state.warn(format!("{} cannot be empty.", fill.current_label()));
        state.template_fill = Some(fill);
        return;
    }

    let field = fill.fields[fill.current].clone();
    fill.values.insert(field, value);
    fill.current += 1;

    if fill.is_complete() {
        finish_template(state, fill);
    } else {
        state.template_fill = Some(fill);
    }
}

fn finish_template(state: &mut AppState, fill: TemplateFill) {
    match fill.template.instantiate(&fill.values) {
        Ok(prompt) => start_turn(state, prompt),
        Err(e) => state.warn(e.to_string()),
    }
}

// ── Drawing ─────────────────────────────────────────────────────────────

fn draw_ui(f: &mut ratatui::Frame, state: &mut AppState) {
    let theme = &state.theme;

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // chat
            Constraint::Length(3), // input
            Constraint::Length(1), // status
        ])
        .split(f.area());
    let chat_area = main_chunks[0];

    let chat_lines = build_chat_lines(&state.items, state.is_processing(), theme);
    let total_lines = chat_lines.len();

    // Calculate visible height (area height - 2 for borders)
    let visible_height = chat_area.height.saturating_sub(2) as usize;

    let max_scroll = total_lines.saturating_sub(visible_height);
    if state.scroll_offset > max_scroll {
        state.scroll_offset = max_scroll;
    }

    let chat = Paragraph::new(Text::from(chat_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" CoTeacher Assistant ")
                .border_style(Style::default().fg(theme.border)),
        )
        .style(Style::default().bg(theme.bg))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset as u16, 0));
    f.render_widget(chat, chat_area);

    if total_lines > visible_height {
        let mut scrollbar_state = ScrollbarState::new(max_scroll).position(state.scroll_offset);
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("^"))
                .end_symbol(Some("v")),
            chat_area,
            &mut scrollbar_state,
        );
    }

    draw_input(f, main_chunks[1], state);
    draw_status_bar(f, main_chunks[2], state);
}

fn render_item_lines<'a>(item: &'a ChatItem, theme: &Theme) -> Vec<Line<'a>> {
    let mut lines: Vec<Line> = Vec::new();

    let (prefix, color) = match item.kind {
        ItemKind::User => ("You > ", theme.user_color),
        ItemKind::Assistant => ("CoTeacher > ", theme.assistant_color),
        ItemKind::Notice => ("", theme.system_color),
        ItemKind::Warning => ("! ", theme.warning),
    };
    let indent = " ".repeat(prefix.len());

    let mut in_code_block = false;
    for (i, raw_line) in item.content.lines().enumerate() {
        let lead = if i == 0 {
            Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD))
        } else {
            Span::raw(indent.clone())
        };

        if item.kind == ItemKind::Assistant && raw_line.starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(Line::from(vec![
                lead,
                Span::styled(raw_line, Style::default().fg(theme.muted)),
            ]));
            continue;
        }

        let style = if in_code_block {
            Style::default().fg(theme.accent)
        } else if item.kind == ItemKind::Assistant {
            Style::default().fg(theme.fg)
        } else {
            Style::default().fg(color)
        };
        lines.push(Line::from(vec![lead, Span::styled(raw_line, style)]));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            prefix,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
    }

    lines
}

fn build_chat_lines<'a>(items: &'a [ChatItem], is_processing: bool, theme: &Theme) -> Vec<Line<'a>> {
    let mut chat_lines: Vec<Line> = Vec::new();

    for item in items {
        chat_lines.extend(render_item_lines(item, theme));
        chat_lines.push(Line::raw(""));
    }

    if is_processing {
        chat_lines.push(Line::from(Span::styled(
            "  Thinking...",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::DIM),
        )));
    }

    chat_lines
}

fn draw_input(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;

    let input_style = if state.is_processing() {
        Style::default().fg(theme.muted)
    } else {
        Style::default().fg(theme.fg)
    };

    let title = if state.is_processing() {
        " Waiting for reply  Esc to cancel ".to_string()
    } else if let Some(fill) = &state.template_fill {
        format!(
            " {}: {} ({}/{}) ",
            fill.template.name(),
            fill.current_label(),
            fill.current + 1,
            fill.fields.len()
        )
    } else if state.input.starts_with('/') {
        " Command ".to_string()
    } else {
        " Ask for teaching assistance... ".to_string()
    };

    let highlighted = state.template_fill.is_some() || state.input.starts_with('/');
    let input = Paragraph::new(state.input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(if highlighted {
                    theme.accent
                } else {
                    theme.border
                })),
        )
        .style(input_style);
    f.render_widget(input, area);

    if !state.is_processing() {
        let column = state.input[..state.cursor_pos].chars().count() as u16;
        let cursor_x = area.x + column + 1;
        // Clamp cursor to area width
        let max_x = area.x + area.width.saturating_sub(2);
        f.set_cursor_position((cursor_x.min(max_x), area.y + 1));
    }
}

fn draw_status_bar(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let status_color = match state.status_text.as_str() {
        "Error" => theme.error,
        "Ready" => theme.success,
        _ => theme.warning,
    };

    let status_spans = vec![
        Span::styled(
            " CoTeacher ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("| {} ", state.summary), Style::default().fg(theme.accent)),
        Span::styled("| ", Style::default().fg(theme.muted)),
        Span::styled(&state.status_text, Style::default().fg(status_color)),
        Span::styled("  /help for commands ", Style::default().fg(theme.muted)),
    ];
    f.render_widget(Paragraph::new(Line::from(status_spans)), area);
}

// ── Keys ────────────────────────────────────────────────────────────────

fn handle_key(state: &mut AppState, key: KeyEvent) {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            if state.is_processing() {
                state.cancel_turn();
            } else {
                state.should_quit = true;
            }
        }

        (_, KeyCode::Esc) => {
            if state.is_processing() {
                state.cancel_turn();
            } else if state.template_fill.take().is_some() {
                state.notice("Template cancelled.");
            } else {
                state.set_input(String::new());
            }
        }

        (KeyModifiers::CONTROL, KeyCode::Char('l')) => {
            if !state.is_processing() {
                handle_command_result(state, CommandResult::Clear);
            }
        }

        (KeyModifiers::CONTROL, KeyCode::Char('s')) => {
            if !state.is_processing() {
                handle_command_result(state, CommandResult::Save(None));
            }
        }

        (_, KeyCode::Enter) => {
            if state.is_processing() {
                return;
            }

            let input = std::mem::take(&mut state.input);
            state.cursor_pos = 0;

            if state.template_fill.is_some() {
                submit_template_value(state, input);
                return;
            }

            if input.trim().is_empty() {
                return;
            }
            state.push_history(input.clone());

            if input.starts_with('/') {
                handle_command_result(state, commands::handle_command(&input));
                return;
            }

            start_turn(state, input);
        }

        // Input editing
        (_, KeyCode::Backspace) => {
            if state.cursor_pos > 0 && !state.is_processing() {
                let prev = prev_char_boundary(&state.input, state.cursor_pos);
                state.input.drain(prev..state.cursor_pos);
                state.cursor_pos = prev;
            }
        }
        (_, KeyCode::Delete) => {
            if state.cursor_pos < state.input.len() && !state.is_processing() {
                let next = next_char_boundary(&state.input, state.cursor_pos);
                state.input.drain(state.cursor_pos..next);
            }
        }
        (_, KeyCode::Left) => {
            state.cursor_pos = if key.modifiers.contains(KeyModifiers::CONTROL) {
                word_boundary_left(&state.input, state.cursor_pos)
            } else {
                prev_char_boundary(&state.input, state.cursor_pos)
            };
        }
        (_, KeyCode::Right) => {
            state.cursor_pos = if key.modifiers.contains(KeyModifiers::CONTROL) {
                word_boundary_right(&state.input, state.cursor_pos)
            } else {
                next_char_boundary(&state.input, state.cursor_pos)
            };
        }
        (KeyModifiers::CONTROL, KeyCode::Char('a')) | (_, KeyCode::Home) => {
            state.cursor_pos = 0;
        }
        (KeyModifiers::CONTROL, KeyCode::Char('e')) | (_, KeyCode::End) => {
            state.cursor_pos = state.input.len();
        }

        // Scroll (Shift+arrows, must come before bare arrows)
        (KeyModifiers::SHIFT, KeyCode::Up) => {
            state.scroll_offset = state.scroll_offset.saturating_sub(1);
        }
        (KeyModifiers::SHIFT, KeyCode::Down) => {
            state.scroll_offset = state.scroll_offset.saturating_add(1);
        }
        (_, KeyCode::PageUp) => {
            state.scroll_offset = state.scroll_offset.saturating_sub(20);
        }
        (_, KeyCode::PageDown) => {
            state.scroll_offset = state.scroll_offset.saturating_add(20);
        }

        // History navigation
        (_, KeyCode::Up) => {
            if !state.is_processing() && state.template_fill.is_none() {
                state.history_prev();
            }
        }
        (_, KeyCode::Down) => {
            if !state.is_processing() && state.template_fill.is_none() {
                state.history_next();
            }
        }

        // Kill line (Ctrl+U)
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            state.input.drain(..state.cursor_pos);
            state.cursor_pos = 0;
        }

        // Kill to end of line (Ctrl+K)
        (KeyModifiers::CONTROL, KeyCode::Char('k')) => {
            state.input.truncate(state.cursor_pos);
        }

        // Delete word backward (Ctrl+W)
        (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
            let new_pos = word_boundary_left(&state.input, state.cursor_pos);
            state.input.drain(new_pos..state.cursor_pos);
            state.cursor_pos = new_pos;
        }

        // Tab completion for commands
        (_, KeyCode::Tab) => {
            if state.input.starts_with('/') {
                if let Some(completion) = complete_command(&state.input) {
                    state.set_input(completion);
                }
            }
        }

        (modifiers, KeyCode::Char(c))
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            if !state.is_processing() {
                state.input.insert(state.cursor_pos, c);
                state.cursor_pos += c.len_utf8();
            }
        }

        _ => {}
    }
}

// ── Helper functions ────────────────────────────────────────────────────

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    s[..pos].char_indices().next_back().map_or(0, |(i, _)| i)
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    s[pos..].chars().next().map_or(pos, |c| pos + c.len_utf8())
}

fn word_boundary_left(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let bytes = s.as_bytes();
    let mut i = pos - 1;
    // Skip whitespace
    while i > 0 && bytes[i] == b' ' {
        i -= 1;
    }
    // Skip word characters
    while i > 0 && bytes[i] != b' ' {
        i -= 1;
    }
    if bytes[i] == b' ' && i > 0 {
        i + 1
    } else {
        i
    }
}

fn word_boundary_right(s: &str, pos: usize) -> usize {
    let len = s.len();
    if pos >= len {
        return len;
    }
    let bytes = s.as_bytes();
    let mut i = pos;
    // Skip current word
    while i < len && bytes[i] != b' ' {
        i += 1;
    }
    // Skip whitespace
    while i < len && bytes[i] == b' ' {
        i += 1;
    }
    i
}

fn complete_command(input: &str) -> Option<String> {
    let commands = [
        "/help",
        "/exit",
        "/quit",
        "/clear",
        "/save",
        "/load",
        "/saved",
        "/export",
        "/subject",
        "/style",
        "/model",
        "/models",
        "/templates",
        "/template",
        "/status",
        "/theme",
        "/version",
    ];

    let matches: Vec<&&str> = commands.iter().filter(|c| c.starts_with(input)).collect();

    if matches.len() == 1 {
        Some(format!("{} ", matches[0]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_boundaries_step_over_multibyte() {
        let s = "añb";
        assert_eq!(next_char_boundary(s, 1), 3);
        assert_eq!(prev_char_boundary(s, 3), 1);
        assert_eq!(prev_char_boundary(s, 0), 0);
        assert_eq!(next_char_boundary(s, s.len()), s.len());
    }

    #[test]
    fn test_word_boundaries() {
        let s = "plan a lesson";
        assert_eq!(word_boundary_left(s, s.len()), 7);
        assert_eq!(word_boundary_right(s, 0), 5);
        assert_eq!(word_boundary_left(s, 0), 0);
    }

    #[test]
    fn test_complete_command_needs_a_unique_prefix() {
        assert_eq!(complete_command("/sub"), Some("/subject ".to_string()));
        assert_eq!(complete_command("/exp"), Some("/export ".to_string()));
        assert_eq!(complete_command("/s"), None);
    }

    fn idle_state() -> (AppState, mpsc::UnboundedReceiver<WorkerEvent>) {
        let settings = Settings::default();
        let assistant = Arc::new(Assistant::from_settings(&settings).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        (AppState::new(&settings, "classroom", assistant, tx), rx)
    }

    /// Put the view in the middle of a turn, as `start_turn` does.
    fn mid_turn(state: &mut AppState, query: &str) -> SessionState {
        let session = state.session.take().unwrap();
        begin_turn_view(state, query);
        session
    }

    fn assistant_items(state: &AppState) -> Vec<&str> {
        state
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::Assistant)
            .map(|item| item.content.as_str())
            .collect()
    }

    #[test]
    fn test_notice_between_fragments_keeps_one_reply_item() {
        let (mut state, _rx) = idle_state();
        let session = mid_turn(&mut state, "Plan a lesson");

        handle_worker_event(&mut state, WorkerEvent::Fragment("Hello".into()));
        handle_worker_event(&mut state, WorkerEvent::Models(Ok(Vec::new())));
        handle_worker_event(&mut state, WorkerEvent::Fragment(" world".into()));
        handle_worker_event(
            &mut state,
            WorkerEvent::TurnFinished {
                session,
                query: "Plan a lesson".into(),
                result: Ok("Hello world".into()),
            },
        );

        assert_eq!(assistant_items(&state), vec!["Hello world"]);
        assert!(state.streaming_item.is_none());
        assert!(!state.is_processing());
    }

    #[test]
    fn test_failed_turn_removes_its_items_and_restores_query() {
        let (mut state, _rx) = idle_state();
        let before = state.items.len();
        let session = mid_turn(&mut state, "Plan a lesson");

        handle_worker_event(&mut state, WorkerEvent::Fragment("Hel".into()));
        handle_worker_event(&mut state, WorkerEvent::Models(Ok(Vec::new())));
        handle_worker_event(
            &mut state,
            WorkerEvent::TurnFinished {
                session,
                query: "Plan a lesson".into(),
                result: Err(CoTeacherError::Cancelled),
            },
        );

        assert!(assistant_items(&state).is_empty());
        assert!(state.items.iter().all(|item| item.kind != ItemKind::User));
        // The model-list notice and the cancellation notice stay.
        assert_eq!(state.items.len(), before + 2);
        assert_eq!(state.input, "Plan a lesson");
    }

    #[test]
    fn test_unreachable_server_is_reported() {
        let (mut state, _rx) = idle_state();
        let before = state.items.len();

        handle_worker_event(&mut state, WorkerEvent::Health(Ok(())));
        assert_eq!(state.items.len(), before);

        handle_worker_event(
            &mut state,
            WorkerEvent::Health(Err(CoTeacherError::model_unavailable("connection refused"))),
        );
        let last = state.items.last().unwrap();
        assert_eq!(last.kind, ItemKind::Warning);
        assert!(last.content.contains("ollama serve"));
    }

    #[test]
    fn test_template_fill_walks_fields_in_order() {
        let template = Template::new("Email", "Write to {who} about {topic}, {who}.");
        let mut fill = TemplateFill::new(template);

        assert_eq!(fill.fields, vec!["who", "topic"]);
        assert_eq!(fill.current_label(), "Who");
        fill.values.insert("who".into(), "parents".into());
        fill.current += 1;
        assert_eq!(fill.current_label(), "Topic");
        fill.values.insert("topic".into(), "the trip".into());
        fill.current += 1;

        assert!(fill.is_complete());
        assert_eq!(
            fill.template.instantiate(&fill.values).unwrap(),
            "Write to parents about the trip, parents."
        );
    }
}
