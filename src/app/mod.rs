mod commands;
#[cfg(test)]
mod tests;

pub use commands::{Command, HELP_TEXT};

use crate::api::ApiClient;
use crate::config::Config;
use crate::geo;
use crate::persistence::{FileRecordStore, RecordStore};
use crate::persona::{ordinal, Persona};
use crate::runtime::{spawn_speech, spawn_turn, SpeechJob, TurnHandle, UiUpdate};
use crate::speech;
use crate::state::{ChatSession, CompletionSource, Message, MessageId, Turn, TurnOutcome};
use crate::terminal::{self, TerminalType};
use crate::ui::composer::{Composer, ComposerAction};
use crate::ui::layout::split_chat_layout;
use crate::ui::render::{
    conversation_lines, input_visual_rows, render_header, render_input, render_messages,
    render_saved_panel, render_status_line,
};
use crate::ui::theme::Theme;
use crate::ui::typewriter::TypewriterBoard;
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use std::collections::HashSet;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
pub const TUI_TICK_INTERVAL: Duration = Duration::from_millis(120);
const DOUBLE_INTERRUPT_EXIT_WINDOW: Duration = Duration::from_millis(900);
const SCROLL_STEP: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    /// The draft typed before dictation started waits here until the
    /// utterance is accepted or dropped.
    Dictation { parked: String },
}

/// Work a command leaves for the caller, which differs between the TUI and
/// line mode.
enum Followup {
    Nothing,
    Turn(Turn),
    Speech(JoinHandle<()>),
}

pub struct App {
    config: Config,
    session: ChatSession,
    source: CompletionSource,
    board: TypewriterBoard,
    composer: Composer,
    update_tx: mpsc::UnboundedSender<UiUpdate>,
    update_rx: mpsc::UnboundedReceiver<UiUpdate>,
    active: Option<TurnHandle>,
    next_seq: u64,
    search: Option<String>,
    notice: Option<String>,
    show_saved: bool,
    input_mode: InputMode,
    scroll_back: usize,
    max_scroll_back: usize,
    last_interrupt_at: Option<Instant>,
    should_quit: bool,
    terminal: Option<TerminalType>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        let persona = Arc::new(Persona::default());
        let records: Arc<dyn RecordStore> =
            Arc::new(FileRecordStore::new(config.state_dir.clone()));
        let session = ChatSession::load(Arc::clone(&persona), records);
        let source = CompletionSource::new(client, geo::locator_for(config.location), persona);

        let mut app = Self::with_parts(config, session, source);
        if io::stdin().is_terminal() && io::stdout().is_terminal() {
            app.terminal = Some(terminal::setup()?);
        }
        Ok(app)
    }

    /// Headless app over explicit parts. No terminal is attached.
    pub fn with_parts(config: Config, session: ChatSession, source: CompletionSource) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let board = TypewriterBoard::new(config.typing_interval, config.history_policy);
        Self {
            config,
            session,
            source,
            board,
            composer: Composer::new(),
            update_tx,
            update_rx,
            active: None,
            next_seq: 1,
            search: None,
            notice: None,
            show_saved: false,
            input_mode: InputMode::Normal,
            scroll_back: 0,
            max_scroll_back: 0,
            last_interrupt_at: None,
            should_quit: false,
            terminal: None,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub async fn run(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            let result = self.run_tui().await;
            self.release_terminal();
            return result;
        }
        self.run_lines().await
    }

    async fn run_tui(&mut self) -> Result<()> {
        tracing::info!(
            messages = self.session.messages().len(),
            model = self.session.settings().model.wire_id(),
            "tui started"
        );
        while !self.should_quit {
            self.board.sync(self.session.messages(), Utc::now());
            self.draw_tui_frame()?;
            self.process_tui_events()?;
            if self.should_quit {
                break;
            }

            let wait = if self.board.is_animating() || self.session.is_in_flight() {
                DEFAULT_FRAME_INTERVAL
            } else {
                TUI_TICK_INTERVAL
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                update = self.update_rx.recv() => {
                    if let Some(update) = update {
                        self.handle_update(update);
                    }
                }
            }
        }

        if let Some(handle) = self.active.take() {
            handle.cancel();
            self.session.finish_turn(&handle.turn);
        }
        Ok(())
    }

    fn draw_tui_frame(&mut self) -> Result<()> {
        let Some(mut terminal) = self.terminal.take() else {
            return Ok(());
        };
        let mut max_scroll_back = self.max_scroll_back;
        let drawn = terminal
            .draw(|frame| max_scroll_back = self.draw_frame(frame))
            .map(|_| ());
        self.terminal = Some(terminal);
        drawn?;
        self.max_scroll_back = max_scroll_back;
        self.scroll_back = self.scroll_back.min(max_scroll_back);
        Ok(())
    }

    /// Paints one frame and returns how far the history can scroll back.
    fn draw_frame(&self, frame: &mut Frame<'_>) -> usize {
        let settings = self.session.settings();
        let theme = Theme::for_mode(settings.dark_mode);
        let area = frame.area();

        let input_width = area.width.saturating_sub(2).max(1) as usize;
        let max_input_rows = area.height.saturating_sub(3).max(1);
        let input_rows =
            (input_visual_rows(self.composer.text(), input_width) as u16).clamp(1, max_input_rows);
        let panes = split_chat_layout(area, input_rows);

        render_header(frame, panes.header, &self.header_text(), &theme);

        let visible = self.visible_messages();
        let lines = conversation_lines(
            &visible,
            &self.board,
            self.session.persona(),
            &theme,
            panes.history.width as usize,
        );
        let max_scroll_back = lines.len().saturating_sub(panes.history.height as usize);
        let scroll = max_scroll_back - self.scroll_back.min(max_scroll_back);
        render_messages(frame, panes.history, lines, scroll, &theme);

        let (status, style) = match &self.notice {
            Some(notice) => (notice.clone(), theme.notice),
            None => (self.status_text(), theme.status),
        };
        render_status_line(frame, panes.status, &status, style);
        render_input(
            frame,
            panes.input,
            self.composer.text(),
            self.composer.cursor(),
            &theme,
        );

        if self.show_saved {
            render_saved_panel(frame, self.session.saved(), &theme);
        }
        max_scroll_back
    }

    fn header_text(&self) -> String {
        let settings = self.session.settings();
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        let mut header = format!(
            " {} · {} · web {} · maps {}",
            self.session.persona().assistant_name,
            settings.model.label(),
            on_off(settings.use_search),
            on_off(settings.use_maps),
        );
        let attempts = self.session.cursor().attempts;
        if attempts > 0 {
            header.push_str(&format!(" · {} retry", ordinal(attempts)));
        }
        if let Some(term) = &self.search {
            header.push_str(&format!(" · search \"{term}\""));
        }
        header
    }

    fn status_text(&self) -> String {
        if matches!(self.input_mode, InputMode::Dictation { .. }) {
            return "dictating: type what you said, enter appends, esc drops it".to_string();
        }
        if self.session.is_in_flight() {
            return format!(
                "{} is typing... esc cancels",
                self.session.persona().assistant_name
            );
        }
        if self.scroll_back > 0 {
            return format!("scrolled back {} rows · pgdn to follow", self.scroll_back);
        }
        "enter sends · /help for commands".to_string()
    }

    /// Messages shown in the history pane with their position in the full
    /// conversation.
    fn visible_messages(&self) -> Vec<(usize, &Message)> {
        let messages = self.session.messages();
        match self.search.as_deref() {
            None => messages.iter().enumerate().collect(),
            Some(term) => {
                let hits: HashSet<&MessageId> = self
                    .session
                    .search(term)
                    .into_iter()
                    .map(|message| &message.id)
                    .collect();
                messages
                    .iter()
                    .enumerate()
                    .filter(|(_, message)| hits.contains(&message.id))
                    .collect()
            }
        }
    }

    fn process_tui_events(&mut self) -> Result<()> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Paste(text) => {
                    if !text.is_empty() {
                        self.composer.insert_str(&text);
                    }
                }
                Event::Key(key)
                    if key.kind == KeyEventKind::Press || key.kind == KeyEventKind::Repeat =>
                {
                    self.handle_key(key);
                }
                Event::Mouse(mouse) => match mouse.kind {
                    event::MouseEventKind::ScrollUp => self.scroll_up(1),
                    event::MouseEventKind::ScrollDown => self.scroll_down(1),
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.handle_interrupt();
            return;
        }
        if key.code == KeyCode::F(2) {
            self.toggle_dictation();
            return;
        }
        self.last_interrupt_at = None;

        match self.composer.apply_key(key) {
            ComposerAction::None => {}
            ComposerAction::Submit(text) => self.submit_text(text),
            ComposerAction::Cancel => self.handle_escape(),
            ComposerAction::Quit => self.should_quit = true,
            ComposerAction::ScrollUp => self.scroll_up(SCROLL_STEP),
            ComposerAction::ScrollDown => self.scroll_down(SCROLL_STEP),
        }
    }

    fn scroll_up(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_add(rows).min(self.max_scroll_back);
    }

    fn scroll_down(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    /// Ctrl-C: stop whatever is happening; a second press in quick
    /// succession quits.
    fn handle_interrupt(&mut self) {
        let now = Instant::now();
        if self
            .last_interrupt_at
            .is_some_and(|at| now.duration_since(at) <= DOUBLE_INTERRUPT_EXIT_WINDOW)
        {
            self.should_quit = true;
            return;
        }
        self.last_interrupt_at = Some(now);

        if self.cancel_active_turn() {
            self.notice = Some("Cancelled.".to_string());
        } else if matches!(self.input_mode, InputMode::Dictation { .. }) {
            self.stop_dictation();
        } else if !self.composer.is_empty() {
            self.composer.clear();
        } else {
            self.notice = Some("Press ctrl-c again to quit.".to_string());
        }
    }

    fn handle_escape(&mut self) {
        if self.show_saved {
            self.show_saved = false;
        } else if matches!(self.input_mode, InputMode::Dictation { .. }) {
            self.stop_dictation();
        } else if self.cancel_active_turn() {
            self.notice = Some("Cancelled.".to_string());
        } else {
            self.search = None;
            self.notice = None;
        }
    }

    /// Stops the running turn, keeping whatever text already arrived.
    fn cancel_active_turn(&mut self) -> bool {
        let Some(handle) = self.active.take() else {
            return false;
        };
        handle.cancel();
        self.session.finish_turn(&handle.turn);
        tracing::info!(seq = handle.seq, "turn cancelled by user");
        true
    }

    fn toggle_dictation(&mut self) {
        if matches!(self.input_mode, InputMode::Dictation { .. }) {
            self.stop_dictation();
            return;
        }
        let parked = self.composer.text().to_string();
        self.composer.clear();
        self.input_mode = InputMode::Dictation { parked };
        self.notice = Some(format!(
            "Listening ({}).",
            self.session.settings().voice_language
        ));
    }

    /// Leaves dictation and puts the parked draft back untouched.
    fn stop_dictation(&mut self) {
        if let InputMode::Dictation { parked } =
            std::mem::replace(&mut self.input_mode, InputMode::Normal)
        {
            self.composer.set_text(parked);
        }
        self.notice = None;
    }

    fn submit_text(&mut self, text: String) {
        if let InputMode::Dictation { parked } =
            std::mem::replace(&mut self.input_mode, InputMode::Normal)
        {
            self.composer
                .set_text(ChatSession::append_voice_input(&parked, &text));
            self.notice = None;
            return;
        }

        if let Some(parsed) = Command::parse(&text) {
            match parsed {
                Ok(command) => match self.run_command(command) {
                    Followup::Turn(turn) => self.start_turn(turn),
                    Followup::Speech(_) | Followup::Nothing => {}
                },
                Err(message) => self.notice = Some(message),
            }
            return;
        }

        if self.session.is_in_flight() {
            self.composer.set_text(text);
            self.notice = Some(format!(
                "{} is still answering.",
                self.session.persona().assistant_name
            ));
            return;
        }
        if let Some(turn) = self.begin_send(&text) {
            self.start_turn(turn);
        }
    }

    fn begin_send(&mut self, text: &str) -> Option<Turn> {
        let turn = self.session.begin_send(text)?;
        self.search = None;
        self.scroll_back = 0;
        self.notice = None;
        Some(turn)
    }

    fn start_turn(&mut self, turn: Turn) {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::debug!(seq, attempt = turn.attempt, "starting turn");
        self.active = Some(spawn_turn(
            &self.source,
            seq,
            turn,
            self.session.settings(),
            self.update_tx.clone(),
        ));
    }

    fn active_turn(&self, seq: u64) -> Option<&TurnHandle> {
        self.active.as_ref().filter(|handle| handle.seq == seq)
    }

    fn take_active_turn(&mut self, seq: u64) -> Option<TurnHandle> {
        self.active_turn(seq)?;
        self.active.take()
    }

    fn handle_update(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Snapshot { turn, snapshot } => {
                let Some(handle) = self.active_turn(turn) else {
                    tracing::debug!(seq = turn, "dropping snapshot from a stale turn");
                    return;
                };
                let target = handle.turn.clone();
                self.session.apply_snapshot(&target, &snapshot);
            }
            UiUpdate::TurnFailed { turn, error } => {
                if let Some(handle) = self.take_active_turn(turn) {
                    self.session.fail_turn(&handle.turn);
                    self.notice = Some(format!("Request failed: {error}"));
                }
            }
            UiUpdate::TurnFinished { turn } => {
                if let Some(handle) = self.take_active_turn(turn) {
                    self.session.finish_turn(&handle.turn);
                }
            }
            UiUpdate::SpeechReady { path, seconds, .. } => {
                self.notice = Some(format!("Voiced {seconds:.1}s to {}", path.display()));
            }
            UiUpdate::SpeechFailed { .. } => {
                self.notice = Some(self.session.persona().speech_failure.clone());
            }
        }
    }

    fn run_command(&mut self, command: Command) -> Followup {
        match command {
            Command::Regenerate => {
                if self.session.is_in_flight() {
                    self.notice = Some("Wait for the current answer first.".to_string());
                    return Followup::Nothing;
                }
                match self.session.begin_regenerate() {
                    Some(turn) => {
                        self.scroll_back = 0;
                        self.notice = None;
                        return Followup::Turn(turn);
                    }
                    None => self.notice = Some("Nothing to regenerate yet.".to_string()),
                }
            }
            Command::Clear => {
                self.session.clear_history();
                self.search = None;
                self.scroll_back = 0;
                self.notice = Some("History cleared.".to_string());
            }
            Command::Save(position) => {
                self.notice = Some(match self.message_at(position) {
                    Some(id) if self.session.save_excerpt(&id) => format!("Saved #{position}."),
                    Some(_) => format!("#{position} is already saved."),
                    None => format!("There is no message #{position}."),
                });
            }
            Command::Unsave(position) => {
                let id = position
                    .checked_sub(1)
                    .and_then(|index| self.session.saved().get(index))
                    .map(|excerpt| excerpt.id.clone());
                self.notice = Some(match id {
                    Some(id) if self.session.remove_excerpt(&id) => {
                        format!("Removed saved entry {position}.")
                    }
                    _ => format!("There is no saved entry {position}."),
                });
            }
            Command::ShowSaved => self.show_saved = true,
            Command::Search(term) => {
                self.scroll_back = 0;
                if term.trim().is_empty() {
                    self.search = None;
                    self.notice = None;
                } else {
                    let hits = self.session.search(&term).len();
                    self.notice = Some(format!("{hits} messages match \"{term}\"."));
                    self.search = Some(term);
                }
            }
            Command::Export => {
                self.notice = Some(match self.export_transcript() {
                    Ok(path) => format!("Transcript written to {}", path.display()),
                    Err(error) => {
                        tracing::warn!(error = %format!("{error:#}"), "transcript export failed");
                        format!("Export failed: {error:#}")
                    }
                });
            }
            Command::Model(model) => {
                self.session.update_settings(|settings| settings.model = model);
                self.notice = Some(format!("Model set to {}.", model.label()));
            }
            Command::Web(enabled) => {
                self.session.update_settings(|settings| {
                    settings.use_search = enabled.unwrap_or(!settings.use_search);
                });
            }
            Command::Maps(enabled) => {
                self.session.update_settings(|settings| {
                    settings.use_maps = enabled.unwrap_or(!settings.use_maps);
                });
            }
            Command::Theme => {
                self.session
                    .update_settings(|settings| settings.dark_mode = !settings.dark_mode);
            }
            Command::Speak(position) => {
                if let Some(handle) = self.speak(position) {
                    return Followup::Speech(handle);
                }
            }
            Command::Help => self.notice = Some(HELP_TEXT.to_string()),
            Command::Quit => self.should_quit = true,
        }
        Followup::Nothing
    }

    fn message_at(&self, position: usize) -> Option<MessageId> {
        self.session
            .messages()
            .get(position.checked_sub(1)?)
            .map(|message| message.id.clone())
    }

    /// Voices message `position`, or the latest settled reply.
    fn speak(&mut self, position: Option<usize>) -> Option<JoinHandle<()>> {
        let messages = self.session.messages();
        let message = match position {
            Some(position) => position.checked_sub(1).and_then(|index| messages.get(index)),
            None => messages
                .iter()
                .rev()
                .find(|message| message.is_assistant() && !message.streaming),
        };
        let Some(message) = message.filter(|message| !message.content.trim().is_empty()) else {
            self.notice = Some("Nothing to read out.".to_string());
            return None;
        };

        let job = SpeechJob {
            message: message.id.clone(),
            text: message.content.clone(),
            path: speech::clip_path(&self.config.state_dir, message.id.as_str()),
        };
        self.notice = Some(format!(
            "{} is clearing her throat...",
            self.session.persona().assistant_name
        ));
        Some(spawn_speech(
            self.source.client().clone(),
            self.source.persona().clone(),
            job,
            self.update_tx.clone(),
        ))
    }

    fn export_transcript(&self) -> Result<PathBuf> {
        let dir = self.config.state_dir.join("exports");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!(
            "transcript-{}.txt",
            Local::now().format("%Y%m%d-%H%M%S")
        ));
        std::fs::write(&path, self.session.transcript())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Plain stdin/stdout mode used when no terminal is attached.
    async fn run_lines(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        if let Some(last) = self.session.messages().last() {
            writeln!(stdout, "{}", self.format_message(last))?;
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while !self.should_quit {
            write!(stdout, "> ")?;
            stdout.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }

            let turn = match Command::parse(line) {
                Some(Ok(command)) => match self.run_command(command) {
                    Followup::Turn(turn) => Some(turn),
                    Followup::Speech(handle) => {
                        if let Err(error) = handle.await {
                            tracing::warn!(%error, "speech task ended abnormally");
                        }
                        while let Ok(update) = self.update_rx.try_recv() {
                            self.handle_update(update);
                        }
                        None
                    }
                    Followup::Nothing => None,
                },
                Some(Err(message)) => {
                    self.notice = Some(message);
                    None
                }
                None => self.begin_send(line),
            };

            if self.show_saved {
                self.show_saved = false;
                for (index, excerpt) in self.session.saved().iter().enumerate() {
                    writeln!(stdout, "{}. {}", index + 1, excerpt.content)?;
                }
            }
            if let Some(notice) = self.notice.take() {
                writeln!(stdout, "{notice}")?;
            }
            if let Some(turn) = turn {
                self.drive_line_turn(&turn).await;
                if let Some(message) = self.session.store().get(&turn.target) {
                    writeln!(stdout, "{}", self.format_message(message))?;
                }
            }
        }
        Ok(())
    }

    /// Runs one turn to the end in line mode. Ctrl-C stops it early.
    async fn drive_line_turn(&mut self, turn: &Turn) -> TurnOutcome {
        let stream = self
            .source
            .query_stream(&turn.prompt, self.session.settings(), turn.attempt);
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let outcome = self.session.drive(turn, stream, &cancel).await;
        interrupt.abort();
        outcome
    }

    fn format_message(&self, message: &Message) -> String {
        let persona = self.session.persona();
        let name = if message.is_assistant() {
            &persona.assistant_name
        } else {
            &persona.user_name
        };
        let mut text = format!("{name}: {}", message.content);
        for (index, source) in message.sources.iter().enumerate() {
            text.push_str(&format!("\n  [{}] {} <{}>", index + 1, source.title, source.uri));
        }
        text
    }

    fn release_terminal(&mut self) {
        if self.terminal.take().is_some() {
            if let Err(error) = terminal::restore() {
                tracing::warn!(error = %format!("{error:#}"), "failed to restore terminal");
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.release_terminal();
    }
}
