use super::*;
use crate::api::mock_client::{MockApiClient, MockResponse};
use crate::geo::Unlocated;
use crate::persistence::MemoryRecordStore;
use crate::settings::ModelChoice;
use crate::state::Snapshot;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tempfile::TempDir;

fn app_with(mock: MockApiClient, state_dir: &std::path::Path) -> App {
    let persona = Arc::new(Persona::default());
    let session = ChatSession::new(Arc::clone(&persona), Arc::new(MemoryRecordStore::new()));
    let source = CompletionSource::new(
        ApiClient::new_mock(Arc::new(mock)),
        Arc::new(Unlocated),
        persona,
    );
    let mut config = Config::for_tests();
    config.state_dir = state_dir.to_path_buf();
    App::with_parts(config, session, source)
}

/// Feeds worker updates back into the app until the running turn is over.
async fn settle(app: &mut App) {
    while app.active.is_some() {
        let update = app.update_rx.recv().await.expect("worker update");
        app.handle_update(update);
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn type_text(app: &mut App, text: &str) {
    for ch in text.chars() {
        app.handle_key(key(KeyCode::Char(ch)));
    }
}

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[tokio::test]
async fn test_enter_sends_and_streams_answer_into_place() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::new(vec![vec![
        MockApiClient::text_frame("Paris"),
        MockApiClient::text_frame(" is the capital."),
        MockApiClient::grounding_frame(&[("web", "Wiki", "https://w.example")]),
    ]]);
    let mut app = app_with(mock, temp.path());

    type_text(&mut app, "Capital of France?");
    app.handle_key(key(KeyCode::Enter));
    assert!(app.session().is_in_flight());
    assert!(app.composer.is_empty());

    settle(&mut app).await;

    let messages = app.session().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content, "Capital of France?");
    let answer = &messages[2];
    assert_eq!(answer.content, "Paris is the capital.");
    assert!(!answer.streaming);
    assert_eq!(answer.sources.len(), 1);
    assert!(!app.session().is_in_flight());
}

#[tokio::test]
async fn test_updates_from_an_old_turn_are_ignored() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::new(vec![vec![MockApiClient::text_frame("fresh")]]);
    let mut app = app_with(mock, temp.path());

    app.submit_text("hello".to_string());
    let before = app.session().messages().to_vec();
    let stale_seq = app.active.as_ref().map(|handle| handle.seq).unwrap() + 40;

    app.handle_update(UiUpdate::Snapshot {
        turn: stale_seq,
        snapshot: Snapshot {
            text: "ghost".to_string(),
            sources: Vec::new(),
            done: true,
        },
    });
    app.handle_update(UiUpdate::TurnFinished { turn: stale_seq });

    assert_eq!(app.session().messages(), before.as_slice());
    assert!(app.session().is_in_flight());
    settle(&mut app).await;
    assert_eq!(app.session().messages()[2].content, "fresh");
}

#[tokio::test]
async fn test_failed_request_writes_apology_and_notice() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::scripted(vec![MockResponse::Reject("503 overloaded".to_string())]);
    let mut app = app_with(mock, temp.path());

    app.submit_text("anyone there?".to_string());
    settle(&mut app).await;

    let answer = app.session().messages().last().unwrap();
    assert_eq!(answer.content, Persona::default().send_failure);
    assert!(!answer.streaming);
    assert!(app.notice().unwrap().contains("503"));
}

#[tokio::test]
async fn test_escape_cancels_running_turn() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::new(vec![vec![MockApiClient::text_frame("too late")]]);
    let mut app = app_with(mock, temp.path());

    app.submit_text("tell me a story".to_string());
    app.handle_key(key(KeyCode::Esc));

    assert!(app.active.is_none());
    assert!(!app.session().is_in_flight());
    let answer = app.session().messages().last().unwrap();
    assert!(!answer.streaming);
    assert_eq!(app.notice(), Some("Cancelled."));
}

#[tokio::test]
async fn test_regenerate_command_escalates_attempt() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::new(vec![
        vec![MockApiClient::text_frame("first")],
        vec![MockApiClient::text_frame("second")],
    ]);
    let mut app = app_with(mock.clone(), temp.path());

    app.submit_text("Capital of France?".to_string());
    settle(&mut app).await;
    app.submit_text("/regen".to_string());
    assert_eq!(app.session().cursor().attempts, 1);
    settle(&mut app).await;

    let messages = app.session().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].content, "second");
    assert!(app.header_text().contains("1st retry"));
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].system_instruction, requests[1].system_instruction);
}

#[tokio::test]
async fn test_regenerate_before_any_query_explains() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/regen".to_string());

    assert!(app.active.is_none());
    assert_eq!(app.notice(), Some("Nothing to regenerate yet."));
}

#[tokio::test]
async fn test_dictation_appends_to_parked_draft() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    type_text(&mut app, "Find");
    app.handle_key(key(KeyCode::F(2)));
    assert!(app.composer.is_empty());
    type_text(&mut app, "  a quiet cafe ");
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.composer.text(), "Find a quiet cafe");
    assert_eq!(app.input_mode, InputMode::Normal);
    assert!(app.active.is_none());
}

#[tokio::test]
async fn test_dictation_escape_restores_draft() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    type_text(&mut app, "keep me");
    app.handle_key(key(KeyCode::F(2)));
    type_text(&mut app, "noise");
    app.handle_key(key(KeyCode::Esc));

    assert_eq!(app.composer.text(), "keep me");
    assert_eq!(app.input_mode, InputMode::Normal);
}

#[tokio::test]
async fn test_settings_commands_update_session() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/web off".to_string());
    app.submit_text("/maps".to_string());
    app.submit_text("/model pro".to_string());
    app.submit_text("/theme".to_string());

    let settings = app.session().settings();
    assert!(!settings.use_search);
    assert!(settings.use_maps);
    assert_eq!(settings.model, ModelChoice::Pro);
    assert!(settings.dark_mode);
    assert!(app.header_text().contains("pro · web off · maps on"));
}

#[tokio::test]
async fn test_save_unsave_and_unknown_commands() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/save 1".to_string());
    assert_eq!(app.session().saved().len(), 1);
    app.submit_text("/save 1".to_string());
    assert_eq!(app.notice(), Some("#1 is already saved."));
    app.submit_text("/save 9".to_string());
    assert_eq!(app.notice(), Some("There is no message #9."));
    app.submit_text("/unsave 1".to_string());
    assert!(app.session().saved().is_empty());

    app.submit_text("/frobnicate".to_string());
    assert!(app.notice().unwrap().contains("/help"));
}

#[tokio::test]
async fn test_search_filters_visible_messages_and_send_clears_it() {
    let temp = TempDir::new().unwrap();
    let mock = MockApiClient::new(vec![
        vec![MockApiClient::text_frame("Paris.")],
        vec![MockApiClient::text_frame("Rome.")],
    ]);
    let mut app = app_with(mock, temp.path());
    app.submit_text("France?".to_string());
    settle(&mut app).await;

    app.submit_text("/search paris".to_string());
    let visible: Vec<usize> = app.visible_messages().iter().map(|(index, _)| *index).collect();
    assert_eq!(visible, vec![2]);

    app.submit_text("Italy?".to_string());
    assert!(app.search.is_none());
    settle(&mut app).await;
}

#[tokio::test]
async fn test_export_writes_transcript_file() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/export".to_string());

    let exports: Vec<_> = std::fs::read_dir(temp.path().join("exports"))
        .unwrap()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(exports.len(), 1);
    let body = std::fs::read_to_string(exports[0].path()).unwrap();
    assert!(body.contains(&Persona::default().welcome));
}

#[tokio::test]
async fn test_speak_without_content_explains() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/speak 5".to_string());
    assert_eq!(app.notice(), Some("Nothing to read out."));
}

#[tokio::test]
async fn test_speech_failure_uses_persona_line() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());

    app.submit_text("/speak".to_string());
    let update = app.update_rx.recv().await.unwrap();
    app.handle_update(update);
    assert_eq!(app.notice(), Some(Persona::default().speech_failure.as_str()));
}

#[tokio::test]
async fn test_double_interrupt_quits() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());
    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);

    app.handle_key(ctrl_c);
    assert!(!app.should_quit());
    app.handle_key(ctrl_c);
    assert!(app.should_quit());
}

#[tokio::test]
async fn test_frame_shows_header_history_and_draft() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());
    type_text(&mut app, "hi there");
    app.board.sync(app.session.messages(), Utc::now());

    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    terminal
        .draw(|frame| {
            app.draw_frame(frame);
        })
        .unwrap();
    let screen = screen_text(&terminal);

    assert!(screen.contains("Tappi · flash · web on · maps off"));
    assert!(screen.contains("#1 Tappi"));
    assert!(screen.contains("> hi there"));
    assert!(screen.contains("/help for commands"));
}

#[tokio::test]
async fn test_saved_panel_is_drawn_on_request() {
    let temp = TempDir::new().unwrap();
    let mut app = app_with(MockApiClient::default(), temp.path());
    app.submit_text("/save 1".to_string());
    app.submit_text("/saved".to_string());

    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    terminal
        .draw(|frame| {
            app.draw_frame(frame);
        })
        .unwrap();
    assert!(screen_text(&terminal).contains("Saved wisdom (1)"));

    app.handle_key(key(KeyCode::Esc));
    assert!(!app.show_saved);
}
