// chatpane - A terminal chat client for a local completion backend
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use crate::helpers::{chat_json, models_json, mount_sse, sse_body, sse_response};
use chatpane::app::{
    App, AppStatus, ClientEvent, after_frame, cancel_stream, handle_client_event,
    start_background_loads, submit_input,
};
use chatpane::config::AppConfig;
use chatpane::layout::LayoutSurface as _;
use chatpane::session::Role;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::task::LocalSet;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_for(server: &MockServer, chat_id: Option<&str>) -> App {
    let config = AppConfig { api_url: server.uri(), ..AppConfig::default() };
    App::new(&config, chat_id.map(str::to_owned))
}

async fn next_event(app: &mut App) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), app.event_rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("event channel closed")
}

/// Pump client events until the current turn's stream task has exited.
async fn drain_turn(app: &mut App) {
    loop {
        let event = next_event(app).await;
        let closed = matches!(event, ClientEvent::StreamClosed { turn } if turn == app.turn);
        handle_client_event(app, event);
        if closed {
            break;
        }
    }
}

#[tokio::test]
async fn submitted_message_streams_into_a_new_chat() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        "event: chat_created\ndata: {\"chat_id\":\"c7\"}",
        "data: {\"content\":\"Hello **wor\"}",
        "data: {\"content\":\"ld**\"}",
        "data: [DONE]",
    ]);
    mount_sse(&server, "/api/chat/new", body).await;

    let mut app = app_for(&server, None);
    LocalSet::new()
        .run_until(async {
            app.input.insert_str("hi there");
            submit_input(&mut app);
            assert_eq!(app.status, AppStatus::Streaming);
            assert!(app.scroll.state().has_submitted);
            drain_turn(&mut app).await;
        })
        .await;

    assert_eq!(app.status, AppStatus::Ready);
    assert!(!app.session.is_streaming());
    assert!(!app.scroll.is_streaming());
    assert_eq!(app.session.chat_id(), Some("c7"));
    assert_eq!(app.scroll.chat_id(), Some("c7"));
    let messages = app.session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hi there");
    assert_eq!(messages[1].content, "Hello **world**");
    assert!(app.input.is_empty());
}

#[tokio::test]
async fn second_turn_streams_to_the_adopted_chat() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        "/api/chat/new",
        sse_body(&["event: chat_created\ndata: {\"chat_id\":\"c7\"}", "data: {\"content\":\"one\"}", "data: [DONE]"]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/chat/c7"))
        .respond_with(sse_response(sse_body(&["data: {\"content\":\"two\"}", "data: [DONE]"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = app_for(&server, None);
    LocalSet::new()
        .run_until(async {
            app.input.insert_str("first");
            submit_input(&mut app);
            drain_turn(&mut app).await;
            app.input.insert_str("second");
            submit_input(&mut app);
            drain_turn(&mut app).await;
        })
        .await;

    let contents: Vec<&str> = app.session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "one", "second", "two"]);
    assert_eq!(app.turn, 2);
}

#[tokio::test]
async fn backend_error_ends_the_turn_with_a_note() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/new"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut app = app_for(&server, None);
    LocalSet::new()
        .run_until(async {
            app.input.insert_str("hi");
            submit_input(&mut app);
            drain_turn(&mut app).await;
        })
        .await;

    assert_eq!(app.status, AppStatus::Error);
    assert!(app.status_note.is_some());
    assert!(!app.session.is_streaming());
    assert!(app.session.messages()[1].content.contains("500"));
}

#[tokio::test]
async fn cancel_keeps_the_conversation_and_ignores_the_late_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            sse_response(sse_body(&["data: {\"content\":\"late\"}", "data: [DONE]"]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let config = AppConfig { api_url: server.uri(), persist_chats: false, ..AppConfig::default() };
    let mut app = App::new(&config, None);
    LocalSet::new()
        .run_until(async {
            app.input.insert_str("hi");
            submit_input(&mut app);
            cancel_stream(&mut app);
            assert_eq!(app.status, AppStatus::Ready);
            drain_turn(&mut app).await;
        })
        .await;

    assert_eq!(app.status_note.as_deref(), Some("Reply cancelled"));
    assert_eq!(app.session.messages().len(), 2);
    assert!(app.session.messages()[1].content.is_empty());
    assert!(app.session.chat_id().is_none());
}

#[tokio::test]
async fn background_loads_fill_history_and_models() {
    let server = MockServer::start().await;
    let mut detail = chat_json("c1", "First");
    detail["messages"] = json!([
        { "id": "m1", "chat_id": "c1", "role": "user", "content": "hi", "created_at": "2025-01-02T03:04:05" },
        { "id": "m2", "chat_id": "c1", "role": "assistant", "content": "hello", "created_at": "2025-01-02T03:04:06" },
    ]);
    Mock::given(method("GET"))
        .and(path("/api/chats/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_json()))
        .mount(&server)
        .await;

    let mut app = app_for(&server, Some("c1"));
    app.status = AppStatus::Loading;
    LocalSet::new()
        .run_until(async {
            start_background_loads(&app);
            for _ in 0..2 {
                let event = next_event(&mut app).await;
                handle_client_event(&mut app, event);
            }
        })
        .await;

    assert_eq!(app.status, AppStatus::Ready);
    assert_eq!(app.session.messages().len(), 2);
    assert_eq!(app.scroll.chat_id(), Some("c1"));
    assert!(app.catalog.contains("gemma3:1b"));
    assert!(app.status_note.is_none());
}

#[tokio::test]
async fn missing_chat_falls_back_to_a_new_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut app = app_for(&server, Some("gone"));
    LocalSet::new()
        .run_until(async {
            start_background_loads(&app);
            for _ in 0..2 {
                let event = next_event(&mut app).await;
                handle_client_event(&mut app, event);
            }
        })
        .await;

    assert_eq!(app.status, AppStatus::Error);
    assert!(app.session.chat_id().is_none());
    assert!(app.scroll.chat_id().is_none());
    assert!(app.status_note.as_deref().is_some_and(|note| note.contains("not found")));
}

#[tokio::test]
async fn streamed_reply_pins_the_new_message_near_the_top() {
    let server = MockServer::start().await;
    mount_sse(&server, "/api/chat/new", sse_body(&["data: {\"content\":\"short\"}"])).await;

    let mut app = app_for(&server, None);
    for i in 0..6 {
        app.session.begin_turn(&format!("earlier {i}"));
        app.session.apply_chunk(&"line\n\n".repeat(3));
        app.session.finish_turn();
    }

    let backend = ratatui::backend::TestBackend::new(60, 20);
    let mut terminal = ratatui::Terminal::new(backend).unwrap();
    LocalSet::new()
        .run_until(async {
            app.input.insert_str("latest question");
            submit_input(&mut app);
            // measure, scroll, then one frame to show the result
            for _ in 0..4 {
                terminal.draw(|f| chatpane::ui::render(f, &mut app)).unwrap();
                after_frame(&mut app, Instant::now());
            }
        })
        .await;

    assert!(app.scroll.spacer_height() > 0.0);
    let layout = app.layout.as_ref().unwrap();
    let (_, latest) = layout.elements()[layout.elements().len() - 2];
    // The new user message sits at the top of the viewport.
    let expected = latest.top - layout.list_offset();
    #[allow(clippy::cast_precision_loss)]
    let target = app.scroll_target as f64;
    assert!((target - expected).abs() <= 1.0, "scrolled to {target}, expected {expected}");
}
