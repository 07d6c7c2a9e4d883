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

use crate::helpers::{Recorder, mount_sse, sse_body, sse_response};
use chatpane::api::{ChatStreamClient, StreamError, StreamHandler, StreamNotice, StreamRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(chat_id: Option<&str>) -> StreamRequest {
    StreamRequest {
        message: "hi".to_owned(),
        chat_id: chat_id.map(str::to_owned),
        model: "gemma3:1b".to_owned(),
    }
}

async fn run(client: &ChatStreamClient, request: &StreamRequest) -> Vec<StreamNotice> {
    let mut recorder = Recorder::default();
    client.stream_chat(request, &mut recorder, &CancellationToken::new()).await;
    recorder.notices
}

#[tokio::test]
async fn new_persisted_chat_reports_id_then_chunks_then_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        "event: chat_created\ndata: {\"chat_id\":\"c9\"}",
        "data: {\"content\":\"Hel\"}",
        "data: {\"content\":\"lo\"}",
        "data: [DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/api/chat/new"))
        .and(body_json(json!({ "message": "hi", "model": "gemma3:1b" })))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(Some("new"))).await;
    assert_eq!(
        notices,
        vec![
            StreamNotice::ChatCreated("c9".to_owned()),
            StreamNotice::Chunk("Hel".to_owned()),
            StreamNotice::Chunk("lo".to_owned()),
            StreamNotice::Done,
        ]
    );
}

#[tokio::test]
async fn ephemeral_stream_posts_without_chat_id() {
    let server = MockServer::start().await;
    mount_sse(&server, "/api/chat", sse_body(&["data: {\"content\":\"ok\"}", "data: [DONE]"]))
        .await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(None)).await;
    assert_eq!(notices, vec![StreamNotice::Chunk("ok".to_owned()), StreamNotice::Done]);
}

#[tokio::test]
async fn events_after_done_are_ignored() {
    let server = MockServer::start().await;
    let body = sse_body(&["data: {\"content\":\"a\"}", "data: [DONE]", "data: {\"content\":\"late\"}"]);
    mount_sse(&server, "/api/chat/c1", body).await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(Some("c1"))).await;
    assert_eq!(notices, vec![StreamNotice::Chunk("a".to_owned()), StreamNotice::Done]);
}

#[tokio::test]
async fn body_ending_without_done_is_not_an_error() {
    let server = MockServer::start().await;
    // Final line lacks its newline and must still be delivered.
    let body = "data: {\"content\":\"one\"}\n\ndata: {\"content\":\"two\"}".to_owned();
    mount_sse(&server, "/api/chat", body).await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(None)).await;
    assert_eq!(
        notices,
        vec![StreamNotice::Chunk("one".to_owned()), StreamNotice::Chunk("two".to_owned())]
    );
}

#[tokio::test]
async fn malformed_payloads_are_skipped() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        ": keep-alive",
        "data: {not json",
        "data: {\"content\":\"\"}",
        "data: {\"content\":\"x\"}",
        "data: [DONE]",
    ]);
    mount_sse(&server, "/api/chat", body).await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(None)).await;
    assert_eq!(notices, vec![StreamNotice::Chunk("x".to_owned()), StreamNotice::Done]);
}

#[tokio::test]
async fn http_status_failure_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ChatStreamClient::new(server.uri());
    let notices = run(&client, &request(Some("missing"))).await;
    assert_eq!(notices, vec![StreamNotice::Failed(StreamError::Status(404))]);
}

#[tokio::test]
async fn unreachable_backend_is_a_connect_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ChatStreamClient::new(uri);
    let notices = run(&client, &request(None)).await;
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], StreamNotice::Failed(StreamError::Connect(_))));
}

#[tokio::test]
async fn cancelling_before_the_response_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            sse_response(sse_body(&["data: {\"content\":\"x\"}", "data: [DONE]"]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = ChatStreamClient::new(server.uri());
    let cancel = CancellationToken::new();
    let mut recorder = Recorder::default();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    client.stream_chat(&request(None), &mut recorder, &cancel).await;
    assert!(recorder.notices.is_empty());
}

#[tokio::test]
async fn already_cancelled_token_never_calls_back() {
    let server = MockServer::start().await;
    mount_sse(&server, "/api/chat", sse_body(&["data: {\"content\":\"x\"}"])).await;

    let client = ChatStreamClient::new(server.uri());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut recorder = Recorder::default();
    client.stream_chat(&request(None), &mut recorder, &cancel).await;
    assert!(recorder.notices.is_empty());
}

/// Cancels the stream from inside the first chunk callback.
struct CancelOnFirstChunk {
    cancel: CancellationToken,
    notices: Vec<StreamNotice>,
}

impl StreamHandler for CancelOnFirstChunk {
    fn on_chunk(&mut self, text: &str) {
        self.notices.push(StreamNotice::Chunk(text.to_owned()));
        self.cancel.cancel();
    }

    fn on_done(&mut self) {
        self.notices.push(StreamNotice::Done);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.notices.push(StreamNotice::Failed(error.clone()));
    }
}

fn http_chunk(data: &str) -> String {
    format!("{:x}\r\n{data}\r\n", data.len())
}

#[tokio::test]
async fn cancel_mid_response_stops_before_the_next_event() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(http_chunk("data: {\"content\":\"a\"}\n\n").as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Written after the client has cancelled; must never be dispatched.
        let _ = socket.write_all(http_chunk("data: {\"content\":\"b\"}\n\n").as_bytes()).await;
        let _ = socket.write_all(http_chunk("data: [DONE]\n\n").as_bytes()).await;
        // Hold the connection open so only cancellation can end the stream.
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = ChatStreamClient::new(format!("http://{addr}"));
    let cancel = CancellationToken::new();
    let mut handler = CancelOnFirstChunk { cancel: cancel.clone(), notices: Vec::new() };
    tokio::time::timeout(
        Duration::from_secs(5),
        client.stream_chat(&request(None), &mut handler, &cancel),
    )
    .await
    .expect("cancelled stream should return promptly");

    assert!(cancel.is_cancelled());
    assert_eq!(handler.notices, vec![StreamNotice::Chunk("a".to_owned())]);
}
