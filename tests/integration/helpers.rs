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

use chatpane::api::{StreamError, StreamHandler, StreamNotice};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Join SSE frames into a response body.
pub fn sse_body(frames: &[&str]) -> String {
    frames.iter().map(|frame| format!("{frame}\n\n")).collect()
}

pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).insert_header("content-type", "text/event-stream").set_body_string(body)
}

/// Mount a POST handler at `route` that answers with `body` as an event stream.
pub async fn mount_sse(server: &MockServer, route: &str, body: String) {
    Mock::given(method("POST")).and(path(route)).respond_with(sse_response(body)).mount(server).await;
}

pub fn chat_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "model": "gemma3:1b",
        "created_at": "2025-01-02T03:04:05.123456",
        "updated_at": "2025-01-02T03:04:06",
    })
}

pub fn models_json() -> Value {
    json!({
        "models": [
            { "id": "gemma3:1b", "name": "Gemma 3 1B", "provider": "ollama", "size": "815MB" },
            { "id": "gpt-4o", "name": "GPT-4o", "provider": "openai" },
        ],
        "ollama_status": "running",
    })
}

/// Records every stream callback in arrival order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub notices: Vec<StreamNotice>,
}

impl StreamHandler for Recorder {
    fn on_chat_created(&mut self, chat_id: &str) {
        self.notices.push(StreamNotice::ChatCreated(chat_id.to_owned()));
    }

    fn on_chunk(&mut self, text: &str) {
        self.notices.push(StreamNotice::Chunk(text.to_owned()));
    }

    fn on_done(&mut self) {
        self.notices.push(StreamNotice::Done);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.notices.push(StreamNotice::Failed(error.clone()));
    }
}
