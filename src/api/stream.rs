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

use super::join_url;
use super::sse::{EventParser, LineDecoder, StreamEvent};
use futures::StreamExt as _;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Normalized failure of a streamed chat request.
///
/// Cancellation is never represented here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("failed to reach chat backend: {0}")]
    Connect(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("stream interrupted: {0}")]
    Read(String),
}

/// Receives the outcome of one streamed chat request.
pub trait StreamHandler {
    fn on_chat_created(&mut self, _chat_id: &str) {}
    fn on_chunk(&mut self, text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, _error: &StreamError) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub message: String,
    /// Persisted conversation to append to. `None` streams an ephemeral chat.
    pub chat_id: Option<String>,
    pub model: String,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    model: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

#[derive(Debug, Clone)]
pub struct ChatStreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatStreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    #[must_use]
    pub fn endpoint(&self, chat_id: Option<&str>) -> String {
        match chat_id {
            Some(id) => join_url(&self.base_url, &format!("/api/chat/{id}")),
            None => join_url(&self.base_url, "/api/chat"),
        }
    }

    /// Stream one reply into `handler`.
    ///
    /// Failures reach `on_error` exactly once. Cancelling `cancel` ends the
    /// stream quietly, and no callback fires once cancellation is observed.
    pub async fn stream_chat<H: StreamHandler + ?Sized>(
        &self,
        request: &StreamRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) {
        if let Err(err) = self.run(request, handler, cancel).await {
            if cancel.is_cancelled() {
                tracing::debug!("stream failed after cancellation, not reported: {err}");
                return;
            }
            tracing::warn!("chat stream failed: {err}");
            handler.on_error(&err);
        }
    }

    async fn run<H: StreamHandler + ?Sized>(
        &self,
        request: &StreamRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        let url = self.endpoint(request.chat_id.as_deref());
        tracing::debug!(url = %url, model = %request.model, "opening chat stream");
        let send = self
            .http
            .post(&url)
            .json(&ChatRequestBody { message: &request.message, model: &request.model })
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("chat stream cancelled before the response arrived");
                return Ok(());
            }
            result = send => result.map_err(|e| StreamError::Connect(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }

        let mut body = response.bytes_stream();
        let mut decoder = LineDecoder::default();
        let mut parser = EventParser::default();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("chat stream cancelled mid-response");
                    return Ok(());
                }
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| StreamError::Read(e.to_string()))?;
            for line in decoder.push(&chunk) {
                if dispatch_line(&mut parser, &line, handler, cancel) == Flow::Finished {
                    return Ok(());
                }
            }
        }

        if let Some(line) = decoder.finish() {
            dispatch_line(&mut parser, &line, handler, cancel);
        }
        tracing::debug!("chat stream closed by the backend");
        Ok(())
    }
}

fn dispatch_line<H: StreamHandler + ?Sized>(
    parser: &mut EventParser,
    line: &str,
    handler: &mut H,
    cancel: &CancellationToken,
) -> Flow {
    if cancel.is_cancelled() {
        return Flow::Finished;
    }
    match parser.parse_line(line) {
        Some(StreamEvent::Created { chat_id }) => handler.on_chat_created(&chat_id),
        Some(StreamEvent::Delta { text }) => handler.on_chunk(&text),
        Some(StreamEvent::Done) => {
            handler.on_done();
            return Flow::Finished;
        }
        None => {}
    }
    Flow::Continue
}

/// Stream callbacks as values, for handing across a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotice {
    ChatCreated(String),
    Chunk(String),
    Done,
    Failed(StreamError),
}

/// Forwards every callback into an mpsc channel, wrapping it with `wrap`.
pub struct ChannelHandler<T> {
    tx: mpsc::UnboundedSender<T>,
    wrap: Box<dyn Fn(StreamNotice) -> T>,
}

impl<T> ChannelHandler<T> {
    pub fn new(tx: mpsc::UnboundedSender<T>, wrap: impl Fn(StreamNotice) -> T + 'static) -> Self {
        Self { tx, wrap: Box::new(wrap) }
    }

    fn forward(&self, notice: StreamNotice) {
        if self.tx.send((self.wrap)(notice)).is_err() {
            tracing::debug!("stream notice dropped: receiver closed");
        }
    }
}

impl<T> StreamHandler for ChannelHandler<T> {
    fn on_chat_created(&mut self, chat_id: &str) {
        self.forward(StreamNotice::ChatCreated(chat_id.to_owned()));
    }

    fn on_chunk(&mut self, text: &str) {
        self.forward(StreamNotice::Chunk(text.to_owned()));
    }

    fn on_done(&mut self) {
        self.forward(StreamNotice::Done);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.forward(StreamNotice::Failed(error.clone()));
    }
}
