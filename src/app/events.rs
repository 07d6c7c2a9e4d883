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

use super::{App, AppStatus, ClientEvent, cancel_stream, end_stream, keys};
use crate::api::types::OllamaStatus;
use crate::api::StreamNotice;
use crate::error::AppError;
use crossterm::event::{Event, KeyEventKind, MouseEvent, MouseEventKind};
use std::time::Instant;

const MOUSE_SCROLL_LINES: isize = 3;

pub fn handle_terminal_event(app: &mut App, event: Event) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => keys::handle_key(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Paste(text) => app.input.insert_str(&text),
        // Resize is picked up by the next frame's layout
        _ => {}
    }
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_by(-MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollDown => app.scroll_by(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

pub fn handle_client_event(app: &mut App, event: ClientEvent) {
    match event {
        ClientEvent::Stream { turn, notice } => {
            if turn != app.turn {
                tracing::debug!(turn, current = app.turn, "dropping notice from stale stream");
                return;
            }
            handle_stream_notice(app, notice);
        }
        ClientEvent::StreamClosed { turn } => {
            // A body that ends without the done sentinel still ends the reply.
            if turn == app.turn && app.session.finish_turn() {
                tracing::debug!(turn, "stream closed without done marker");
                end_stream(app);
            }
        }
        ClientEvent::HistoryLoaded(detail) => {
            tracing::info!(chat_id = %detail.summary.id, messages = detail.messages.len(), "chat loaded");
            cancel_stream(app);
            app.session.load_history(detail);
            app.scroll.reset();
            app.scroll.set_chat_id(app.session.chat_id());
            app.reset_view();
            app.status = AppStatus::Ready;
        }
        ClientEvent::HistoryFailed { error, message } => {
            if error == AppError::ChatNotFound {
                cancel_stream(app);
                app.session.reset(None);
                app.scroll.reset();
                app.scroll.set_chat_id(None);
                app.reset_view();
            }
            app.status = AppStatus::Error;
            app.status_note = Some(format!("{} ({message})", error.user_message()));
        }
        ClientEvent::ModelsLoaded(response) => {
            let not_running = response.ollama_status == OllamaStatus::NotRunning;
            app.catalog.store(response, Instant::now());
            if not_running {
                app.status_note = Some("Ollama is not running; local models unavailable".to_owned());
            } else if !app.catalog.contains(app.session.model()) {
                app.status_note = Some(format!("Model {} is not available", app.session.model()));
            }
        }
        ClientEvent::ModelsFailed(message) => {
            tracing::warn!("model listing failed: {message}");
        }
    }
}

fn handle_stream_notice(app: &mut App, notice: StreamNotice) {
    match notice {
        StreamNotice::ChatCreated(chat_id) => {
            app.session.apply_chat_created(&chat_id);
            app.scroll.adopt_chat_id(&chat_id);
        }
        StreamNotice::Chunk(text) => app.session.apply_chunk(&text),
        StreamNotice::Done => {
            app.session.finish_turn();
            end_stream(app);
        }
        StreamNotice::Failed(err) => {
            app.session.fail_turn(&err);
            end_stream(app);
            app.status = AppStatus::Error;
            app.status_note = Some(AppError::from_stream(&err).user_message().to_owned());
        }
    }
}
