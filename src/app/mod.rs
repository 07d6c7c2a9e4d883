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

mod events;
mod input;
mod keys;
mod state;

pub use events::{handle_client_event, handle_terminal_event};
pub use input::InputState;
pub use state::{App, AppStatus, ClientEvent, RenderCache, RenderKey};

use crate::Cli;
use crate::api::{ChannelHandler, StreamRequest};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::layout::{FrameLayout, LayoutSurface, Recompute};
use crate::scroll::{ScrollBehavior, ScrollCommand};
use crossterm::event::{
    EventStream, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use futures::{FutureExt as _, StreamExt};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Build the interactive app from resolved configuration.
#[must_use]
pub fn create_app(cli: &Cli, config: &AppConfig) -> App {
    let mut app = App::new(config, cli.chat_id.clone());
    if cli.chat_id.is_some() {
        app.status = AppStatus::Loading;
    }
    app
}

/// Fetch the model list, and the saved chat when one was requested.
///
/// Must be called from within a `LocalSet`.
pub fn start_background_loads(app: &App) {
    let api = app.api.clone();
    let tx = app.event_tx.clone();
    tokio::task::spawn_local(async move {
        let event = match api.list_models().await {
            Ok(response) => ClientEvent::ModelsLoaded(response),
            Err(err) => ClientEvent::ModelsFailed(err.to_string()),
        };
        let _ = tx.send(event);
    });

    if let Some(chat_id) = app.session.chat_id().map(str::to_owned) {
        let api = app.api.clone();
        let tx = app.event_tx.clone();
        tokio::task::spawn_local(async move {
            let event = match api.get_chat(&chat_id).await {
                Ok(detail) => ClientEvent::HistoryLoaded(detail),
                Err(err) => {
                    tracing::error!(chat_id, "failed to load chat: {err}");
                    ClientEvent::HistoryFailed { error: AppError::from_api(&err), message: err.to_string() }
                }
            };
            let _ = tx.send(event);
        });
    }
}

// ---------------------------------------------------------------------------
// TUI event loop
// ---------------------------------------------------------------------------

pub async fn run_tui(app: &mut App) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    // Ignore errors on terminals without these features.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::EnableBracketedPaste,
        crossterm::event::EnableMouseCapture,
        // Needed for reliable Shift+Enter
        PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );

    let mut events = EventStream::new();
    let tick_duration = Duration::from_millis(16);
    let mut last_render = Instant::now();

    let result = loop {
        // Phase 1: wait for at least one event or the next frame tick
        let time_to_next = tick_duration.saturating_sub(last_render.elapsed());
        tokio::select! {
            Some(Ok(event)) = events.next() => {
                events::handle_terminal_event(app, event);
            }
            Some(event) = app.event_rx.recv() => {
                events::handle_client_event(app, event);
            }
            () = tokio::time::sleep(time_to_next) => {}
        }

        // Phase 2: drain everything already queued
        loop {
            if let Some(Some(Ok(event))) = events.next().now_or_never() {
                events::handle_terminal_event(app, event);
                continue;
            }
            match app.event_rx.try_recv() {
                Ok(event) => events::handle_client_event(app, event),
                Err(_) => break,
            }
        }

        if app.should_quit {
            break Ok(());
        }

        // Phase 3: render once, then let the scroll logic see the new frame
        if app.status == AppStatus::Streaming {
            app.spinner_frame = app.spinner_frame.wrapping_add(1);
        }
        if app.force_redraw {
            if let Err(err) = terminal.clear() {
                break Err(err.into());
            }
            app.force_redraw = false;
        }
        if let Err(err) = terminal.draw(|f| crate::ui::render(f, app)) {
            break Err(err.into());
        }
        last_render = Instant::now();
        after_frame(app, last_render);
    };

    cancel_stream(app);
    app.observer.disconnect();

    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableBracketedPaste,
        crossterm::event::DisableMouseCapture,
        PopKeyboardEnhancementFlags
    );
    ratatui::restore();

    result
}

/// Feed the frame just drawn to the layout observer and autoscroll controller.
pub fn after_frame(app: &mut App, now: Instant) {
    let App {
        session,
        scroll,
        observer,
        handles,
        layout,
        pending_mutations,
        ..
    } = app;
    let surface = layout.as_ref().map(|l| l as &dyn LayoutSurface);
    let messages = session.messages();

    let command = scroll.on_frame(messages, handles, surface);

    if let Some(frame) = layout.as_ref() {
        observer.sync_membership(&frame.rendered_handles());
        let mut recompute = false;
        for attribute in pending_mutations.drain(..) {
            recompute |= observer.on_attribute_mutation(attribute) == Recompute::Immediate;
        }
        recompute |= observer.observe_sizes(frame, now) == Recompute::Immediate;
        recompute |= observer.poll(now);
        if recompute {
            scroll.update_spacer_height(messages, handles, surface);
        }
    } else {
        pending_mutations.clear();
    }

    scroll.on_messages_changed(messages, handles, surface);
    scroll.on_content_changed(messages, surface);

    if app.user_scrolled || app.scroll_offset != app.last_scroll_offset {
        let surface = app.layout.as_ref().map(|l| l as &dyn LayoutSurface);
        app.scroll.on_user_scroll(surface);
        app.user_scrolled = false;
    }
    app.last_scroll_offset = app.scroll_offset;

    // A freshly loaded chat opens at its end.
    if app.jump_to_bottom
        && let Some(top) = app.layout.as_ref().map(FrameLayout::max_scroll)
    {
        app.jump_to_bottom = false;
        apply_scroll_command(app, ScrollCommand::instant(top));
    }

    if let Some(command) = command {
        apply_scroll_command(app, command);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn apply_scroll_command(app: &mut App, command: ScrollCommand) {
    tracing::debug!(top = command.top, "autoscroll");
    app.scroll_target = command.top.max(0.0).round() as usize;
    if command.behavior == ScrollBehavior::Instant {
        app.scroll_pos = app.scroll_target as f32;
    }
    app.auto_scroll = false;
}

/// Send the composed message and start streaming its reply.
pub fn submit_input(app: &mut App) {
    if app.session.is_streaming() {
        return;
    }
    if app.status == AppStatus::Loading {
        tracing::debug!("ignoring submit while the chat is loading");
        return;
    }
    let Some(text) = app.input.take_message() else {
        return;
    };
    let Some(request) = app.session.begin_turn(&text) else {
        return;
    };
    app.scroll.handle_new_user_message();
    app.scroll.set_streaming(true);
    app.auto_scroll = false;
    app.status = AppStatus::Streaming;
    app.status_note = None;
    start_stream(app, request);
}

fn start_stream(app: &mut App, request: StreamRequest) {
    app.turn += 1;
    let turn = app.turn;
    let token = CancellationToken::new();
    app.cancel = Some(token.clone());

    let client = app.stream_client.clone();
    let tx = app.event_tx.clone();
    tracing::info!(turn, chat_id = ?request.chat_id, model = %request.model, "starting reply stream");
    tokio::task::spawn_local(async move {
        let mut handler =
            ChannelHandler::new(tx.clone(), move |notice| ClientEvent::Stream { turn, notice });
        client.stream_chat(&request, &mut handler, &token).await;
        let _ = tx.send(ClientEvent::StreamClosed { turn });
    });
}

/// Stop the in-flight reply, keeping whatever already arrived.
pub fn cancel_stream(app: &mut App) {
    if let Some(token) = app.cancel.take() {
        tracing::debug!(turn = app.turn, "cancelling reply stream");
        token.cancel();
    }
    if app.session.finish_turn() {
        app.status_note = Some("Reply cancelled".to_owned());
    }
    end_stream(app);
}

pub(crate) fn end_stream(app: &mut App) {
    app.cancel = None;
    app.scroll.set_streaming(false);
    if app.status == AppStatus::Streaming {
        app.status = AppStatus::Ready;
    }
}

/// Leave the current conversation for a fresh one.
pub fn new_chat(app: &mut App) {
    cancel_stream(app);
    app.session.reset(None);
    app.scroll.set_chat_id(None);
    app.scroll.reset();
    app.reset_view();
    app.status = AppStatus::Ready;
    app.status_note = None;
}

/// Expand or collapse every long user message.
pub fn toggle_expanded(app: &mut App) {
    let long: Vec<String> = app
        .session
        .messages()
        .iter()
        .filter(|m| crate::ui::is_collapsible(m))
        .map(|m| m.id.clone())
        .collect();
    if long.is_empty() {
        return;
    }
    if long.iter().any(|id| !app.expanded.contains(id)) {
        app.expanded.extend(long);
    } else {
        app.expanded.clear();
    }
    app.pending_mutations.push("data-expanded");
}
