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

use super::input::InputState;
use crate::api::types::{ChatDetail, ModelsResponse};
use crate::api::{ApiClient, ChatStreamClient, ModelCatalog, StreamNotice};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::layout::{FrameLayout, HandleRegistry, LayoutObserver};
use crate::scroll::AutoscrollController;
use crate::session::ChatSession;
use ratatui::text::Line;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Ready,
    /// Fetching a saved chat.
    Loading,
    /// A reply is streaming in.
    Streaming,
    Error,
}

/// Everything that reaches the UI loop from background tasks.
#[derive(Debug)]
pub enum ClientEvent {
    /// A stream callback from turn number `turn`.
    Stream { turn: u64, notice: StreamNotice },
    /// The stream task for `turn` returned.
    StreamClosed { turn: u64 },
    HistoryLoaded(ChatDetail),
    HistoryFailed { error: AppError, message: String },
    ModelsLoaded(ModelsResponse),
    ModelsFailed(String),
}

/// Rendered lines of one message, valid while its key matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    content_hash: u64,
    width: u16,
    expanded: bool,
}

impl RenderKey {
    #[must_use]
    pub fn new(content: &str, width: u16, expanded: bool) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self { content_hash: hasher.finish(), width, expanded }
    }
}

#[derive(Default)]
pub struct RenderCache {
    entries: HashMap<String, (RenderKey, Vec<Line<'static>>, usize)>,
}

impl RenderCache {
    /// Cached lines and wrapped height for `message_id`, if `key` still matches.
    #[must_use]
    pub fn get(&self, message_id: &str, key: &RenderKey) -> Option<(&[Line<'static>], usize)> {
        self.entries
            .get(message_id)
            .filter(|(cached, _, _)| cached == key)
            .map(|(_, lines, height)| (lines.as_slice(), *height))
    }

    pub fn store(&mut self, message_id: &str, key: RenderKey, lines: Vec<Line<'static>>, height: usize) {
        self.entries.insert(message_id.to_owned(), (key, lines, height));
    }

    pub fn retain<'a>(&mut self, live_ids: impl IntoIterator<Item = &'a str>) {
        let live: HashSet<&str> = live_ids.into_iter().collect();
        self.entries.retain(|id, _| live.contains(id.as_str()));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[allow(clippy::struct_excessive_bools)]
pub struct App {
    pub session: ChatSession,
    pub scroll: AutoscrollController,
    pub observer: LayoutObserver,
    pub handles: HandleRegistry,
    /// Layout published by the last drawn frame.
    pub layout: Option<FrameLayout>,
    pub input: InputState,
    pub status: AppStatus,
    pub status_note: Option<String>,
    pub api: ApiClient,
    pub stream_client: ChatStreamClient,
    pub catalog: ModelCatalog,
    pub event_tx: mpsc::UnboundedSender<ClientEvent>,
    pub event_rx: mpsc::UnboundedReceiver<ClientEvent>,
    /// Incremented per submitted message; stale stream events are dropped.
    pub turn: u64,
    pub cancel: Option<CancellationToken>,
    /// User messages shown in full instead of collapsed.
    pub expanded: HashSet<String>,
    /// Attribute mutations produced by key handling, consumed after the next frame.
    pub pending_mutations: Vec<&'static str>,
    pub render_cache: RenderCache,
    /// Follow the bottom of the content until the user scrolls or submits.
    pub auto_scroll: bool,
    pub scroll_target: usize,
    pub scroll_pos: f32,
    pub scroll_offset: usize,
    /// Offset seen by the previous `after_frame`, to detect manual scrolling.
    pub last_scroll_offset: usize,
    pub user_scrolled: bool,
    /// Snap to the bottom on the next laid-out frame, without easing.
    pub jump_to_bottom: bool,
    pub spinner_frame: usize,
    pub should_quit: bool,
    pub force_redraw: bool,
    pub exit_error: Option<AppError>,
}

impl App {
    #[must_use]
    pub fn new(config: &AppConfig, chat_id: Option<String>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let policy = config.scroll;
        let observer = LayoutObserver::new(policy.resize_threshold, policy.resize_debounce());
        let mut scroll = AutoscrollController::new(policy);
        scroll.set_chat_id(chat_id.as_deref());
        Self {
            session: ChatSession::new(config.default_model.clone(), chat_id, config.persist_chats),
            scroll,
            observer,
            handles: HandleRegistry::new(),
            layout: None,
            input: InputState::new(),
            status: AppStatus::Ready,
            status_note: None,
            api: ApiClient::new(config.api_url.clone()),
            stream_client: ChatStreamClient::new(config.api_url.clone()),
            catalog: ModelCatalog::default(),
            event_tx,
            event_rx,
            turn: 0,
            cancel: None,
            expanded: HashSet::new(),
            pending_mutations: Vec::new(),
            render_cache: RenderCache::default(),
            auto_scroll: true,
            scroll_target: 0,
            scroll_pos: 0.0,
            scroll_offset: 0,
            last_scroll_offset: 0,
            user_scrolled: false,
            jump_to_bottom: true,
            spinner_frame: 0,
            should_quit: false,
            force_redraw: false,
            exit_error: None,
        }
    }

    /// Manual scroll by `rows` (negative is up).
    pub fn scroll_by(&mut self, rows: isize) {
        self.scroll_target = self.scroll_target.saturating_add_signed(rows);
        if rows < 0 {
            self.auto_scroll = false;
        }
        self.user_scrolled = true;
    }

    /// Drop all per-conversation view state.
    pub fn reset_view(&mut self) {
        self.handles.clear();
        self.observer.disconnect();
        self.render_cache.clear();
        self.expanded.clear();
        self.pending_mutations.clear();
        self.layout = None;
        self.auto_scroll = true;
        self.scroll_target = 0;
        self.scroll_pos = 0.0;
        self.scroll_offset = 0;
        self.last_scroll_offset = 0;
        self.user_scrolled = false;
        self.jump_to_bottom = true;
    }
}
