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

use crate::api::types::ChatDetail;
use crate::api::{StreamError, StreamRequest};
use crate::markdown::StreamingMarkdownAssembler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Chat id the backend treats as "create a chat for this message".
pub const NEW_CHAT_ID: &str = "new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Ids of messages currently receiving streamed content, scoped to one session.
#[derive(Debug, Default)]
pub struct StreamingRegistry {
    ids: HashSet<String>,
}

impl StreamingRegistry {
    pub fn start(&mut self, message_id: &str) {
        self.ids.insert(message_id.to_owned());
    }

    pub fn stop(&mut self, message_id: &str) {
        self.ids.remove(message_id);
    }

    #[must_use]
    pub fn is_streaming(&self, message_id: &str) -> bool {
        self.ids.contains(message_id)
    }

    #[must_use]
    pub fn any(&self) -> bool {
        !self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// One conversation: its messages and the reply currently streaming in.
#[derive(Debug)]
pub struct ChatSession {
    chat_id: Option<String>,
    model: String,
    persist: bool,
    messages: Vec<Message>,
    assembler: StreamingMarkdownAssembler,
    streaming: StreamingRegistry,
    reply_id: Option<String>,
}

impl ChatSession {
    /// `persist` chooses the persisted endpoint; without a chat id the first
    /// message then asks the backend to create one.
    #[must_use]
    pub fn new(model: impl Into<String>, chat_id: Option<String>, persist: bool) -> Self {
        Self {
            chat_id,
            model: model.into(),
            persist,
            messages: Vec::new(),
            assembler: StreamingMarkdownAssembler::new(),
            streaming: StreamingRegistry::default(),
            reply_id: None,
        }
    }

    #[must_use]
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn persists(&self) -> bool {
        self.persist
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn streaming(&self) -> &StreamingRegistry {
        &self.streaming
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming.any()
    }

    /// Append the user's message and an empty reply, and build the request
    /// that will stream into it.
    ///
    /// Returns `None` for blank input or while a reply is still streaming.
    pub fn begin_turn(&mut self, text: &str) -> Option<StreamRequest> {
        if text.trim().is_empty() || self.streaming.any() {
            return None;
        }

        self.messages.push(Message::new(Role::User, text));
        let reply = Message::new(Role::Assistant, String::new());
        self.streaming.start(&reply.id);
        self.reply_id = Some(reply.id.clone());
        self.messages.push(reply);
        self.assembler.reset();

        let chat_id = self
            .persist
            .then(|| self.chat_id.clone().unwrap_or_else(|| NEW_CHAT_ID.to_owned()));
        Some(StreamRequest { message: text.to_owned(), chat_id, model: self.model.clone() })
    }

    fn reply_mut(&mut self) -> Option<&mut Message> {
        let id = self.reply_id.as_deref()?;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    pub fn apply_chunk(&mut self, text: &str) {
        if self.reply_id.is_none() {
            tracing::debug!("chunk arrived with no reply in flight");
            return;
        }
        let rendered = self.assembler.push_chunk(text).to_owned();
        if let Some(reply) = self.reply_mut() {
            reply.content = rendered;
        }
    }

    pub fn apply_chat_created(&mut self, chat_id: &str) {
        tracing::info!(chat_id, "backend created chat");
        self.chat_id = Some(chat_id.to_owned());
    }

    /// Stop streaming the reply and keep the exact text the backend sent.
    ///
    /// Returns `false` when no reply was in flight.
    pub fn finish_turn(&mut self) -> bool {
        self.end_turn(None)
    }

    /// End the turn, leaving the failure visible in the reply.
    pub fn fail_turn(&mut self, error: &StreamError) {
        self.end_turn(Some(error));
    }

    fn end_turn(&mut self, error: Option<&StreamError>) -> bool {
        let Some(id) = self.reply_id.take() else {
            return false;
        };
        self.streaming.stop(&id);
        let raw = self.assembler.raw();
        if let Some(reply) = self.messages.iter_mut().rev().find(|m| m.id == id) {
            match error {
                None if !raw.is_empty() => raw.clone_into(&mut reply.content),
                None => {}
                Some(err) if reply.content.is_empty() => reply.content = format!("Error: {err}"),
                Some(err) => reply.content.push_str(&format!("\n\nError: {err}")),
            }
        }
        self.assembler.reset();
        true
    }

    /// Replace the conversation with a chat loaded from the backend.
    pub fn load_history(&mut self, detail: ChatDetail) {
        self.reset(Some(detail.summary.id));
        self.model = detail.summary.model;
        self.persist = true;
        self.messages = detail
            .messages
            .into_iter()
            .map(|record| Message {
                id: record.id,
                role: record.role,
                content: record.content,
                created_at: record.created_at,
            })
            .collect();
    }

    /// Start over with an empty conversation.
    pub fn reset(&mut self, chat_id: Option<String>) {
        self.chat_id = chat_id;
        self.messages.clear();
        self.assembler.reset();
        self.streaming.clear();
        self.reply_id = None;
    }
}
