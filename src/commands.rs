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

//! Non-interactive subcommands.

use crate::api::types::{ChatDetail, ChatSummary, ModelInfo, OllamaStatus, Settings, SettingsUpdate};
use crate::api::{
    ApiClient, ApiError, ChatStreamClient, ModelCatalog, StreamError, StreamHandler, StreamRequest,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::session::Role;
use crate::{ChatsCommand, Command};
use std::io::Write;
use tokio_util::sync::CancellationToken;

fn api_failure(err: &ApiError) -> anyhow::Error {
    tracing::error!("backend request failed: {err}");
    anyhow::Error::new(AppError::from_api(err)).context(err.to_string())
}

pub async fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let api = ApiClient::new(config.api_url.clone());
    match command {
        Command::Chats(sub) => run_chats(&api, sub, config).await,
        Command::Models { refresh } => {
            let mut catalog = ModelCatalog::default();
            catalog.refresh(&api, refresh).await.map_err(|e| api_failure(&e))?;
            if catalog.ollama_status() == OllamaStatus::NotRunning {
                eprintln!("warning: Ollama is not running; only hosted models are listed");
            }
            for model in catalog.models() {
                println!("{}", format_model_line(model, &config.default_model));
            }
            Ok(())
        }
        Command::Settings { default_model } => {
            let settings = match default_model {
                Some(model) => {
                    let update = SettingsUpdate { default_model: Some(model), ..Default::default() };
                    api.update_settings(&update).await
                }
                None => api.get_settings().await,
            }
            .map_err(|e| api_failure(&e))?;
            print!("{}", format_settings(&settings));
            Ok(())
        }
        Command::Send { message, chat } => {
            let request =
                StreamRequest { message, chat_id: chat, model: config.default_model.clone() };
            send(config, &request).await
        }
    }
}

async fn run_chats(api: &ApiClient, command: ChatsCommand, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        ChatsCommand::List => {
            let chats = api.list_chats().await.map_err(|e| api_failure(&e))?;
            if chats.is_empty() {
                println!("No saved chats.");
            }
            for chat in &chats {
                println!("{}", format_chat_line(chat));
            }
        }
        ChatsCommand::Show { id } => {
            let detail = api.get_chat(&id).await.map_err(|e| api_failure(&e))?;
            print!("{}", format_transcript(&detail));
        }
        ChatsCommand::Create { title } => {
            let chat =
                api.create_chat(&title, &config.default_model).await.map_err(|e| api_failure(&e))?;
            println!("{}", chat.id);
        }
        ChatsCommand::Rename { id, title } => {
            let chat = api.rename_chat(&id, &title).await.map_err(|e| api_failure(&e))?;
            println!("{}", format_chat_line(&chat));
        }
        ChatsCommand::Delete { id } => {
            api.delete_chat(&id).await.map_err(|e| api_failure(&e))?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

/// Streams a reply to a writer as it arrives.
struct WriterHandler<W: Write> {
    out: W,
    error: Option<StreamError>,
    created: Option<String>,
}

impl<W: Write> StreamHandler for WriterHandler<W> {
    fn on_chat_created(&mut self, chat_id: &str) {
        self.created = Some(chat_id.to_owned());
    }

    fn on_chunk(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!("failed to write reply chunk: {err}");
        }
    }

    fn on_done(&mut self) {
        if let Err(err) = writeln!(self.out).and_then(|()| self.out.flush()) {
            tracing::warn!("failed to finish reply output: {err}");
        }
    }

    fn on_error(&mut self, error: &StreamError) {
        self.error = Some(error.clone());
    }
}

async fn send(config: &AppConfig, request: &StreamRequest) -> anyhow::Result<()> {
    let client = ChatStreamClient::new(config.api_url.clone());
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut handler = WriterHandler { out: std::io::stdout(), error: None, created: None };
    client.stream_chat(request, &mut handler, &cancel).await;
    ctrl_c.abort();

    if let Some(chat_id) = handler.created {
        eprintln!("Saved as chat {chat_id}");
    }
    if let Some(err) = handler.error {
        return Err(anyhow::Error::new(AppError::from_stream(&err)).context(err.to_string()));
    }
    Ok(())
}

#[must_use]
pub fn format_chat_line(chat: &ChatSummary) -> String {
    format!(
        "{}  {}  [{}]  {}",
        chat.id,
        chat.updated_at.format("%Y-%m-%d %H:%M"),
        chat.model,
        chat.title
    )
}

#[must_use]
pub fn format_model_line(model: &ModelInfo, default_model: &str) -> String {
    let marker = if model.id == default_model { "*" } else { " " };
    let size = model.size.as_deref().map(|s| format!("  ({s})")).unwrap_or_default();
    format!("{marker} {}  {:?}{size}", model.id, model.provider)
}

#[must_use]
pub fn format_transcript(detail: &ChatDetail) -> String {
    let mut out = format!("# {}\n\n", detail.summary.title);
    for message in &detail.messages {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        out.push_str(&format!("{speaker}:\n{}\n\n", message.content.trim_end()));
    }
    out
}

#[must_use]
pub fn format_settings(settings: &Settings) -> String {
    let key_state = |key: &Option<String>| if key.is_some() { "set" } else { "unset" };
    format!(
        "default_model: {}\nopenai: {} (key {})\nanthropic: {} (key {})\ngoogle: {} (key {})\ngroq: {} (key {})\n",
        settings.default_model,
        settings.openai_enabled,
        key_state(&settings.openai_api_key),
        settings.anthropic_enabled,
        key_state(&settings.anthropic_api_key),
        settings.google_enabled,
        key_state(&settings.google_api_key),
        settings.groq_enabled,
        key_state(&settings.groq_api_key),
    )
}
