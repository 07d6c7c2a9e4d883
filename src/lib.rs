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

pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod layout;
pub mod markdown;
pub mod scroll;
pub mod session;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chatpane", version, about = "Terminal chat client for a local completion backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Backend base URL (default http://localhost:8000)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Model used for new messages
    #[arg(long, short, global = true)]
    pub model: Option<String>,

    /// Open an existing chat by ID
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Do not save the conversation on the backend
    #[arg(long)]
    pub ephemeral: bool,

    /// Config file (defaults to <config dir>/chatpane/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write tracing diagnostics to a file (disabled unless explicitly set)
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Tracing filter directives (example: `info,chatpane::scroll=trace`)
    /// Falls back to `RUST_LOG` when omitted.
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,

    /// Append to `--log-file` instead of truncating on startup
    #[arg(long, global = true)]
    pub log_append: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Manage saved chats
    #[command(subcommand)]
    Chats(ChatsCommand),
    /// List available models
    Models {
        /// Bypass the model cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show or change backend settings
    Settings {
        /// Set the default model
        #[arg(long)]
        default_model: Option<String>,
    },
    /// Send one message and stream the reply to stdout
    Send {
        message: String,
        /// Append to this chat instead of starting an ephemeral one
        #[arg(long)]
        chat: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ChatsCommand {
    /// List saved chats
    List,
    /// Print one chat's transcript
    Show { id: String },
    /// Create an empty chat
    Create {
        #[arg(long, default_value = "New Chat")]
        title: String,
    },
    /// Rename a chat
    Rename { id: String, title: String },
    /// Delete a chat
    Delete { id: String },
}
