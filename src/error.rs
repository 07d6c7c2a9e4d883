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

use crate::api::{ApiError, StreamError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration")]
    InvalidConfig,
    #[error("Chat backend unreachable")]
    BackendUnreachable,
    #[error("Chat not found")]
    ChatNotFound,
    #[error("Backend rejected the request")]
    RequestRejected,
}

impl AppError {
    pub const INVALID_CONFIG_EXIT_CODE: i32 = 20;
    pub const BACKEND_UNREACHABLE_EXIT_CODE: i32 = 21;
    pub const CHAT_NOT_FOUND_EXIT_CODE: i32 = 22;
    pub const REQUEST_REJECTED_EXIT_CODE: i32 = 23;

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig => Self::INVALID_CONFIG_EXIT_CODE,
            Self::BackendUnreachable => Self::BACKEND_UNREACHABLE_EXIT_CODE,
            Self::ChatNotFound => Self::CHAT_NOT_FOUND_EXIT_CODE,
            Self::RequestRejected => Self::REQUEST_REJECTED_EXIT_CODE,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidConfig => {
                "The configuration file or a command-line override is invalid. Run with --log-file for details."
            }
            Self::BackendUnreachable => {
                "Could not reach the chat backend. Start it (default http://localhost:8000) or pass --api-url."
            }
            Self::ChatNotFound => "The requested chat was not found.",
            Self::RequestRejected => "The chat backend rejected the request.",
        }
    }

    /// Map a REST failure onto the process-level error it should exit with.
    #[must_use]
    pub fn from_api(err: &ApiError) -> Self {
        match err {
            ApiError::Network { .. } => Self::BackendUnreachable,
            ApiError::Status { status: 404, .. } => Self::ChatNotFound,
            ApiError::Status { .. } | ApiError::Decode(_) => Self::RequestRejected,
        }
    }

    #[must_use]
    pub fn from_stream(err: &StreamError) -> Self {
        match err {
            StreamError::Connect(_) | StreamError::Read(_) => Self::BackendUnreachable,
            StreamError::Status(404) => Self::ChatNotFound,
            StreamError::Status(_) => Self::RequestRejected,
        }
    }
}
