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
use super::types::{
    ChatDetail, ChatSummary, CreateChat, ModelInfo, ModelsResponse, OllamaStatus, RenameChat,
    Settings, SettingsUpdate,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

pub const MODEL_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to {context} (status {status})")]
    Status { context: &'static str, status: u16 },
    #[error("failed to decode backend response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// JSON CRUD wrappers over the backend's REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        let response = self.send(self.request(Method::GET, "/api/chats"), "fetch chats").await?;
        decode(response).await
    }

    pub async fn get_chat(&self, id: &str) -> Result<ChatDetail, ApiError> {
        let path = format!("/api/chats/{id}");
        let response = self.send(self.request(Method::GET, &path), "fetch chat").await?;
        decode(response).await
    }

    pub async fn create_chat(&self, title: &str, model: &str) -> Result<ChatSummary, ApiError> {
        let body = CreateChat { title: title.to_owned(), model: model.to_owned() };
        let request = self.request(Method::POST, "/api/chats").json(&body);
        decode(self.send(request, "create chat").await?).await
    }

    pub async fn rename_chat(&self, id: &str, title: &str) -> Result<ChatSummary, ApiError> {
        let path = format!("/api/chats/{id}");
        let request =
            self.request(Method::PATCH, &path).json(&RenameChat { title: title.to_owned() });
        decode(self.send(request, "rename chat").await?).await
    }

    pub async fn delete_chat(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/chats/{id}");
        self.send(self.request(Method::DELETE, &path), "delete chat").await?;
        Ok(())
    }

    pub async fn list_models(&self) -> Result<ModelsResponse, ApiError> {
        let response = self.send(self.request(Method::GET, "/api/models"), "fetch models").await?;
        decode(response).await
    }

    pub async fn get_settings(&self) -> Result<Settings, ApiError> {
        let response =
            self.send(self.request(Method::GET, "/api/settings"), "fetch settings").await?;
        decode(response).await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings, ApiError> {
        let request = self.request(Method::PATCH, "/api/settings").json(update);
        decode(self.send(request, "update settings").await?).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, join_url(&self.base_url, path))
    }

    async fn send(&self, request: RequestBuilder, context: &'static str) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|source| ApiError::Network {
            url: source.url().map_or_else(|| self.base_url.clone(), ToString::to_string),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "backend refused to {context}");
            return Err(ApiError::Status { context, status: status.as_u16() });
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(ApiError::Decode)
}

/// Model listing with a time-boxed cache.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
    ollama_status: OllamaStatus,
    fetched_at: Option<Instant>,
}

impl ModelCatalog {
    #[must_use]
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    #[must_use]
    pub fn ollama_status(&self) -> OllamaStatus {
        self.ollama_status
    }

    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        !self.models.is_empty()
            && self.fetched_at.is_some_and(|at| now.saturating_duration_since(at) < MODEL_CACHE_TTL)
    }

    pub fn store(&mut self, response: ModelsResponse, now: Instant) {
        self.models = response.models;
        self.ollama_status = response.ollama_status;
        self.fetched_at = Some(now);
    }

    /// Return the cached models, fetching again when stale or when `force` is set.
    pub async fn refresh(&mut self, api: &ApiClient, force: bool) -> Result<&[ModelInfo], ApiError> {
        let now = Instant::now();
        if !force && self.is_fresh(now) {
            return Ok(&self.models);
        }
        let response = api.list_models().await?;
        self.store(response, now);
        Ok(&self.models)
    }

    #[must_use]
    pub fn contains(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m.id == model_id)
    }
}
