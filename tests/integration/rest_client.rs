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
use crate::helpers::{chat_json, models_json};
use chatpane::api::types::{Provider, Settings, SettingsUpdate};
use chatpane::api::{ApiClient, ApiError, ModelCatalog};
use chatpane::error::AppError;
use chatpane::session::Role;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_chats_decodes_backend_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([chat_json("c1", "First"), chat_json("c2", "Second")])),
        )
        .mount(&server)
        .await;

    let chats = ApiClient::new(server.uri()).list_chats().await.unwrap();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].id, "c1");
    assert_eq!(chats[1].title, "Second");
    assert!(chats[0].updated_at > chats[0].created_at);
}

#[tokio::test]
async fn get_chat_includes_messages() {
    let server = MockServer::start().await;
    let mut detail = chat_json("c1", "First");
    detail["messages"] = json!([
        { "id": "m1", "chat_id": "c1", "role": "user", "content": "hi", "created_at": "2025-01-02T03:04:05" },
        { "id": "m2", "chat_id": "c1", "role": "assistant", "content": "hello", "created_at": "2025-01-02T03:04:06" },
    ]);
    Mock::given(method("GET"))
        .and(path("/api/chats/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(&server)
        .await;

    let chat = ApiClient::new(server.uri()).get_chat("c1").await.unwrap();
    assert_eq!(chat.summary.id, "c1");
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn missing_chat_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri()).get_chat("gone").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(AppError::from_api(&err), AppError::ChatNotFound);
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = ApiClient::new(server.uri()).list_chats().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(AppError::from_api(&err), AppError::RequestRejected);
}

#[tokio::test]
async fn create_rename_and_delete_send_expected_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .and(body_json(json!({ "title": "Plans", "model": "gemma3:1b" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_json("c3", "Plans")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/chats/c3"))
        .and(body_json(json!({ "title": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_json("c3", "Renamed")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chats/c3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri());
    let created = api.create_chat("Plans", "gemma3:1b").await.unwrap();
    assert_eq!(created.id, "c3");
    let renamed = api.rename_chat("c3", "Renamed").await.unwrap();
    assert_eq!(renamed.title, "Renamed");
    api.delete_chat("c3").await.unwrap();
}

#[tokio::test]
async fn settings_update_sends_only_changed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/settings"))
        .and(body_json(json!({ "default_model": "gpt-4o" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "default_model": "gpt-4o",
            "openai_enabled": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let update = SettingsUpdate { default_model: Some("gpt-4o".to_owned()), ..SettingsUpdate::default() };
    let settings = ApiClient::new(server.uri()).update_settings(&update).await.unwrap();
    assert_eq!(
        settings,
        Settings { default_model: "gpt-4o".to_owned(), openai_enabled: true, ..Settings::default() }
    );
}

#[tokio::test]
async fn model_catalog_serves_cache_until_forced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_json()))
        .expect(2)
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri());
    let mut catalog = ModelCatalog::default();
    let models = catalog.refresh(&api, false).await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[1].provider, Provider::Openai);

    // Fresh cache: no request.
    catalog.refresh(&api, false).await.unwrap();
    // Forced: second request.
    catalog.refresh(&api, true).await.unwrap();
    assert!(catalog.contains("gemma3:1b"));
}
