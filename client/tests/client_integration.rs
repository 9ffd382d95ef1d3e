#![allow(clippy::unwrap_used, clippy::expect_used)]

use client::ConfigClient;
use mockito::{self, Matcher};
use serde_json::json;
use shared_types::{
    ClientContext, ConfigKey, CreateConfigRequest, ListFilter, UpdateConfigRequest, Variant,
};
use uuid::Uuid;

const ID: &str = "6f1c8a52-3f0e-4f1e-9c41-2b7d7e0f4a10";

fn item_json(value: &str, version: u64) -> serde_json::Value {
    json!({
        "id": ID,
        "app_id": "myapp",
        "namespace": "dev",
        "key": "database.url",
        "value": value,
        "description": "",
        "version": version,
        "is_active": true,
        "gray_release": false,
        "gray_rules": null,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
    })
}

fn id() -> Uuid {
    Uuid::parse_str(ID).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status":"healthy"}"#)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    assert!(client.health_check().await.unwrap());
}

#[tokio::test]
async fn test_create_config() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("POST", "/configs")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "app_id": "myapp",
            "namespace": "dev",
            "key": "database.url",
            "value": "postgres://db",
        })))
        .with_status(201)
        .with_body(item_json("postgres://db", 1).to_string())
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let request =
        CreateConfigRequest::new(&ConfigKey::new("myapp", "dev", "database.url"), "postgres://db");
    let item = client.create_config(&request).await.unwrap();

    assert_eq!(item.id, id());
    assert_eq!(item.version, 1);
}

#[tokio::test]
async fn test_create_config_conflict() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("POST", "/configs")
        .with_status(409)
        .with_body(r#"{"error":"Conflict","details":"exists"}"#)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let request = CreateConfigRequest::new(&ConfigKey::new("myapp", "dev", "database.url"), "x");
    let err = client.create_config(&request).await.unwrap_err();

    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn test_get_config_not_found() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", format!("/configs/{ID}").as_str())
        .with_status(404)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let result = client.get_config(id()).await;

    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_update_config() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("PUT", format!("/configs/{ID}").as_str())
        .match_body(Matcher::PartialJson(json!({ "value": "postgres://replica" })))
        .with_status(200)
        .with_body(item_json("postgres://replica", 2).to_string())
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let item = client
        .update_config(id(), &UpdateConfigRequest::new("postgres://replica"))
        .await
        .unwrap();

    assert_eq!(item.version, 2);
    assert_eq!(item.value, "postgres://replica");
}

#[tokio::test]
async fn test_delete_config() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("DELETE", format!("/configs/{ID}").as_str())
        .with_status(204)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    client.delete_config(id()).await.unwrap();
}

#[tokio::test]
async fn test_list_configs_sends_filters() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/configs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("app_id".into(), "myapp".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("size".into(), "5".into()),
        ]))
        .with_status(200)
        .with_body(json!([item_json("a", 1)]).to_string())
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let filter = ListFilter {
        app_id: Some("myapp".to_string()),
        namespace: None,
    };
    let items = client.list_configs(&filter, Some(2), Some(5)).await.unwrap();

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_list_versions() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", format!("/configs/{ID}/versions").as_str())
        .with_status(200)
        .with_body(
            json!([
                { "config_id": ID, "version": 2, "value": "b", "description": "", "created_at": "2024-05-01T10:05:00Z" },
                { "config_id": ID, "version": 1, "value": "a", "description": "", "created_at": "2024-05-01T10:00:00Z" },
            ])
            .to_string(),
        )
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let versions = client.list_versions(id()).await.unwrap();

    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, 2);
}

#[tokio::test]
async fn test_pull_with_context() {
    let mut server = mockito::Server::new_async().await;

    let mut body = item_json("gray-url", 3);
    body["variant"] = json!("gray");

    let _m = server
        .mock("GET", "/configs/pull")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("app_id".into(), "myapp".into()),
            Matcher::UrlEncoded("namespace".into(), "dev".into()),
            Matcher::UrlEncoded("key".into(), "database.url".into()),
            Matcher::UrlEncoded("client_id".into(), "node-1".into()),
            Matcher::UrlEncoded("client_tags".into(), "beta,canary".into()),
        ]))
        .with_status(200)
        .with_body(body.to_string())
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let context = ClientContext::new(
        Some("node-1".to_string()),
        ["canary".to_string(), "beta".to_string()],
    );
    let resolved = client
        .pull(&ConfigKey::new("myapp", "dev", "database.url"), Some(&context))
        .await
        .unwrap();

    assert_eq!(resolved.variant, Variant::Gray);
    assert_eq!(resolved.item.value, "gray-url");
}

#[tokio::test]
async fn test_pull_not_found() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/configs/pull")
        .match_query(Matcher::Any)
        .with_status(404)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let result = client
        .pull(&ConfigKey::new("myapp", "dev", "missing"), None)
        .await;

    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_server_error_carries_details() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/configs")
        .with_status(500)
        .with_body(r#"{"error":"Internal Server Error","details":"Storage failure: timed out"}"#)
        .create();

    let client = ConfigClient::new(server.url()).unwrap();
    let err = client
        .list_configs(&ListFilter::default(), None, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"));
}
