//! HTTP gateway tests against a mock Apollo-style server.

#![cfg(feature = "remote")]

use mockito::{Matcher, Server};
use remote_config_watch::core::ChangeToken;
use remote_config_watch::prelude::*;
use remote_config_watch::sources::{HttpGateway, PropertiesParser};
use std::time::Duration;

fn gateway(address: &str) -> HttpGateway {
    HttpGateway::builder()
        .with_address(address)
        .with_app_id("orders")
        .with_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

fn notifications_query(namespace: &str, id: i64) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("appId".into(), "orders".into()),
        Matcher::UrlEncoded("cluster".into(), "default".into()),
        Matcher::UrlEncoded(
            "notifications".into(),
            format!(r#"[{{"namespaceName":"{namespace}","notificationId":{id}}}]"#),
        ),
    ])
}

#[tokio::test]
async fn test_fetch_properties_namespace() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/configs/orders/default/application")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"appId":"orders","cluster":"default","namespaceName":"application",
                "configurations":{"timeout":"100","port":"8080"},"releaseKey":"20240101-abc"}"#,
        )
        .create_async()
        .await;

    let remote = gateway(&server.url()).fetch_config("application").await.unwrap();

    assert_eq!(remote.content, "port=8080\ntimeout=100");
    assert_eq!(remote.change_token.as_str(), "20240101-abc");
    let properties = remote.properties.unwrap();
    assert_eq!(properties["port"], "8080");
    assert_eq!(properties["timeout"], "100");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_text_namespace() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/app.yaml")
        .with_status(200)
        .with_body(r#"{"configurations":{"content":"server:\n  port: 8080\n"},"releaseKey":"r2"}"#)
        .create_async()
        .await;

    let remote = gateway(&server.url()).fetch_config("app.yaml").await.unwrap();
    assert_eq!(remote.content, "server:\n  port: 8080\n");
}

#[tokio::test]
async fn test_fetch_missing_namespace() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/ns2")
        .with_status(404)
        .create_async()
        .await;

    let result = gateway(&server.url()).fetch_config("ns2").await;
    assert_eq!(result, Err(ConfigError::NotFoundError("ns2".to_string())));
}

#[tokio::test]
async fn test_fetch_server_error_is_transport() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/application")
        .with_status(500)
        .create_async()
        .await;

    let result = gateway(&server.url()).fetch_config("application").await;
    assert!(matches!(result, Err(ConfigError::TransportError(_))));
}

#[tokio::test]
async fn test_fetch_sends_bearer_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/configs/orders/default/application")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_body(r#"{"configurations":{},"releaseKey":"r1"}"#)
        .create_async()
        .await;

    let gateway = HttpGateway::builder()
        .with_address(server.url())
        .with_app_id("orders")
        .with_auth_token("secret")
        .build()
        .unwrap();

    let remote = gateway.fetch_config("application").await.unwrap();
    assert_eq!(remote.content, "");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_await_change_returns_new_notification_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/notifications/v2")
        .match_query(notifications_query("application", 41))
        .with_status(200)
        .with_body(r#"[{"namespaceName":"application","notificationId":42}]"#)
        .create_async()
        .await;

    let token = gateway(&server.url())
        .await_change("application", &ChangeToken::from("41"), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(token.as_str(), "42");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_await_change_not_modified_keeps_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(notifications_query("application", 7))
        .with_status(304)
        .create_async()
        .await;

    let since = ChangeToken::from("7");
    let token = gateway(&server.url())
        .await_change("application", &since, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(token, since);
}

#[tokio::test]
async fn test_await_change_sends_unknown_id_for_release_keys() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/notifications/v2")
        .match_query(notifications_query("application", -1))
        .with_status(200)
        .with_body(r#"[{"namespaceName":"application","notificationId":3}]"#)
        .create_async()
        .await;

    let token = gateway(&server.url())
        .await_change(
            "application",
            &ChangeToken::from("20240101-abc"),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(token.as_str(), "3");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_await_change_server_error_is_transport() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let result = gateway(&server.url())
        .await_change("application", &ChangeToken::from("1"), Duration::from_secs(1))
        .await;
    assert!(matches!(result, Err(ConfigError::TransportError(_))));
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let gateway = gateway("http://127.0.0.1:1");

    let result = gateway.fetch_config("application").await;
    assert!(matches!(result, Err(ConfigError::TransportError(_))));

    let result = gateway
        .await_change("application", &ChangeToken::from("1"), Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(ConfigError::TransportError(_))));
}

#[tokio::test]
async fn test_client_over_http() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/application")
        .with_status(200)
        .with_body(r#"{"configurations":{"server.port":"8080"},"releaseKey":"r1"}"#)
        .create_async()
        .await;

    let client = ConfigClient::builder()
        .with_gateway(gateway(&server.url()))
        .build()
        .unwrap();

    assert_eq!(
        client.get_internal_property("server.port").await.unwrap(),
        "8080"
    );
    assert_eq!(
        client.get_properties("application").await.unwrap(),
        "server.port=8080"
    );
}

#[tokio::test]
async fn test_internal_property_reads_text_namespace_content() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/mockDubbogo.yaml")
        .with_status(200)
        .with_body(
            r#"{"appId":"orders","cluster":"default","namespaceName":"mockDubbogo.yaml",
                "configurations":{"content":"dubbo:\n  application:\n     name: \"demo-server\"\n     version: \"2.0\"\n"},
                "releaseKey":"20191104105242-0f13805d89f834a4"}"#,
        )
        .create_async()
        .await;

    let client = ConfigClient::builder()
        .with_gateway(gateway(&server.url()))
        .with_default_namespace("mockDubbogo.yaml")
        .build()
        .unwrap();

    let document = client.get_internal_property("content").await.unwrap();
    assert!(document.starts_with("dubbo:\n  application:\n"));
    assert!(document.contains("name: \"demo-server\""));
    assert_eq!(
        client.get_properties("mockDubbogo.yaml").await.unwrap(),
        document
    );
}

#[tokio::test]
async fn test_served_keys_survive_separators_and_newlines() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/configs/orders/default/application")
        .with_status(200)
        .with_body(r#"{"configurations":{"db:url":"x","redis.nodes":"a:1\nb:2"},"releaseKey":"r1"}"#)
        .create_async()
        .await;

    let client = ConfigClient::builder()
        .with_gateway(gateway(&server.url()))
        .build()
        .unwrap();

    assert_eq!(client.get_internal_property("db:url").await.unwrap(), "x");
    assert_eq!(
        client.get_internal_property("redis.nodes").await.unwrap(),
        "a:1\nb:2"
    );

    let snapshot = client.snapshot("application").unwrap();
    let keys: Vec<&String> = snapshot.content().keys().collect();
    assert_eq!(keys, vec!["db:url", "redis.nodes"]);

    // The raw text parses back to the same map
    let raw = client.get_properties("application").await.unwrap();
    assert_eq!(&PropertiesParser.parse(&raw).unwrap(), snapshot.content());
}
