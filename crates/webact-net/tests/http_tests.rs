//! Tests for the HTTP client and the HTTP-backed connector.

use std::io::Write;
use std::time::Duration;

use webact_net::connector::ConnectorConfig;
use webact_net::NetworkError;

#[test]
fn test_config_http_client() {
    let config = ConnectorConfig {
        user_agent: Some("catalog-ui/2.1".into()),
        timeout_secs: None,
        ..ConnectorConfig::new("https://example.com")
    };
    let client = config.http_client().unwrap();
    assert_eq!(client.config().user_agent, "catalog-ui/2.1");
    assert_eq!(client.config().timeout, None);
    assert_eq!(client.config().default_headers["accept"], "application/json");
}

#[test]
fn test_config_http_client_defaults() {
    let client = ConnectorConfig::new("https://example.com").http_client().unwrap();
    assert!(client.config().user_agent.starts_with("webact/"));
    assert_eq!(client.config().timeout, Some(Duration::from_secs(30)));
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "base_url = \"https://example.com/content\"").unwrap();
    writeln!(file, "whoami_path = \"api/whoami\"").unwrap();

    let config = ConnectorConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(config.whoami_url(), "https://example.com/content/api/whoami");

    let missing = ConnectorConfig::from_toml_file(file.path().with_extension("missing"));
    assert!(matches!(missing, Err(NetworkError::Io(_))));
}

#[cfg(feature = "integration-tests")]
mod integration {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use webact_net::connector::Connector;
    use webact_net::http::{HttpClient, HttpMethod};
    use wiremock::matchers::{body_string, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/whoami"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "editor" })))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client
            .send(HttpMethod::Get, &format!("{}/whoami", mock_server.uri()), None)
            .await
            .expect("Request failed");

        assert_eq!(response.status(), 200);
        let user = response.json_or_null().await.unwrap();
        assert_eq!(user["name"], "editor");
    }

    #[tokio::test]
    async fn test_error_status_with_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/locked"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let result = client
            .send(HttpMethod::Get, &format!("{}/locked", mock_server.uri()), None)
            .await
            .unwrap()
            .error_for_status_with_body()
            .await;

        assert_eq!(
            result.unwrap_err(),
            NetworkError::HttpStatus {
                status: 403,
                message: Some("forbidden".into())
            }
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build client");

        let result = client
            .send(HttpMethod::Get, &format!("{}/slow", mock_server.uri()), None)
            .await;
        assert_eq!(result.unwrap_err(), NetworkError::Timeout);
    }

    #[tokio::test]
    async fn test_put_form_with_empty_answer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/docs"))
            .and(body_string("properties=%7B%7D"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let form = HashMap::from([("properties".to_string(), "{}".to_string())]);
        let client = HttpClient::new().unwrap();
        let response = client
            .send(HttpMethod::Put, &format!("{}/docs", mock_server.uri()), Some(&form))
            .await
            .unwrap()
            .error_for_status_with_body()
            .await
            .unwrap();
        assert_eq!(response.json_or_null().await.unwrap(), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_connector_load_and_save() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "class": "Folder",
                "title": "Docs",
                "children": [{ "name": "intro", "title": "Intro", "count": 0 }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/docs"))
            .and(body_string_contains("properties="))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let connector = Connector::new(mock_server.uri()).unwrap();
        let docs = connector.fetch("/docs").await.unwrap();
        assert_eq!(connector.tree().property(docs, "title"), Some(json!("Docs")));
        assert!(connector.tree().child_named(docs, "intro").is_some());

        connector.tree().set_field(docs, "title", "Manual").unwrap();
        let (sender, receiver) = tokio::sync::oneshot::channel();
        connector.save(move |result| {
            let _ = sender.send(result);
        });
        assert_eq!(receiver.await.unwrap(), Ok(1));
    }
}
