//! Integration tests for the retrying API client

use dephealth_client::{
    DepHealthClient, Ecosystem, Error, ErrorCode, NetworkConfig, RequestSpec, RiskLevel,
};
use mockito::Server;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn config(base_url: String) -> NetworkConfig {
    NetworkConfig {
        base_url,
        api_key: Some("dh_test".to_string()),
        timeout_ms: 2_000,
        max_retries: 3,
        retry_base_delay_ms: 1,
    }
}

/// Raw server that answers every request with `response` and hangs up
async fn truncating_server(response: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, accepted)
}

fn api_code(err: Error) -> ErrorCode {
    match err {
        Error::Api(e) => e.code,
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_package_encodes_scoped_name() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/packages/npm/%40types%2Fnode")
        .match_header("x-api-key", "dh_test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"package": "@types/node", "health_score": 91.5, "risk_level": "LOW"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let pkg = client.get_package(Ecosystem::Npm, "@types/node").await.unwrap();

    assert_eq!(pkg.health.package, "@types/node");
    assert_eq!(pkg.health.risk_level, Some(RiskLevel::Low));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_package_tolerates_unscored_package() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/packages/pypi/brand-new")
        .with_status(200)
        .with_body(
            r#"{"package": "brand-new", "ecosystem": "pypi", "health_score": null,
                "risk_level": null, "signals": {"weekly_downloads": 3, "stars": null},
                "advisories": [{"severity": "CRITICAL"}]}"#,
        )
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let detail = client.get_package(Ecosystem::Pypi, "brand-new").await.unwrap();

    assert_eq!(detail.health.risk_level, None);
    assert_eq!(detail.ecosystem, Some(Ecosystem::Pypi));
    assert_eq!(detail.signals.unwrap().weekly_downloads, Some(3));
    assert_eq!(detail.advisories[0].severity.as_deref(), Some("CRITICAL"));
}

#[tokio::test]
async fn test_persistent_server_error_uses_all_attempts() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/health")
        .with_status(503)
        .with_body(r#"{"error": {"message": "maintenance"}}"#)
        .expect(4)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let err = client.health().await.unwrap_err();

    match err {
        Error::Api(e) => {
            assert_eq!(e.code, ErrorCode::ServerError);
            assert_eq!(e.status, Some(503));
            assert_eq!(e.message, "maintenance");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_is_retried_and_keeps_retry_after() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/usage")
        .with_status(429)
        .with_header("retry-after", "120")
        .with_body(r#"{"message": "slow down"}"#)
        .expect(4)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    match client.usage().await.unwrap_err() {
        Error::Api(e) => {
            assert_eq!(e.code, ErrorCode::RateLimited);
            assert_eq!(e.message, "slow down");
            assert_eq!(e.retry_after, Some(Duration::from_secs(120)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let cases = [
        (400, ErrorCode::InvalidRequest),
        (401, ErrorCode::Unauthorized),
        (403, ErrorCode::Forbidden),
        (404, ErrorCode::NotFound),
        (418, ErrorCode::UnknownError),
    ];

    for (status, expected) in cases {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/packages/npm/lodash")
            .with_status(status)
            .expect(1)
            .create_async()
            .await;

        let client = DepHealthClient::new(&config(server.url())).unwrap();
        let err = client.get_package(Ecosystem::Npm, "lodash").await.unwrap_err();

        assert_eq!(api_code(err), expected, "status {}", status);
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_status_text_fallback() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/packages/npm/lodash")
        .with_status(404)
        .with_body("<html>not here</html>")
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    match client.get_package(Ecosystem::Npm, "lodash").await.unwrap_err() {
        Error::Api(e) => assert_eq!(e.message, "Not Found"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/health")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;
    let healthy = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status": "healthy", "version": "1.0.0"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let health = client.health().await.unwrap();

    assert_eq!(health.status, "healthy");
    failing.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_malformed_success_body_is_fatal() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("{not json")
        .expect(1)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let err = client.health().await.unwrap_err();

    assert!(matches!(err, Error::InvalidResponse { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_headers_surface() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("x-ratelimit-limit", "5000")
        .with_header("x-ratelimit-remaining", "4000")
        .with_body(r#"{"status": "healthy"}"#)
        .create_async()
        .await;

    let client = DepHealthClient::new(&config(server.url())).unwrap();
    let response = client
        .execute::<serde_json::Value>(&RequestSpec::get("/health"))
        .await
        .unwrap();

    let info = response.rate_limit.unwrap();
    assert_eq!(info.limit, 5000);
    assert_eq!(info.remaining, 4000);
    assert!(info.alert().is_none());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Grab a free port, then close it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut cfg = config(format!("http://{}", addr));
    cfg.max_retries = 1;
    let client = DepHealthClient::new(&cfg).unwrap();

    assert_eq!(api_code(client.health().await.unwrap_err()), ErrorCode::NetworkError);
}

#[tokio::test]
async fn test_unresponsive_server_times_out_each_attempt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let mut cfg = config(format!("http://{}", addr));
    cfg.timeout_ms = 100;
    cfg.max_retries = 2;
    let client = DepHealthClient::new(&cfg).unwrap();

    assert_eq!(api_code(client.health().await.unwrap_err()), ErrorCode::Timeout);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_truncated_error_body_keeps_status() {
    let (addr, accepted) = truncating_server(
        "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"error\"",
    )
    .await;

    let client = DepHealthClient::new(&config(format!("http://{}", addr))).unwrap();
    match client.health().await.unwrap_err() {
        Error::Api(e) => {
            assert_eq!(e.code, ErrorCode::Unauthorized);
            assert_eq!(e.status, Some(401));
            assert_eq!(e.message, "Unauthorized");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_truncated_success_body_is_network_error() {
    let (addr, accepted) = truncating_server(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"status\"",
    )
    .await;

    let mut cfg = config(format!("http://{}", addr));
    cfg.max_retries = 1;
    let client = DepHealthClient::new(&cfg).unwrap();

    assert_eq!(api_code(client.health().await.unwrap_err()), ErrorCode::NetworkError);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}
