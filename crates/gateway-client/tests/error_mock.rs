use std::time::Duration;

use gateway_client::prelude::*;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GatewayClient {
    GatewayClient::new(ClientConfig::new("test-api-key").base_url(server.uri())).expect("client")
}

fn chat_request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("openai/gpt-4o-mini", vec![ChatMessage::user("hello")])
}

async fn stream_error(server: &MockServer) -> ClientError {
    client(server)
        .stream_chat(chat_request(), CallOptions::default())
        .await
        .err()
        .expect("classified error")
}

#[tokio::test]
async fn rate_limit_uses_retry_after_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "60")
                .insert_header("X-Request-ID", "srv-429")
                .set_body_json(serde_json::json!({
                    "error": {"message": "slow down", "type": "rate_limit_exceeded"}
                })),
        )
        .mount(&server)
        .await;

    let err = stream_error(&server).await;
    match &err {
        ClientError::Api(ApiError::RateLimit {
            detail,
            retry_after_seconds,
        }) => {
            assert_eq!(*retry_after_seconds, 60);
            assert_eq!(detail.message, "slow down");
            assert_eq!(detail.status, 429);
            assert_eq!(detail.request_id.as_deref(), Some("srv-429"));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn insufficient_credits_details_are_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": {
                "message": "not enough credits",
                "type": "insufficient_credits",
                "details": {
                    "credits_required": 12.5,
                    "credits_remaining": 3,
                    "reset_date": "2026-11-01",
                    "band": "frontier"
                }
            }
        })))
        .mount(&server)
        .await;

    match stream_error(&server).await {
        ClientError::Api(ApiError::InsufficientCredits {
            detail,
            credits_required,
            credits_remaining,
            reset_date,
        }) => {
            assert_eq!(credits_required, 12.5);
            assert_eq!(credits_remaining, 3.0);
            assert_eq!(reset_date, "2026-11-01");
            assert_eq!(detail.status, 402);
            // No echoed id: the id that was sent is attached.
            assert!(detail.request_id.is_some());
        }
        other => panic!("expected insufficient credits, got {other:?}"),
    }
}

#[tokio::test]
async fn band_access_denied_on_the_block_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "message": "upgrade required",
                "type": "permission_error",
                "code": "band_access_denied",
                "details": {"band": "frontier", "required_tier": "pro", "current_tier": "free"}
            }
        })))
        .mount(&server)
        .await;

    let request = MessagesRequest::new("m", 64, vec![InputMessage::user("hi")]);
    let err = client(&server)
        .stream_messages(request, CallOptions::default())
        .await
        .err()
        .expect("band error");
    match err {
        ClientError::Api(ApiError::BandAccess {
            band,
            required_tier,
            current_tier,
            ..
        }) => {
            assert_eq!(band, "frontier");
            assert_eq!(required_tier, "pro");
            assert_eq!(current_tier, "free");
        }
        other => panic!("expected band access, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_server_error_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = stream_error(&server).await;
    match &err {
        ClientError::Api(ApiError::Generic(detail)) => {
            assert_eq!(detail.status, 500);
            assert!(!detail.message.is_empty());
        }
        other => panic!("expected generic error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn client_error_status_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "bad model", "type": "invalid_request_error", "param": "model"}
        })))
        .mount(&server)
        .await;

    let err = stream_error(&server).await;
    let api = err.api_error().expect("api error");
    assert_eq!(api.status(), 400);
    assert_eq!(api.detail().param, "model");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn send_json_decodes_success_and_reports_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "openai/gpt-4o-mini"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let models: serde_json::Value = client(&server)
        .send_json(OutboundRequest::get("/v1/models"))
        .await
        .expect("models");
    assert_eq!(models["data"][0]["id"], "openai/gpt-4o-mini");

    let err = client(&server)
        .send_json::<serde_json::Value>(OutboundRequest::get("/v1/broken"))
        .await
        .expect_err("decode failure");
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn truncated_error_body_still_yields_the_status() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 8192];
        let _ = socket.read(&mut buf).await;
        // Promise more body than is sent, then hang up mid-body.
        let _ = socket
            .write_all(
                b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 1000\r\nx-request-id: srv-502\r\n\r\n{\"error\":",
            )
            .await;
        let _ = socket.shutdown().await;
    });

    let config = ClientConfig::new("test-api-key").base_url(format!("http://{addr}"));
    let client = GatewayClient::new(config).expect("client");
    let err = client
        .stream_chat(chat_request(), CallOptions::default())
        .await
        .err()
        .expect("classified error");
    match err {
        ClientError::Api(ApiError::Generic(detail)) => {
            assert_eq!(detail.status, 502);
            assert_eq!(detail.message, "HTTP 502: Bad Gateway");
            assert_eq!(detail.request_id.as_deref(), Some("srv-502"));
        }
        other => panic!("expected generic error, got {other:?}"),
    }
}
