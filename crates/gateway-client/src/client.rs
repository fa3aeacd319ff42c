use std::sync::Arc;

use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::chat::ChatCompletionRequest;
use crate::classify::{FailedResponse, REQUEST_ID_HEADER, classify};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::messages::MessagesRequest;
use crate::request::{CallOptions, OutboundRequest};
use crate::sse::FrameReader;
use crate::stream::{
    BlockDecoder, BlockStream, DeltaDecoder, DeltaStream, EventStream, FrameDecoder, ResponseMeta,
};

/// Path of the delta-protocol completion endpoint.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
/// Path of the block-protocol completion endpoint.
pub const MESSAGES_PATH: &str = "/v1/messages";

const JSON: &str = "application/json";

/// Async client for the gateway.
///
/// Cheap to clone; clones share the connection pool and configuration.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl GatewayClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Creates a client from `GATEWAY_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issues one request and decodes the JSON success body into `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: OutboundRequest,
    ) -> Result<T, ClientError> {
        let (response, meta) = self.execute(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ClientError::decode(format!(
                "invalid JSON response (request_id {}): {e}",
                meta.request_id
            ))
        })
    }

    /// Opens a delta-protocol stream on `/v1/chat/completions`.
    pub async fn stream_chat(
        &self,
        mut request: ChatCompletionRequest,
        options: CallOptions,
    ) -> Result<DeltaStream, ClientError> {
        request.validate()?;
        request.stream = true;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "opening delta stream"
        );
        self.open_stream(CHAT_COMPLETIONS_PATH, &request, options, DeltaDecoder)
            .await
    }

    /// Opens a block-protocol stream on `/v1/messages`.
    pub async fn stream_messages(
        &self,
        mut request: MessagesRequest,
        options: CallOptions,
    ) -> Result<BlockStream, ClientError> {
        request.validate()?;
        request.stream = true;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "opening block stream"
        );
        self.open_stream(MESSAGES_PATH, &request, options, BlockDecoder)
            .await
    }

    async fn open_stream<B, D>(
        &self,
        path: &str,
        body: &B,
        options: CallOptions,
        decoder: D,
    ) -> Result<EventStream<D>, ClientError>
    where
        B: serde::Serialize,
        D: FrameDecoder,
    {
        let abort = options.abort.clone();
        let request = OutboundRequest::post(path).json(body)?.options(options);
        let (response, meta) = self.execute(request).await?;
        Ok(EventStream::new(
            FrameReader::from_response(response),
            decoder,
            meta,
            abort,
        ))
    }

    /// Issues one request and returns the successful response.
    ///
    /// Status >= 400 is classified and returned as `ClientError::Api`; the
    /// body of a failed response is never handed to a decoder.
    pub async fn execute(
        &self,
        request: OutboundRequest,
    ) -> Result<(reqwest::Response, ResponseMeta), ClientError> {
        request.validate()?;
        let OutboundRequest {
            method,
            path,
            body,
            options,
        } = request;
        if options.abort.as_ref().is_some_and(|s| s.is_aborted()) {
            return Err(ClientError::Cancelled);
        }

        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let headers = self.build_headers(&request_id, &options.headers)?;
        let sent_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
            .unwrap_or(request_id);

        let url = self.config.url(&path);
        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        if let Some(body) = &body {
            let bytes =
                serde_json::to_vec(body).map_err(|e| ClientError::Serialize(e.to_string()))?;
            builder = builder.body(bytes);
        }
        if let Some(timeout) = options.timeout.or(self.config.timeout) {
            builder = builder.timeout(timeout);
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        debug!(request_id = %sent_id, %method, %url, "sending gateway request");
        let response = builder.send().await.map_err(|e| {
            let err = ClientError::from_reqwest(&e);
            warn!(request_id = %sent_id, error = %err, "gateway request failed");
            err
        })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let headers = response.headers().clone();
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        request_id = %sent_id,
                        status = status.as_u16(),
                        error = %ClientError::from_reqwest(&e),
                        "failed to read error response body; classifying without it"
                    );
                    bytes::Bytes::new()
                }
            };
            let mut err = classify(&FailedResponse {
                status: status.as_u16(),
                headers,
                body,
            });
            if err.detail().request_id.is_none() {
                err.detail_mut().request_id = Some(sent_id.clone());
            }
            warn!(
                request_id = %sent_id,
                status = status.as_u16(),
                error = %err,
                "gateway returned an error status"
            );
            return Err(ClientError::Api(err));
        }

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or(sent_id);
        debug!(request_id = %request_id, status = status.as_u16(), "gateway request succeeded");
        Ok((
            response,
            ResponseMeta {
                status: status.as_u16(),
                request_id,
            },
        ))
    }

    /// Defaults first, then caller overrides; the caller wins on collision.
    fn build_headers(
        &self,
        request_id: &str,
        overrides: &[(String, String)],
    ) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| ClientError::Config("api_key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        let user_agent = HeaderValue::from_str(&self.config.user_agent_value())
            .map_err(|_| ClientError::Config("user_agent is not a valid header value".into()))?;
        headers.insert(USER_AGENT, user_agent);
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderValue::from_str(request_id)
                .map_err(|_| ClientError::validation("request_id", "not a valid header value"))?,
        );

        for (name, value) in overrides {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ClientError::validation("headers", format!("invalid header name {name:?}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ClientError::validation("headers", format!("invalid value for header {name}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}
