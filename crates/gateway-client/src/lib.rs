//! Async client for an AI gateway that fronts many model providers.
//!
//! Two streaming protocols are supported over Server-Sent Events:
//! the delta protocol (`/v1/chat/completions`, OpenAI-style chunks) and the
//! block protocol (`/v1/messages`, typed content blocks with thinking and
//! tool use). Failed responses are classified into typed `ApiError`
//! variants carrying the provider's structured detail.
//!
//! # Streaming a chat completion
//!
//! ```no_run
//! use gateway_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = GatewayClient::from_env()?;
//! let request = ChatCompletionRequest::new(
//!     "openai/gpt-4o-mini",
//!     vec![ChatMessage::user("Say hello")],
//! );
//!
//! let mut stream = client.stream_chat(request, CallOptions::default()).await?;
//! while let Some(chunk) = stream.next().await {
//!     if let Some(text) = chunk?.text() {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Handling classified errors
//!
//! ```no_run
//! use gateway_client::prelude::*;
//!
//! # async fn run(client: GatewayClient, request: MessagesRequest) {
//! match client.stream_messages(request, CallOptions::default()).await {
//!     Ok(stream) => { let _ = stream.collect_message().await; }
//!     Err(ClientError::Api(ApiError::RateLimit { retry_after_seconds, .. })) => {
//!         eprintln!("retry in {retry_after_seconds}s");
//!     }
//!     Err(err) => eprintln!("{err}"),
//! }
//! # }
//! ```

/// Cancellation handle and signal.
pub mod abort;
/// Delta-protocol request and chunk types.
pub mod chat;
/// Failed-response classification.
pub mod classify;
/// Client entry point and request executor.
pub mod client;
/// Client configuration.
pub mod config;
/// String-or-parts message content.
pub mod content;
/// Public error types.
pub mod errors;
/// Block-protocol request and event types.
pub mod messages;
/// Tracing subscriber setup for applications.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Outbound request and per-call options.
pub mod request;
/// Server-Sent-Events frame reader.
pub mod sse;
/// Protocol adapters over SSE frames.
pub mod stream;
mod wire;

pub use abort::{AbortHandle, AbortSignal};
pub use chat::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage};
pub use classify::{FailedResponse, classify};
pub use client::GatewayClient;
pub use config::ClientConfig;
pub use content::{ContentPart, MessageContent};
pub use errors::{ApiError, ApiErrorDetail, ClientError, ValidationError};
pub use messages::{BlockStreamEvent, ContentBlock, InputMessage, Message, MessagesRequest};
pub use observability::init_tracing;
pub use request::{CallOptions, OutboundRequest};
pub use sse::{FrameReader, SseFrame};
pub use stream::{BlockStream, DeltaStream, EventStream, MessageAccumulator, ResponseMeta};
