//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, ApiError, BlockStreamEvent, CallOptions, ChatCompletionChunk,
    ChatCompletionRequest, ChatMessage, ClientConfig, ClientError, ContentBlock, GatewayClient,
    InputMessage, Message, MessageContent, MessagesRequest, OutboundRequest, init_tracing,
};
