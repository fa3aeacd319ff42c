//! Block-protocol request and event types (`/v1/messages`).

use serde::{Deserialize, Serialize};

use crate::content::MessageContent;
use crate::errors::ValidationError;
use crate::wire::null_as_default;

/// One conversation turn sent to the block-protocol endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: MessageContent,
}

impl InputMessage {
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Extended-thinking budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub budget_tokens: u32,
}

impl ThinkingConfig {
    pub fn enabled(budget_tokens: u32) -> Self {
        Self {
            kind: "enabled".into(),
            budget_tokens,
        }
    }
}

/// Request body for a block-protocol completion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    /// Tool definitions, passed through untouched.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tools: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stream: bool,
    /// Provider-specific fields merged into the top-level body.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MessagesRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32, messages: Vec<InputMessage>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages,
            ..Self::default()
        }
    }

    pub fn system(mut self, system: impl Into<MessageContent>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig::enabled(budget_tokens));
        self
    }

    /// Cheap structural checks done before any network I/O.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::new("model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(ValidationError::new("max_tokens", "must be greater than zero"));
        }
        if self.messages.is_empty() {
            return Err(ValidationError::new("messages", "must not be empty"));
        }
        if let Some(thinking) = &self.thinking
            && thinking.budget_tokens >= self.max_tokens
        {
            return Err(ValidationError::new(
                "thinking.budget_tokens",
                "must be less than max_tokens",
            ));
        }
        Ok(())
    }
}

/// Event types of the block protocol, as carried in the payload `type` field.
pub const MESSAGE_START: &str = "message_start";
pub const CONTENT_BLOCK_START: &str = "content_block_start";
pub const CONTENT_BLOCK_DELTA: &str = "content_block_delta";
pub const CONTENT_BLOCK_STOP: &str = "content_block_stop";
pub const MESSAGE_DELTA: &str = "message_delta";
pub const MESSAGE_STOP: &str = "message_stop";

pub(crate) const EVENT_TYPES: [&str; 6] = [
    MESSAGE_START,
    CONTENT_BLOCK_START,
    CONTENT_BLOCK_DELTA,
    CONTENT_BLOCK_STOP,
    MESSAGE_DELTA,
    MESSAGE_STOP,
];

/// One block-protocol event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStreamEvent {
    /// Initial message skeleton, usually with empty content.
    MessageStart { message: Message },
    /// A new block opens at `index`.
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    /// Incremental data for the block at `index`.
    ContentBlockDelta { index: usize, delta: BlockDelta },
    /// The block at `index` is complete.
    ContentBlockStop { index: usize },
    /// Message-level updates (stop reason, output usage).
    MessageDelta {
        #[serde(default, deserialize_with = "null_as_default")]
        delta: MessageDeltaBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<MessageUsage>,
    },
    /// Terminal event; the stream ends after it is delivered.
    MessageStop,
}

impl BlockStreamEvent {
    /// Wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => MESSAGE_START,
            Self::ContentBlockStart { .. } => CONTENT_BLOCK_START,
            Self::ContentBlockDelta { .. } => CONTENT_BLOCK_DELTA,
            Self::ContentBlockStop { .. } => CONTENT_BLOCK_STOP,
            Self::MessageDelta { .. } => MESSAGE_DELTA,
            Self::MessageStop => MESSAGE_STOP,
        }
    }
}

/// A message as announced by `message_start` or assembled from a stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: MessageUsage,
}

impl Message {
    /// Concatenates all text blocks in order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }
}

/// A typed content block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
    },
    Thinking {
        #[serde(default, deserialize_with = "null_as_default")]
        thinking: String,
        #[serde(default, deserialize_with = "null_as_default")]
        signature: String,
    },
    RedactedThinking {
        #[serde(default, deserialize_with = "null_as_default")]
        data: String,
    },
    ToolUse {
        #[serde(default, deserialize_with = "null_as_default")]
        id: String,
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
        #[serde(default, deserialize_with = "null_as_default")]
        input: serde_json::Value,
    },
    /// Block kinds this client does not model.
    #[serde(other)]
    Unknown,
}

/// Incremental data for one block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    /// Fragment of a tool-use `input` document; only valid JSON once joined.
    InputJsonDelta { partial_json: String },
    /// Delta kinds this client does not model.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

/// Token usage for a block-protocol message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUsage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cache_read_input_tokens: u64,
}
