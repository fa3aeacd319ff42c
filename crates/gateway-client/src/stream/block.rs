use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::classify::classify_in_band;
use crate::errors::ClientError;
use crate::messages::{BlockDelta, BlockStreamEvent, ContentBlock, EVENT_TYPES, Message};
use crate::sse::SseFrame;

use super::{Decoded, EventStream, FrameDecoder, ResponseMeta};

/// Stream of block-protocol events.
pub type BlockStream = EventStream<BlockDecoder>;

/// Decodes block-protocol frames.
///
/// Dispatch uses the payload's `type` field; the SSE `event:` label is only
/// compared for diagnostics. `message_stop` is delivered and then closes the
/// stream.
#[derive(Debug, Default)]
pub struct BlockDecoder;

impl FrameDecoder for BlockDecoder {
    type Event = BlockStreamEvent;

    fn decode(
        &mut self,
        frame: &SseFrame,
        meta: &ResponseMeta,
    ) -> Result<Decoded<BlockStreamEvent>, ClientError> {
        let value: serde_json::Value = serde_json::from_str(frame.data.trim())
            .map_err(|e| ClientError::decode(format!("invalid block event JSON: {e}")))?;
        let Some(kind) = value.get("type").and_then(|v| v.as_str()).map(str::to_owned) else {
            return Err(ClientError::decode("block event payload is missing `type`"));
        };

        if kind == "error" {
            return Err(
                match classify_in_band(meta.status, Some(meta.request_id.clone()), &value) {
                    Some(err) => ClientError::Api(err),
                    None => ClientError::decode("error event without an `error` object"),
                },
            );
        }
        if !EVENT_TYPES.contains(&kind.as_str()) {
            trace!(kind = %kind, "skipping unrecognized block event");
            return Ok(Decoded::Skip);
        }
        if let Some(label) = frame.event.as_deref()
            && label != kind
        {
            debug!(label, kind = %kind, "SSE event label disagrees with payload type");
        }

        let event: BlockStreamEvent = serde_json::from_value(value)
            .map_err(|e| ClientError::decode(format!("invalid {kind} event: {e}")))?;
        if matches!(event, BlockStreamEvent::MessageStop) {
            Ok(Decoded::Final(event))
        } else {
            Ok(Decoded::Event(event))
        }
    }

    fn end_of_body(&mut self) -> Result<(), ClientError> {
        Err(ClientError::protocol(
            "stream ended before message_stop was received",
        ))
    }
}

impl EventStream<BlockDecoder> {
    /// Drains the stream into a fully assembled message.
    pub async fn collect_message(mut self) -> Result<Message, ClientError> {
        let mut accumulator = MessageAccumulator::default();
        while let Some(event) = self.next().await {
            accumulator.push(&event?)?;
        }
        accumulator.finish()
    }
}

#[derive(Debug)]
struct PartialBlock {
    block: ContentBlock,
    input_json: String,
    open: bool,
}

/// Folds block-protocol events into a final `Message`.
///
/// Text, thinking and signature deltas are appended to their block; tool-use
/// `partial_json` fragments are joined and parsed when the block stops.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    message: Message,
    started: bool,
    blocks: BTreeMap<usize, PartialBlock>,
    completed: bool,
}

impl MessageAccumulator {
    /// Applies one event.
    pub fn push(&mut self, event: &BlockStreamEvent) -> Result<(), ClientError> {
        match event {
            BlockStreamEvent::MessageStart { message } => {
                if self.started {
                    return Err(ClientError::protocol("duplicate message_start"));
                }
                self.started = true;
                self.message = message.clone();
                for (index, block) in std::mem::take(&mut self.message.content)
                    .into_iter()
                    .enumerate()
                {
                    self.blocks.insert(
                        index,
                        PartialBlock {
                            block,
                            input_json: String::new(),
                            open: false,
                        },
                    );
                }
            }
            BlockStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if self.blocks.contains_key(index) {
                    return Err(ClientError::protocol(format!(
                        "content block {index} started twice"
                    )));
                }
                self.blocks.insert(
                    *index,
                    PartialBlock {
                        block: content_block.clone(),
                        input_json: String::new(),
                        open: true,
                    },
                );
            }
            BlockStreamEvent::ContentBlockDelta { index, delta } => {
                let partial = self.open_block(*index)?;
                apply_delta(partial, delta, *index)?;
            }
            BlockStreamEvent::ContentBlockStop { index } => {
                let partial = self.open_block(*index)?;
                partial.open = false;
                if let ContentBlock::ToolUse { input, .. } = &mut partial.block
                    && !partial.input_json.trim().is_empty()
                {
                    *input = serde_json::from_str(&partial.input_json).map_err(|e| {
                        ClientError::decode(format!(
                            "tool input for block {index} is not JSON: {e}"
                        ))
                    })?;
                }
            }
            BlockStreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.message.stop_reason = delta.stop_reason.clone();
                }
                if delta.stop_sequence.is_some() {
                    self.message.stop_sequence = delta.stop_sequence.clone();
                }
                if let Some(usage) = usage {
                    let current = &mut self.message.usage;
                    current.output_tokens = usage.output_tokens;
                    if usage.input_tokens > 0 {
                        current.input_tokens = usage.input_tokens;
                    }
                    if usage.cache_creation_input_tokens > 0 {
                        current.cache_creation_input_tokens = usage.cache_creation_input_tokens;
                    }
                    if usage.cache_read_input_tokens > 0 {
                        current.cache_read_input_tokens = usage.cache_read_input_tokens;
                    }
                }
            }
            BlockStreamEvent::MessageStop => self.completed = true,
        }
        Ok(())
    }

    /// Whether `message_stop` has been applied.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Returns the assembled message; fails if `message_stop` was never seen.
    pub fn finish(self) -> Result<Message, ClientError> {
        if !self.completed {
            return Err(ClientError::protocol(
                "message incomplete: message_stop was not received",
            ));
        }
        let mut message = self.message;
        message.content = self.blocks.into_values().map(|p| p.block).collect();
        Ok(message)
    }

    fn open_block(&mut self, index: usize) -> Result<&mut PartialBlock, ClientError> {
        match self.blocks.get_mut(&index) {
            Some(partial) if partial.open => Ok(partial),
            Some(_) => Err(ClientError::protocol(format!(
                "content block {index} is already stopped"
            ))),
            None => Err(ClientError::protocol(format!(
                "content block {index} was never started"
            ))),
        }
    }
}

fn apply_delta(
    partial: &mut PartialBlock,
    delta: &BlockDelta,
    index: usize,
) -> Result<(), ClientError> {
    match (&mut partial.block, delta) {
        (ContentBlock::Text { text }, BlockDelta::TextDelta { text: fragment }) => {
            text.push_str(fragment);
        }
        (
            ContentBlock::Thinking { thinking, .. },
            BlockDelta::ThinkingDelta { thinking: fragment },
        ) => {
            thinking.push_str(fragment);
        }
        (
            ContentBlock::Thinking { signature, .. },
            BlockDelta::SignatureDelta { signature: fragment },
        ) => {
            signature.push_str(fragment);
        }
        (ContentBlock::ToolUse { .. }, BlockDelta::InputJsonDelta { partial_json }) => {
            partial.input_json.push_str(partial_json);
        }
        (_, BlockDelta::Unknown) | (ContentBlock::Unknown, _) => {}
        (block, delta) => {
            return Err(ClientError::protocol(format!(
                "{} does not apply to the {} block at index {index}",
                delta_kind(delta),
                block_kind(block)
            )));
        }
    }
    Ok(())
}

fn delta_kind(delta: &BlockDelta) -> &'static str {
    match delta {
        BlockDelta::TextDelta { .. } => "text_delta",
        BlockDelta::ThinkingDelta { .. } => "thinking_delta",
        BlockDelta::SignatureDelta { .. } => "signature_delta",
        BlockDelta::InputJsonDelta { .. } => "input_json_delta",
        BlockDelta::Unknown => "unknown delta",
    }
}

fn block_kind(block: &ContentBlock) -> &'static str {
    match block {
        ContentBlock::Text { .. } => "text",
        ContentBlock::Thinking { .. } => "thinking",
        ContentBlock::RedactedThinking { .. } => "redacted_thinking",
        ContentBlock::ToolUse { .. } => "tool_use",
        ContentBlock::Unknown => "unknown",
    }
}
