use crate::chat::ChatCompletionChunk;
use crate::classify::classify_in_band;
use crate::errors::ClientError;
use crate::sse::SseFrame;

use super::{Decoded, EventStream, FrameDecoder, ResponseMeta};

const DONE_SENTINEL: &str = "[DONE]";

/// Stream of delta-protocol chunks.
pub type DeltaStream = EventStream<DeltaDecoder>;

/// Decodes delta-protocol frames. `[DONE]` ends the stream without an event.
#[derive(Debug, Default)]
pub struct DeltaDecoder;

impl FrameDecoder for DeltaDecoder {
    type Event = ChatCompletionChunk;

    fn decode(
        &mut self,
        frame: &SseFrame,
        meta: &ResponseMeta,
    ) -> Result<Decoded<ChatCompletionChunk>, ClientError> {
        let data = frame.data.trim();
        if data == DONE_SENTINEL {
            return Ok(Decoded::Done);
        }
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| ClientError::decode(format!("invalid delta chunk JSON: {e}")))?;
        if let Some(err) = classify_in_band(meta.status, Some(meta.request_id.clone()), &value) {
            return Err(ClientError::Api(err));
        }
        let chunk = serde_json::from_value(value)
            .map_err(|e| ClientError::decode(format!("invalid delta chunk: {e}")))?;
        Ok(Decoded::Event(chunk))
    }

    fn end_of_body(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

impl EventStream<DeltaDecoder> {
    /// Drains the stream and concatenates the first choice's text.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            if let Some(text) = chunk?.text() {
                out.push_str(text);
            }
        }
        Ok(out)
    }
}
