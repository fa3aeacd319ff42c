//! Pull-based event streams over an SSE response body.
//!
//! `EventStream` owns the frame reader, the cancellation check and the close
//! bookkeeping; a `FrameDecoder` turns frames into protocol events. The delta
//! and block protocols are two decoders over the same stream type.

mod block;
mod delta;

pub use block::{BlockDecoder, BlockStream, MessageAccumulator};
pub use delta::{DeltaDecoder, DeltaStream};

use futures::Stream;
use tracing::debug;

use crate::abort::AbortSignal;
use crate::errors::ClientError;
use crate::sse::{FrameReader, SseFrame};

/// Metadata of the successful response a stream was opened from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status of the response.
    pub status: u16,
    /// Correlation id echoed by the server, or the one that was sent.
    pub request_id: String,
}

/// What a decoder made of one frame.
#[derive(Debug)]
pub enum Decoded<E> {
    /// Deliver this event; keep reading afterwards.
    Event(E),
    /// Nothing to deliver; read the next frame.
    Skip,
    /// Terminal signal that carries no event.
    Done,
    /// Deliver this event, then close.
    Final(E),
}

/// Protocol strategy used by `EventStream`.
pub trait FrameDecoder {
    type Event;

    /// Decodes one frame. Errors are terminal for the stream.
    fn decode(
        &mut self,
        frame: &SseFrame,
        meta: &ResponseMeta,
    ) -> Result<Decoded<Self::Event>, ClientError>;

    /// Called when the body ends before a terminal signal.
    fn end_of_body(&mut self) -> Result<(), ClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Reading,
    Closed,
}

/// A live event stream; pull events with `next`.
///
/// Every terminal state (final event, clean end, error) is observed exactly
/// once; afterwards `next` returns `None` without touching the transport.
pub struct EventStream<D> {
    reader: FrameReader,
    decoder: D,
    abort: Option<AbortSignal>,
    meta: ResponseMeta,
    state: StreamState,
}

impl<D: FrameDecoder> EventStream<D> {
    pub(crate) fn new(
        reader: FrameReader,
        decoder: D,
        meta: ResponseMeta,
        abort: Option<AbortSignal>,
    ) -> Self {
        Self {
            reader,
            decoder,
            abort,
            meta,
            state: StreamState::Reading,
        }
    }

    /// Returns the next event, an error, or `None` once the stream is over.
    pub async fn next(&mut self) -> Option<Result<D::Event, ClientError>> {
        if self.state == StreamState::Closed {
            return None;
        }
        if self.abort.as_ref().is_some_and(AbortSignal::is_aborted) {
            self.close();
            return Some(Err(ClientError::Cancelled));
        }
        loop {
            let frame = match self.reader.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    let outcome = self.decoder.end_of_body();
                    self.close();
                    return outcome.err().map(Err);
                }
                Err(err) => {
                    self.close();
                    return Some(Err(err));
                }
            };
            match self.decoder.decode(&frame, &self.meta) {
                Ok(Decoded::Event(event)) => return Some(Ok(event)),
                Ok(Decoded::Skip) => continue,
                Ok(Decoded::Done) => {
                    self.close();
                    return None;
                }
                Ok(Decoded::Final(event)) => {
                    self.close();
                    return Some(Ok(event));
                }
                Err(err) => {
                    self.close();
                    return Some(Err(err));
                }
            }
        }
    }

    /// Closes the stream and releases the response body.
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        self.state = StreamState::Closed;
        self.reader.close();
        debug!(request_id = %self.meta.request_id, "gateway stream closed");
    }

    /// Whether the stream has reached a terminal state.
    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Response metadata, including the correlation id.
    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Correlation id of the call.
    pub fn request_id(&self) -> &str {
        &self.meta.request_id
    }

    /// Adapts the stream to `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = Result<D::Event, ClientError>> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|item| (item, stream))
        })
    }
}
