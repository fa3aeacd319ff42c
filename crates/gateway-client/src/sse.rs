//! Line-oriented Server-Sent-Events reader.
//!
//! `event:` lines set a pending label; each `data:` line yields a frame at
//! once and clears that label. Blank lines and unrecognized prefixes are
//! skipped.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use tracing::{debug, trace};

use crate::errors::ClientError;

/// Default cap on one unterminated SSE line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send + 'static>>;

/// One logical SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Label from the preceding `event:` line, if any.
    pub event: Option<String>,
    /// Payload of the `data:` line; never empty.
    pub data: String,
}

/// Pull-based frame reader that owns the response body.
pub struct FrameReader {
    body: Option<ByteStream>,
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a newline.
    scanned: usize,
    max_line_bytes: usize,
    pending_event: Option<String>,
    eof: bool,
}

impl FrameReader {
    /// Wraps an arbitrary chunk stream.
    pub fn new<S>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        Self {
            body: Some(Box::pin(body)),
            buf: Vec::new(),
            scanned: 0,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            pending_event: None,
            eof: false,
        }
    }

    /// Wraps a successful HTTP response; read errors become transport errors.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| ClientError::from_reqwest(&e))),
        )
    }

    /// Overrides the longest line accepted before the stream fails.
    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    /// Returns the next frame, `Ok(None)` at end of body or after `close`.
    pub async fn next_frame(&mut self) -> Result<Option<SseFrame>, ClientError> {
        loop {
            while let Some(line) = self.take_line()? {
                if let Some(frame) = self.process_line(&line) {
                    return Ok(Some(frame));
                }
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                self.scanned = 0;
                let line = decode_line(&rest)?;
                return Ok(self.process_line(&line));
            }
            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };
            match body.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(err)) => return Err(err),
                None => self.eof = true,
            }
        }
    }

    /// Releases the response body. Returns `true` only on the call that
    /// actually released it.
    pub fn close(&mut self) -> bool {
        self.buf.clear();
        self.scanned = 0;
        self.pending_event = None;
        self.eof = true;
        match self.body.take() {
            Some(body) => {
                drop(body);
                debug!("released SSE response body");
                true
            }
            None => false,
        }
    }

    /// Whether the body has been released.
    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    fn take_line(&mut self) -> Result<Option<String>, ClientError> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buf.len();
            if self.buf.len() > self.max_line_bytes {
                return Err(ClientError::protocol(format!(
                    "SSE line exceeds {} bytes without a newline",
                    self.max_line_bytes
                )));
            }
            return Ok(None);
        };
        let idx = self.scanned + offset;
        self.scanned = 0;
        let raw: Vec<u8> = self.buf.drain(..=idx).collect();
        decode_line(&raw[..idx]).map(Some)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return None;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.pending_event = Some(strip_space(rest).to_string());
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let event = self.pending_event.take();
            let data = strip_space(rest);
            if data.is_empty() {
                trace!("skipping SSE frame with empty data");
                return None;
            }
            return Some(SseFrame {
                event,
                data: data.to_string(),
            });
        }
        trace!(line, "ignoring SSE line");
        None
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.close();
    }
}

fn decode_line(raw: &[u8]) -> Result<String, ClientError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .map_err(|e| ClientError::decode(format!("SSE line is not valid UTF-8: {e}")))
}

fn strip_space(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    /// Chunk stream that counts polls and drops, for release/idempotence checks.
    pub(crate) struct TrackedBody {
        chunks: std::collections::VecDeque<Result<Bytes, ClientError>>,
        pub(crate) polls: Arc<AtomicUsize>,
        pub(crate) drops: Arc<AtomicUsize>,
    }

    impl TrackedBody {
        pub(crate) fn new(chunks: Vec<Result<Bytes, ClientError>>) -> Self {
            Self {
                chunks: chunks.into(),
                polls: Arc::new(AtomicUsize::new(0)),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn from_text(text: &str, chunk_size: usize) -> Self {
            Self::new(
                text.as_bytes()
                    .chunks(chunk_size)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect(),
            )
        }
    }

    impl Stream for TrackedBody {
        type Item = Result<Bytes, ClientError>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(self.chunks.pop_front())
        }
    }

    impl Drop for TrackedBody {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn collect(reader: &mut FrameReader) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().await.expect("frame") {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let body = TrackedBody::new(vec![
            Ok(Bytes::from_static(b"event: message_start\ndata: {\"type\":\"mess")),
            Ok(Bytes::from_static(b"age_start\"}\n\ndata: [DO")),
            Ok(Bytes::from_static(b"NE]\n\n")),
        ]);
        let mut reader = FrameReader::new(body);
        let frames = collect(&mut reader).await;
        assert_eq!(
            frames,
            vec![
                SseFrame {
                    event: Some("message_start".into()),
                    data: r#"{"type":"message_start"}"#.into(),
                },
                SseFrame {
                    event: None,
                    data: "[DONE]".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn label_applies_to_next_data_line_only() {
        let text = "event: a\ndata: 1\ndata: 2\nevent: b\n\ndata: 3\n";
        let mut reader = FrameReader::new(TrackedBody::from_text(text, 4));
        let frames = collect(&mut reader).await;
        let labels: Vec<_> = frames.iter().map(|f| f.event.as_deref()).collect();
        assert_eq!(labels, vec![Some("a"), None, Some("b")]);
        let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
        assert_eq!(data, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn skips_comments_unknown_prefixes_and_empty_data() {
        let text = ": keep-alive\r\nid: 7\r\nretry: 100\r\ndata:\r\ndata: x\r\n\r\n";
        let mut reader = FrameReader::new(TrackedBody::from_text(text, 3));
        let frames = collect(&mut reader).await;
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "x".into(),
            }]
        );
    }

    #[tokio::test]
    async fn processes_trailing_line_without_newline() {
        let mut reader = FrameReader::new(TrackedBody::from_text("data: tail", 64));
        let frames = collect(&mut reader).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "tail");
        assert_eq!(reader.next_frame().await.expect("after eof"), None);
    }

    #[tokio::test]
    async fn overlong_line_is_a_protocol_error() {
        let body = TrackedBody::new(vec![
            Ok(Bytes::from_static(b"data: ok\ndata: aaaa")),
            Ok(Bytes::from_static(b"aaaaaaaa")),
            Ok(Bytes::from_static(b"aaaaaaaa\n")),
        ]);
        let mut reader = FrameReader::new(body).max_line_bytes(16);
        assert_eq!(
            reader.next_frame().await.expect("first").map(|f| f.data),
            Some("ok".to_string())
        );
        let err = reader.next_frame().await.expect_err("line too long");
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn line_within_limit_spanning_many_chunks_is_kept() {
        let mut reader =
            FrameReader::new(TrackedBody::from_text("data: 0123456789\n", 1)).max_line_bytes(32);
        let frames = collect(&mut reader).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "0123456789");
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let body = TrackedBody::new(vec![Ok(Bytes::from_static(b"data: \xff\xfe\n"))]);
        let mut reader = FrameReader::new(body);
        let err = reader.next_frame().await.expect_err("invalid utf8");
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn transport_errors_are_propagated() {
        let body = TrackedBody::new(vec![
            Ok(Bytes::from_static(b"data: 1\n")),
            Err(ClientError::Timeout("deadline".into())),
        ]);
        let mut reader = FrameReader::new(body);
        assert!(reader.next_frame().await.expect("first").is_some());
        assert!(matches!(
            reader.next_frame().await,
            Err(ClientError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn close_releases_body_once_and_stops_reading() {
        let body = TrackedBody::from_text("data: 1\ndata: 2\n", 64);
        let polls = body.polls.clone();
        let drops = body.drops.clone();
        let mut reader = FrameReader::new(body);
        assert!(reader.next_frame().await.expect("frame").is_some());

        assert!(reader.close());
        assert!(!reader.close());
        assert!(reader.is_closed());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let polls_at_close = polls.load(Ordering::SeqCst);
        assert_eq!(reader.next_frame().await.expect("closed"), None);
        assert_eq!(polls.load(Ordering::SeqCst), polls_at_close);
        drop(reader);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
