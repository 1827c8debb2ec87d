//! Server-Sent Events (SSE) frame decoding for chat reply streams.
//!
//! Network reads return arbitrary byte boundaries that do not line up with
//! records on the wire.  [`FrameDecoder`] keeps a rolling text buffer so a
//! record split across reads is reassembled before it is classified, and
//! [`decode_frames`] lifts the decoder onto a byte stream.
//!
//! The decoder never fails.  Invalid UTF-8 is dropped and logged, and a
//! partial record left over when the stream ends is dropped and reported.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::observability::{
    DECODE_ANOMALIES, STREAM_BYTES, STREAM_ERRORS, STREAM_FRAMES, TRUNCATED_FRAMES,
};
use crate::{Error, Frame, Result};

/// Delimiter between records on the wire.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Incremental decoder from raw bytes to [`Frame`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    // Start of a multi-byte character whose remaining bytes are in the next read.
    pending_bytes: Vec<u8>,
    dropped_bytes: usize,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network read into the decoder.
    ///
    /// Returns every frame completed by this read, in wire order.  Text after
    /// the last delimiter is retained for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        STREAM_BYTES.count(chunk.len() as u64);
        self.decode_text(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].find(FRAME_DELIMITER) {
            let end = start + offset;
            frames.push(Frame::classify(&self.buffer[start..end]));
            start = end + FRAME_DELIMITER.len();
        }
        self.buffer.drain(..start);
        STREAM_FRAMES.count(frames.len() as u64);
        frames
    }

    /// Signals end of input.
    ///
    /// Returns the unterminated trailing record, if any.  It is never turned
    /// into a frame; the caller may report it as a truncation.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            warn!(
                dropped = self.pending_bytes.len(),
                "stream ended inside a UTF-8 sequence"
            );
            DECODE_ANOMALIES.click();
            self.dropped_bytes += self.pending_bytes.len();
            self.pending_bytes.clear();
        }
        let leftover = std::mem::take(&mut self.buffer);
        if leftover.trim().is_empty() {
            return None;
        }
        debug!(bytes = leftover.len(), "dropping unterminated trailing frame");
        TRUNCATED_FRAMES.click();
        Some(leftover)
    }

    /// Text received but not yet terminated by a delimiter.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Total number of bytes discarded as invalid UTF-8.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    fn decode_text(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(chunk);
        let mut input = bytes.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            let anomaly = Error::from(err);
                            warn!(dropped = len, "{anomaly}");
                            DECODE_ANOMALIES.click();
                            self.dropped_bytes += len;
                            input = &rest[len..];
                        }
                        None => {
                            self.pending_bytes = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// A stream of [`Frame`]s decoded from a byte stream.
///
/// Read errors from the underlying stream are passed through unchanged; the
/// caller decides whether they end the session.
pub struct FrameStream<S> {
    inner: S,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    truncated: Option<String>,
    exhausted: bool,
}

impl<S> FrameStream<S> {
    /// Returns the unterminated trailing record seen at end of input.
    ///
    /// Only meaningful once the stream has returned `None`.
    pub fn truncated(&self) -> Option<&str> {
        self.truncated.as_deref()
    }

    /// Returns true once the underlying byte stream has ended.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Total number of bytes discarded as invalid UTF-8 so far.
    pub fn dropped_bytes(&self) -> usize {
        self.decoder.dropped_bytes()
    }
}

/// Process a stream of bytes into a stream of frames.
///
/// ```
/// use bytes::Bytes;
/// use futures::{StreamExt, stream};
/// use streamchat::{FrameKind, decode_frames};
///
/// # tokio_test::block_on(async {
/// let chunks: Vec<streamchat::Result<Bytes>> = vec![
///     Ok(Bytes::from_static(b"data: {\"content\":\"Hi\"}\n")),
///     Ok(Bytes::from_static(b"\ndata: [DONE]\n\n")),
/// ];
/// let frames: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;
/// assert_eq!(frames.len(), 2);
/// assert!(frames[1].as_ref().is_ok_and(|frame| frame.kind == FrameKind::Terminator));
/// # });
/// ```
pub fn decode_frames<S>(byte_stream: S) -> FrameStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    FrameStream {
        inner: byte_stream,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        truncated: None,
        exhausted: false,
    }
}

impl<S> Stream for FrameStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Frame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.exhausted {
                return Poll::Ready(None);
            }
            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let frames = this.decoder.push(&bytes);
                    this.pending.extend(frames);
                }
                Poll::Ready(Some(Err(e))) => {
                    STREAM_ERRORS.click();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.exhausted = true;
                    this.truncated = this.decoder.finish();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameKind;
    use futures::stream;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes>> + Unpin {
        let items: Vec<Result<Bytes>> = parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part)))
            .collect();
        stream::iter(items)
    }

    async fn collect(parts: &[&[u8]]) -> Vec<Frame> {
        let frames: Vec<Result<Frame>> = decode_frames(chunks(parts)).collect().await;
        frames.into_iter().map(|frame| frame.unwrap()).collect()
    }

    #[tokio::test]
    async fn parse_data_and_done() {
        let frames = collect(&[b"data: {\"content\":\"Hi\"}\n\ndata: [DONE]\n\n"]).await;
        assert_eq!(
            frames,
            vec![Frame::data("{\"content\":\"Hi\"}"), Frame::terminator()]
        );
    }

    #[tokio::test]
    async fn handle_split_event() {
        let frames = collect(&[b"data: {\"cont", b"ent\":\"Hi\"}\n", b"\ndata: [DO", b"NE]\n\n"]).await;
        assert_eq!(
            frames,
            vec![Frame::data("{\"content\":\"Hi\"}"), Frame::terminator()]
        );
    }

    #[tokio::test]
    async fn non_data_records_are_ignorable() {
        let frames = collect(&[b"event: ping\n\n: comment\n\ndata: {}\n\n"]).await;
        let kinds: Vec<FrameKind> = frames.iter().map(|frame| frame.kind).collect();
        assert_eq!(
            kinds,
            vec![FrameKind::Ignorable, FrameKind::Ignorable, FrameKind::Data]
        );
    }

    #[test]
    fn empty_read_is_ignored() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"").is_empty());
        assert!(decoder.buffered().is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn partial_frame_is_retained() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"content\":").is_empty());
        assert_eq!(decoder.buffered(), "data: {\"content\":");
        let frames = decoder.push(b"\"x\"}\n\n");
        assert_eq!(frames, vec![Frame::data("{\"content\":\"x\"}")]);
        assert!(decoder.buffered().is_empty());
    }

    #[tokio::test]
    async fn truncated_trailing_frame_is_dropped() {
        let mut frames = decode_frames(chunks(&[b"data: {\"content\":\"a\"}\n\ndata: {\"con"]));
        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(first, Frame::data("{\"content\":\"a\"}"));
        assert!(frames.next().await.is_none());
        assert!(frames.is_exhausted());
        assert_eq!(frames.truncated(), Some("data: {\"con"));
    }

    #[tokio::test]
    async fn trailing_whitespace_is_not_truncation() {
        let mut frames = decode_frames(chunks(&[b"data: [DONE]\n\n\n"]));
        assert!(frames.next().await.unwrap().unwrap().is_terminator());
        assert!(frames.next().await.is_none());
        assert_eq!(frames.truncated(), None);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let text = "data: {\"content\":\"caf\u{e9} \u{1f600}\"}\n\n".as_bytes();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in text {
            frames.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(
            frames,
            vec![Frame::data("{\"content\":\"caf\u{e9} \u{1f600}\"}")]
        );
        assert_eq!(decoder.dropped_bytes(), 0);
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"content\":\"a\xffb\"}\n\n");
        assert_eq!(frames, vec![Frame::data("{\"content\":\"ab\"}")]);
        assert_eq!(decoder.dropped_bytes(), 1);
    }

    #[test]
    fn incomplete_utf8_at_end_of_input_is_dropped() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: [DONE]\n\n\xe2\x82").len() == 1);
        assert_eq!(decoder.finish(), None);
        assert_eq!(decoder.dropped_bytes(), 2);
    }

    #[test]
    fn frames_are_independent_of_chunking() {
        let wire = "data: {\"content\":\"Hi\"}\n\n\n: note\n\ndata: {\"content\":\" th\u{e9}re\"}\n\ndata: [DONE]\n\n"
            .as_bytes();
        let mut whole = FrameDecoder::new();
        let expected = whole.push(wire);
        for split in 0..=wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.push(&wire[..split]);
            frames.extend(decoder.push(&wire[split..]));
            assert_eq!(frames, expected, "split at byte {split}");
        }
    }

    #[tokio::test]
    async fn read_error_passes_through() {
        let items: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"content\":\"a\"}\n\n")),
            Err(Error::streaming("connection reset", None)),
        ];
        let mut frames = decode_frames(stream::iter(items));
        assert!(frames.next().await.unwrap().is_ok());
        let err = frames.next().await.unwrap().unwrap_err();
        assert!(err.is_streaming());
    }
}
