//! SSE decoding for streaming completions
//!
//! Providers push `data:` frames, one JSON fragment per event, terminated by
//! a `data: [DONE]` sentinel. Frames may be split across transport chunks;
//! bytes are buffered until a full line boundary is seen. Keep-alive and
//! comment lines are skipped, and a frame that fails to parse is dropped
//! rather than killing the stream.

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::debug;

use super::ProviderError;
use super::wire::StreamChunk;

#[derive(Debug)]
enum SseFrame {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseFrame {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
        return SseFrame::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseFrame::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseFrame::Done;
    }
    if data.is_empty() {
        return SseFrame::Skip;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map_or(SseFrame::Skip, SseFrame::Delta),
        Err(error) => {
            debug!(%error, "dropping unparseable SSE frame");
            SseFrame::Skip
        }
    }
}

/// Decode a byte stream of SSE events into discrete text tokens
///
/// Ends on the `[DONE]` sentinel or when the transport closes. A transport
/// error yields one classified error item and then ends. Dropping the
/// returned stream drops `bytes`, which closes the underlying connection.
pub fn sse_text_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, ProviderError>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = String::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    while let Some(newline) = buffer.find('\n') {
                        let line: String = buffer.drain(..=newline).collect();
                        match parse_sse_line(line.trim_end_matches('\n')) {
                            SseFrame::Delta(text) => yield Ok(text),
                            SseFrame::Done => return,
                            SseFrame::Skip => {}
                        }
                    }
                }
                Err(error) => {
                    yield Err(ProviderError::network(format!(
                        "stream interrupted: {error}"
                    )));
                    return;
                }
            }
        }
    }
}
