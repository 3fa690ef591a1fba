//! Word-by-word replay of a finished completion
//!
//! The completion is already fully materialized; replay only re-emits it as a
//! sequence of frames so clients expecting progressive delivery can consume
//! it. For `n` words the sequence is `n` chunk frames, one terminal frame
//! with an empty payload and `finish_reason: "stop"`, then [`Frame::Done`].

use futures::stream::{self, Stream};
use serde::Serialize;
use std::time::Duration;

/// Default pause between frames
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Content carried by a chunk frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub content: String,
}

/// One unit of a replayed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A word (with trailing space), or the empty terminal payload
    Chunk {
        delta: Delta,
        index: usize,
        finish_reason: Option<&'static str>,
    },
    /// End-of-stream marker
    Done,
    /// In-band failure; the status line has already been sent
    Error(String),
}

#[derive(Serialize)]
struct ChunkBody<'a> {
    delta: &'a Delta,
    index: usize,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl Frame {
    fn chunk(content: String, index: usize, finish_reason: Option<&'static str>) -> Self {
        Frame::Chunk {
            delta: Delta { content },
            index,
            finish_reason,
        }
    }

    /// Whether this is the terminal `stop` frame
    pub fn is_stop(&self) -> bool {
        matches!(self, Frame::Chunk { finish_reason: Some("stop"), .. })
    }

    /// JSON payload of the frame; `[DONE]` for the end marker
    pub fn payload(&self) -> String {
        match self {
            Frame::Chunk {
                delta,
                index,
                finish_reason,
            } => json_or_fallback(&ChunkBody {
                delta,
                index: *index,
                finish_reason: *finish_reason,
            }),
            Frame::Done => "[DONE]".to_string(),
            Frame::Error(message) => json_or_fallback(&ErrorBody { error: message }),
        }
    }

    /// Encode as an event-stream record: `data: <payload>\n\n`
    pub fn to_event(&self) -> String {
        format!("data: {}\n\n", self.payload())
    }
}

fn json_or_fallback<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::error!("Failed to encode stream frame: {}", e);
        r#"{"error":"failed to encode frame"}"#.to_string()
    })
}

/// Split `text` on whitespace into the full frame sequence, without pacing
pub fn frames(text: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = text
        .split_whitespace()
        .enumerate()
        .map(|(index, word)| Frame::chunk(format!("{} ", word), index, None))
        .collect();
    let terminal_index = frames.len();
    frames.push(Frame::chunk(String::new(), terminal_index, Some("stop")));
    frames.push(Frame::Done);
    frames
}

/// Lazily replay `text`, pausing `delay` after each word frame.
///
/// The pause is a tokio sleep, so it only suspends this response.
pub fn replay(text: &str, delay: Duration) -> impl Stream<Item = Frame> + Send + 'static {
    let frames = frames(text);
    async_stream::stream! {
        for frame in frames {
            let is_word = matches!(frame, Frame::Chunk { .. }) && !frame.is_stop();
            yield frame;
            if is_word && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Stream carrying a single error frame
pub fn failed(message: impl Into<String>) -> impl Stream<Item = Frame> + Send + 'static {
    stream::once(futures::future::ready(Frame::Error(message.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_hello_world_frames() {
        let frames = frames("hello world");
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].payload(), r#"{"delta":{"content":"hello "},"index":0,"finish_reason":null}"#);
        assert_eq!(frames[1].payload(), r#"{"delta":{"content":"world "},"index":1,"finish_reason":null}"#);
        assert_eq!(frames[2].payload(), r#"{"delta":{"content":""},"index":2,"finish_reason":"stop"}"#);
        assert!(frames[2].is_stop());
        assert_eq!(frames[3], Frame::Done);
        assert_eq!(frames[3].to_event(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_frame_count_is_words_plus_two() {
        for text in ["", "one", "  spaced\tout \n words  ", "a b c d e f g h"] {
            let words = text.split_whitespace().count();
            assert_eq!(frames(text).len(), words + 2, "{:?}", text);
        }
    }

    #[test]
    fn test_empty_text_still_terminates() {
        let frames = frames("");
        assert!(frames[0].is_stop());
        assert_eq!(frames[1], Frame::Done);
    }

    #[test]
    fn test_error_frame_encoding() {
        let frame = Frame::Error("OpenAI API key not configured".to_string());
        assert_eq!(frame.to_event(), "data: {\"error\":\"OpenAI API key not configured\"}\n\n");
        assert!(!frame.is_stop());
    }

    #[tokio::test]
    async fn test_replay_yields_same_sequence() {
        let streamed: Vec<Frame> = replay("lazy frames here", Duration::ZERO).collect().await;
        assert_eq!(streamed, frames("lazy frames here"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_paces_word_frames() {
        let start = tokio::time::Instant::now();
        let streamed: Vec<Frame> = replay("a b c", Duration::from_millis(100)).collect().await;
        assert_eq!(streamed.len(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_failed_is_single_error_frame() {
        let streamed: Vec<Frame> = failed("boom").collect().await;
        assert_eq!(streamed, vec![Frame::Error("boom".to_string())]);
    }
}
