//! Server-Sent Events parsing for streamed completions.
//!
//! Buffers raw bytes, splits on `\n`, and yields the payload of every
//! `data:` line. Comments and blank lines are skipped; `[DONE]` ends the
//! stream. A byte stream that closes without `[DONE]` yields a final
//! [`SseEvent::Closed`] so callers can tell a clean finish from a cut-off.

use std::fmt::Display;

use futures::{Stream, StreamExt};

use terminalplex_shared::{Result, TerminalplexError};

/// Marker sent by OpenAI-compatible services after the last chunk.
const DONE_MARKER: &str = "[DONE]";

/// One item read from an SSE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line.
    Data(String),
    /// The connection closed before `[DONE]` arrived. Always the last item.
    Closed,
}

enum Line {
    Data(String),
    Done,
    Skip,
    NotUtf8,
}

struct Reader<S> {
    stream: S,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
}

/// Yield SSE events from a chunked byte stream.
///
/// Lines are only decoded once complete, so multi-byte characters split
/// across chunks survive. A transport error is yielded once and ends the
/// stream.
pub fn events<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let reader = Reader {
        stream: byte_stream,
        buffer: Vec::with_capacity(8192),
        eof: false,
        finished: false,
    };

    futures::stream::unfold(reader, |mut r| async move {
        if r.finished {
            return None;
        }

        loop {
            if let Some(newline_pos) = r.buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = r.buffer.drain(..=newline_pos).collect();
                match classify(&line_bytes) {
                    Line::Data(data) => return Some((Ok(SseEvent::Data(data)), r)),
                    Line::Done => return None,
                    Line::Skip => continue,
                    Line::NotUtf8 => {
                        r.finished = true;
                        return Some((Err(not_utf8()), r));
                    }
                }
            }

            if r.eof {
                // Final line without a trailing newline, then the close.
                let rest = std::mem::take(&mut r.buffer);
                return match classify(&rest) {
                    Line::Data(data) => Some((Ok(SseEvent::Data(data)), r)),
                    Line::Done => None,
                    Line::Skip => {
                        r.finished = true;
                        Some((Ok(SseEvent::Closed), r))
                    }
                    Line::NotUtf8 => {
                        r.finished = true;
                        Some((Err(not_utf8()), r))
                    }
                };
            }

            match r.stream.next().await {
                Some(Ok(chunk)) => r.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    r.finished = true;
                    let err = TerminalplexError::completion(format!("stream read failed: {e}"));
                    return Some((Err(err), r));
                }
                None => r.eof = true,
            }
        }
    })
}

fn not_utf8() -> TerminalplexError {
    TerminalplexError::completion("stream line is not valid UTF-8")
}

fn classify(line_bytes: &[u8]) -> Line {
    let Ok(line) = std::str::from_utf8(line_bytes) else {
        return Line::NotUtf8;
    };
    let line = line.trim();

    if line.is_empty() || line.starts_with(':') {
        return Line::Skip;
    }

    let Some(data) = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
    else {
        return Line::Skip;
    };

    match data.trim() {
        DONE_MARKER => Line::Done,
        "" => Line::Skip,
        payload => Line::Data(payload.to_string()),
    }
}
