use std::string::FromUtf8Error;

use crate::Result;

/// What a decoder made of one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Framing, keep-alive or an empty delta
    Skip,
    /// A text fragment to hand to the caller
    Delta(String),
    /// The vendor signalled the end of the stream, possibly with a final fragment
    Done(Option<String>),
}

/// Incremental decoder for one vendor's streaming dialect.
///
/// Lines arrive trimmed and never blank. Any error is terminal for the stream.
pub trait StreamDecoder: Send {
    fn decode_line(&mut self, line: &str) -> Result<Decoded>;

    /// Called once the body is exhausted, to reject a stream cut off mid-message
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reassembles lines from body chunks, however the network split them
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    closed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Mark the end of the body; the unterminated tail becomes the last line
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Next complete line without its terminator, if one is buffered
    pub fn next_line(&mut self) -> Option<std::result::Result<String, FromUtf8Error>> {
        let mut line = match self.pending.iter().position(|&byte| byte == b'\n') {
            Some(newline) => {
                let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
                line.pop();
                line
            }
            None if self.closed && !self.pending.is_empty() => std::mem::take(&mut self.pending),
            None => return None,
        };

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(String::from_utf8(line))
    }
}

/// Payload of an SSE `data:` field, with or without the space after the colon
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Value of an SSE `event:` field
pub(crate) fn sse_event(line: &str) -> Option<&str> {
    line.strip_prefix("event:").map(str::trim)
}

/// SSE comments and fields that carry no payload for us
pub(crate) fn is_sse_metadata(line: &str) -> bool {
    line.starts_with(':') || line.starts_with("id:") || line.starts_with("retry:")
}
