// Incremental framing of the stats stream.
//
// The daemon writes one JSON object per line but reads can split or merge lines arbitrarily.
// Frames are delimited by parsing exactly one complete JSON value off the front of the buffer,
// so correctness does not depend on chunk sizes or flush behaviour.

use bytes::{Buf, Bytes, BytesMut};
use serde::de::IgnoredAny;

pub enum Frame {
    /// Bytes of exactly one complete JSON value.
    Record(Bytes),
    /// A line that is not valid JSON, dropped through its newline.
    Malformed {
        skipped: Bytes,
        error: serde_json::Error,
    },
}

#[derive(Default)]
pub struct RecordDecoder {
    buf: BytesMut,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn remaining(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.iter().all(u8::is_ascii_whitespace)
    }

    /// Next complete frame, or `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let start = self
            .buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buf.len());
        self.buf.advance(start);
        if self.buf.is_empty() {
            return None;
        }

        let mut values = serde_json::Deserializer::from_slice(&self.buf).into_iter::<IgnoredAny>();
        match values.next()? {
            Ok(_) => {
                let end = values.byte_offset();
                Some(Frame::Record(self.buf.split_to(end).freeze()))
            }
            Err(e) if e.is_eof() => None,
            Err(error) => {
                // Resynchronise on the next line; wait if the bad line is still incomplete.
                let newline = self.buf.iter().position(|&b| b == b'\n')?;
                let skipped = self.buf.split_to(newline + 1).freeze();
                Some(Frame::Malformed { skipped, error })
            }
        }
    }
}
