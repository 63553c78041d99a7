// src/exec/output.rs

//! Bounded capture of a child's stdout/stderr.
//!
//! Build logs can be huge; only the last `limit` bytes are kept, which is
//! where compiler errors usually are.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug)]
pub struct OutputBuffer {
    limit: usize,
    buf: VecDeque<u8>,
    dropped: usize,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            buf: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
        if self.buf.len() > self.limit {
            let excess = self.buf.len() - self.limit;
            self.buf.drain(..excess);
            self.dropped += excess;
        }
    }

    /// Bytes discarded from the front so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Captured text (lossy UTF-8), prefixed with a marker if truncated.
    pub fn into_string(self) -> String {
        let bytes: Vec<u8> = self.buf.into_iter().collect();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if self.dropped > 0 {
            format!("[... {} bytes truncated ...]\n{}", self.dropped, text)
        } else {
            text
        }
    }
}

/// Read `reader` to EOF into a bounded buffer.
///
/// Read errors end the capture early; whatever was read is kept.
pub async fn capture<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut out = OutputBuffer::new(limit);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => out.push(&chunk[..n]),
        }
    }
    out.into_string()
}
