//! Pipe-delimited token framing over a byte stream.
//!
//! Wire format:
//! ```text
//! <token>|<token>|<token>|...
//! ```
//!
//! Buffers are fixed-size and owned by the caller. A token that does not fit
//! is a [`AutoregError::ShortBuffer`] error; the buffer never grows.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{AutoregError, AutoregResult};

/// Token terminator.
pub const DELIMITER: u8 = b'|';

/// Read into `buf` until the first delimiter shows up.
///
/// Returns `(token_end, consumed)`: the index of the delimiter and the number
/// of bytes placed in `buf` so far. Bytes after the delimiter are left in
/// `buf[token_end + 1..consumed]`.
pub async fn scan_one<R>(reader: &mut R, buf: &mut [u8]) -> AutoregResult<(usize, usize)>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(AutoregError::UnexpectedEof);
        }
        if let Some(j) = buf[filled..filled + n].iter().position(|&b| b == DELIMITER) {
            return Ok((filled + j, filled + n));
        }
        filled += n;
    }
    Err(AutoregError::ShortBuffer {
        capacity: buf.len(),
    })
}

/// Streaming token reader with a fixed-capacity buffer.
///
/// Tokens are yielded without their trailing delimiter. Leftover bytes after
/// a token are kept for the next call.
pub struct TokenReader<R> {
    inner: R,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl<R> TokenReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Read the next token.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between tokens and
    /// [`AutoregError::UnexpectedEof`] when it ends inside one.
    pub async fn next_token(&mut self) -> AutoregResult<Option<&[u8]>> {
        loop {
            if let Some(i) = self.buf[self.start..self.end]
                .iter()
                .position(|&b| b == DELIMITER)
            {
                let token_start = self.start;
                let token_end = self.start + i;
                self.start = token_end + 1;
                return Ok(Some(&self.buf[token_start..token_end]));
            }

            if self.start > 0 {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            }
            if self.end == self.buf.len() {
                return Err(AutoregError::ShortBuffer {
                    capacity: self.buf.len(),
                });
            }

            let n = self.inner.read(&mut self.buf[self.end..]).await?;
            if n == 0 {
                return if self.end == 0 {
                    Ok(None)
                } else {
                    Err(AutoregError::UnexpectedEof)
                };
            }
            self.end += n;
        }
    }

    /// Read the next token, treating a clean end of stream as an error.
    pub async fn expect_token(&mut self) -> AutoregResult<&[u8]> {
        self.next_token().await?.ok_or(AutoregError::UnexpectedEof)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
