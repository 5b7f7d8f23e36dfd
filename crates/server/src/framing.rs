//! Newline-delimited framing over the read half of a connection.
//!
//! Lines are read as raw bytes under a hard length cap, so a peer that never
//! sends a newline cannot grow the buffer past `MAX_FRAME_LEN`. Decoding
//! happens after the cap. The rest of an oversize line is only drained on
//! the following read, so a caller that gives up on the peer never waits for
//! a newline that may not come.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::FrameError;

/// Longest accepted line in bytes, not counting the newline.
pub const MAX_FRAME_LEN: usize = 1024;

pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// The previous line overflowed; drop bytes up to its newline first.
    discard: bool,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(128),
            discard: false,
        }
    }

    /// Next line without its terminator. `Ok(None)` on a clean end of stream.
    /// An oversize line is reported once and the rest of it is skipped.
    pub async fn next_frame(&mut self) -> io::Result<Option<Result<String, FrameError>>> {
        if self.discard {
            self.skip_line().await?;
            self.discard = false;
        }
        self.buf.clear();
        let limit = MAX_FRAME_LEN as u64 + 1;
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        } else if n > MAX_FRAME_LEN {
            self.discard = true;
            return Ok(Some(Err(FrameError::TooLong)));
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        let frame = match std::str::from_utf8(&self.buf) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(FrameError::Encoding),
        };
        Ok(Some(frame))
    }

    async fn skip_line(&mut self) -> io::Result<()> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(idx) => {
                    self.inner.consume(idx + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> FrameReader<&[u8]> {
        FrameReader::new(bytes)
    }

    #[tokio::test]
    async fn test_splits_lines_and_strips_crlf() {
        let mut r = reader(b"alice|600\r\ne2e4\nlast");
        assert_eq!(r.next_frame().await.unwrap(), Some(Ok("alice|600".into())));
        assert_eq!(r.next_frame().await.unwrap(), Some(Ok("e2e4".into())));
        assert_eq!(r.next_frame().await.unwrap(), Some(Ok("last".into())));
        assert_eq!(r.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_reported_and_stream_continues() {
        let mut r = reader(b"e2\xffe4\ne2e4\n");
        assert_eq!(r.next_frame().await.unwrap(), Some(Err(FrameError::Encoding)));
        assert_eq!(r.next_frame().await.unwrap(), Some(Ok("e2e4".into())));
    }

    #[tokio::test]
    async fn test_oversize_line_is_skipped() {
        let mut bytes = vec![b'a'; MAX_FRAME_LEN * 3];
        bytes.extend_from_slice(b"\nd2d4\n");
        let mut r = reader(&bytes);
        assert_eq!(r.next_frame().await.unwrap(), Some(Err(FrameError::TooLong)));
        assert_eq!(r.next_frame().await.unwrap(), Some(Ok("d2d4".into())));
    }

    #[tokio::test]
    async fn test_line_at_cap_is_accepted() {
        let mut bytes = vec![b'a'; MAX_FRAME_LEN];
        bytes.push(b'\n');
        let mut r = reader(&bytes);
        let frame = r.next_frame().await.unwrap().unwrap().unwrap();
        assert_eq!(frame.len(), MAX_FRAME_LEN);
        assert_eq!(r.next_frame().await.unwrap(), None);
    }
}
