//! Line and literal framing over a byte stream.
//!
//! Server output is a series of CRLF lines, except that a line ending in
//! `{n}` is followed by exactly `n` raw bytes before the line resumes.
//! [`FramedStream`] reads whole responses (line plus every literal), single
//! lines, or bounded pieces of a literal for streaming.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_CAPACITY: usize = 8 * 1024;

/// Longest line accepted outside a literal.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal the engine will accept from a server.
pub(crate) const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered reader and writer for one connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    line: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_CAPACITY, stream),
            line: BytesMut::with_capacity(READ_CAPACITY),
        }
    }

    /// Reads one response with all its literals inlined.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let first = self.read_line().await?;
        self.complete_response(first).await
    }

    /// Reads the rest of a response whose first line is `first`.
    pub async fn complete_response(&mut self, first: Vec<u8>) -> Result<Vec<u8>> {
        let mut response = first;
        let mut tail_start = 0;

        while let Some(len) = parse_literal_length(&response[tail_start..]) {
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;

            let next = self.read_line().await?;
            tail_start = response.len();
            response.extend_from_slice(&next);
        }

        Ok(response)
    }

    /// Reads up to and including the next CRLF.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        self.line.clear();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(closed());
            }

            // a CR may end one read and its LF start the next
            let scan_from = self.line.len().saturating_sub(1);
            self.line.extend_from_slice(buf);
            let read = buf.len();

            if let Some(pos) = find_crlf(&self.line[scan_from..]) {
                let end = scan_from + pos + 2;
                let surplus = self.line.len() - end;
                self.reader.consume(read - surplus);
                self.line.truncate(end);
                return Ok(self.line.split().to_vec());
            }

            self.reader.consume(read);
            if self.line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Reads at most `max` bytes, stopping after the first LF.
    ///
    /// The caller passes the number of literal bytes still unread, so the
    /// read never runs past the end of the literal.
    pub async fn read_line_limited(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        while line.len() < max {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(closed());
            }

            let window = &buf[..(max - line.len()).min(buf.len())];
            let take = window
                .iter()
                .position(|&b| b == b'\n')
                .map_or(window.len(), |pos| pos + 1);
            line.extend_from_slice(&window[..take]);
            self.reader.consume(take);

            if line.ends_with(b"\n") || line.len() > MAX_LINE_LENGTH {
                break;
            }
        }

        Ok(line)
    }

    /// Writes `data` and flushes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts the write half down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Returns the transport. Unread buffered bytes are discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed",
    ))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Length announced by a trailing `{n}` or `{n+}` on a CRLF line.
pub fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\nA1 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_line().await.unwrap(), b"A1 OK done\r\n");
    }

    #[tokio::test]
    async fn test_response_with_literals() {
        let mock = Builder::new()
            .read(b"* LIST () \"/\" {3}\r\nabc")
            .read(b" {2}\r\nde\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* LIST () \"/\" {3}\r\nabc {2}\r\nde\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"A0001 OK done\r\n");
    }

    #[tokio::test]
    async fn test_literal_that_looks_like_a_literal() {
        // the literal's own bytes end in "{4}\r\n" and must not be re-parsed
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"{4}\r\n")
            .read(b")\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {5}\r\n{4}\r\n)\r\n");
    }

    #[tokio::test]
    async fn test_read_line_limited() {
        let mock = Builder::new()
            .read(b"first line\r\nsecond")
            .read(b" part\r\ntail)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line_limited(100).await.unwrap(), b"first line\r\n");
        assert_eq!(framed.read_line_limited(100).await.unwrap(), b"second part\r\n");
        assert_eq!(framed.read_line_limited(2).await.unwrap(), b"ta");
        assert_eq!(framed.read_line().await.unwrap(), b"il)\r\n");
    }

    #[tokio::test]
    async fn test_eof_is_an_io_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_oversized_literal_is_refused() {
        let header = format!("* 1 FETCH (BODY {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_write_flushes() {
        let mock = Builder::new().write(b"A001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_all(b"A001 NOOP\r\n").await.unwrap();
    }
}
