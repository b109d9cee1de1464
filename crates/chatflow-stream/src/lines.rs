//! Line decoding over a chunked byte stream.

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, StreamError};

/// Splits a byte stream on newline boundaries, carrying any partial
/// trailing fragment forward to be prefixed onto the next chunk. A line
/// is never surfaced until it is complete, and bytes are buffered raw so
/// a code point split across chunk boundaries decodes intact.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let mut line = self.carry.split_to(pos + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain whatever remains once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            let rest = self.carry.split();
            Some(String::from_utf8_lossy(&rest).into_owned())
        }
    }
}

/// Turn a chunked response body into a lazy, ordered stream of complete
/// decoded lines.
///
/// Reading stops promptly on cancellation and the body is dropped on every
/// exit path (normal completion, error, or cancellation). A transport
/// error that arrives after cancellation was requested is suppressed and
/// treated as expected termination rather than surfaced.
pub fn line_stream<S, E>(
    byte_stream: S,
    token: CancellationToken,
) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<StreamError>,
{
    stream! {
        let mut byte_stream = byte_stream;
        let mut decoder = LineDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("line stream cancelled");
                    return;
                }
                next = byte_stream.next() => next,
            };

            let Some(chunk) = next else { break };
            match chunk {
                Ok(bytes) => {
                    for line in decoder.push(&bytes) {
                        yield Ok(line);
                    }
                }
                Err(err) => {
                    let err = err.into();
                    if token.is_cancelled() {
                        debug!(%err, "suppressing transport error after cancellation");
                        return;
                    }
                    yield Err(err);
                    return;
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            yield Ok(rest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{pin_mut, stream};

    fn io_err() -> std::io::Error {
        std::io::Error::other("connection reset")
    }

    #[test]
    fn completes_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data:{\"ch").is_empty());
        assert_eq!(
            decoder.push(b"unk\":\"a\"}\ndata:"),
            vec![r#"data:{"chunk":"a"}"#.to_string()]
        );
        assert_eq!(
            decoder.push(b"{\"done\":true}\n"),
            vec![r#"data:{"done":true}"#.to_string()]
        );
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn decodes_code_points_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        // "hé\n" with the two-byte é split between chunks.
        assert!(decoder.push(&[b'h', 0xC3]).is_empty());
        assert_eq!(decoder.push(&[0xA9, b'\n']), vec!["hé".to_string()]);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\r\nb\n"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn finish_drains_trailing_fragment() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"tail without newline").is_empty());
        assert_eq!(decoder.finish(), Some("tail without newline".to_string()));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn yields_lines_in_arrival_order() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("one\ntw")),
            Ok(Bytes::from("o\nthree\n")),
        ];
        let lines = line_stream(stream::iter(chunks), CancellationToken::new());
        pin_mut!(lines);

        let mut collected = Vec::new();
        while let Some(line) = lines.next().await {
            collected.push(line.unwrap());
        }
        assert_eq!(collected, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn stops_promptly_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("never seen\n")), Err(io_err())];
        let lines = line_stream(stream::iter(chunks), token);
        pin_mut!(lines);

        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_mid_stream_suppresses_later_errors() {
        let token = CancellationToken::new();
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("first\n")), Err(io_err())];
        let lines = line_stream(stream::iter(chunks), token.clone());
        pin_mut!(lines);

        assert_eq!(lines.next().await.unwrap().unwrap(), "first");
        token.cancel();
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn surfaces_transport_errors_when_not_cancelled() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![Err(io_err())];
        let lines = line_stream(stream::iter(chunks), CancellationToken::new());
        pin_mut!(lines);

        let err = lines.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
        assert!(lines.next().await.is_none());
    }
}
