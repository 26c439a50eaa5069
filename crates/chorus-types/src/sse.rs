//! Line-oriented decoding of server-sent-event bodies.
//!
//! Both upstream services push one JSON document per `data:` line. Comment
//! lines (`:`) and the other SSE fields (`id:`, `event:`) carry nothing the
//! relay needs and are dropped. Payloads are returned without the `data:`
//! prefix and without surrounding whitespace.

use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

/// Incremental decoder that turns arbitrary byte fragments into `data:`
/// payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network reads decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a fragment and returns every payload completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = parse_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    let data = text.strip_prefix("data:")?;
    Some(data.trim_start().to_string())
}

struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Adapts a byte-chunk stream (such as `reqwest::Response::bytes_stream`)
/// into a stream of `data:` payloads.
///
/// A transport error is yielded once and ends the stream.
pub fn data_payloads<S, B, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.ready.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let decoded = st.decoder.push(bytes.as_ref());
                    st.ready.extend(decoded);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.decoder.finish());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let body = "id:1\nevent:result\n:HTTP_STATUS/200\ndata:{\"a\":1}\n\n";
        assert_eq!(decoder.push(body.as_bytes()), vec!["{\"a\":1}".to_string()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn joins_lines_split_across_fragments() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"con").is_empty());
        assert!(decoder.push(b"tent\":\"x\"}").is_empty());
        assert_eq!(decoder.push(b"\r\n"), vec!["{\"content\":\"x\"}".to_string()]);
    }

    #[test]
    fn keeps_multibyte_characters_split_mid_sequence() {
        let line = "data: 你好\n".as_bytes();
        let mut decoder = SseDecoder::new();
        // Split inside the first three-byte character.
        assert!(decoder.push(&line[..7]).is_empty());
        assert_eq!(decoder.push(&line[7..]), vec!["你好".to_string()]);
    }

    #[test]
    fn finish_returns_unterminated_payload() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("[DONE]"));
    }

    #[tokio::test]
    async fn stream_adapter_yields_payloads_then_error() {
        let parts: Vec<Result<&'static [u8], String>> = vec![
            Ok(b"data: one\ndata: t"),
            Ok(b"wo\n"),
            Err("reset".to_string()),
            Ok(b"data: never\n"),
        ];
        let out: Vec<Result<String, String>> =
            data_payloads(stream::iter(parts)).collect().await;
        assert_eq!(
            out,
            vec![
                Ok("one".to_string()),
                Ok("two".to_string()),
                Err("reset".to_string())
            ]
        );
    }
}
