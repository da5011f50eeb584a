//! Incremental server-sent events decoder.
//!
//! Only `data:` lines matter for chat completions; comments, `event:` and
//! `id:` lines are ignored.
//!
//! SSE format: `data: {"choices":[{"delta":{"content":"hi"}}]}\n\n`

use bytes::{Buf, BytesMut};

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// JSON (or other text) payload.
    Payload(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Splits a byte stream into `data:` payloads across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every complete payload in it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(line_end) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(line_end);
            self.buf.advance(1);
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<SseData> {
        let line = self.buf.split();
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseData> {
    let line = String::from_utf8_lossy(line);
    let trimmed = line.trim();

    // Skip empty lines and SSE comments
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        Some(SseData::Done)
    } else {
        Some(SseData::Payload(data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(
            decoder.push(b":1}\n\ndata: {\"b\":2}\r\n\n"),
            [
                SseData::Payload("{\"a\":1}".to_string()),
                SseData::Payload("{\"b\":2}".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_and_other_fields_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata: [DONE]\n");
        assert_eq!(events, [SseData::Done]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"tail\":true}").is_empty());
        assert_eq!(
            decoder.finish(),
            Some(SseData::Payload("{\"tail\":true}".to_string()))
        );
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_text_split_mid_character() {
        let payload = "data: {\"c\":\"größe\"}\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&payload[..split]).is_empty());
        assert_eq!(
            decoder.push(&payload[split..]),
            [SseData::Payload("{\"c\":\"größe\"}".to_string())]
        );
    }
}
