//! Incremental decoding of `text/event-stream` bodies.

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Event type, `message` when the server named none.
    pub event: String,
    /// Data lines, joined with `\n`.
    pub data: String,
}

/// Turns arbitrary body chunks into [`SseMessage`]s.
///
/// Lines may be split across chunks (even inside a UTF-8 sequence), so
/// incomplete lines are buffered until their newline arrives. Comment lines,
/// which the server sends as heartbeats, are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed the next chunk, returning every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if let Some(message) = self.line(line) {
                messages.push(message);
            }
        }
        messages
    }

    fn line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => trace!("Ignoring SSE field {field:?}"),
        }
        None
    }

    /// A blank line ends the event. Named events are dispatched even without data.
    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseMessage {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_events_without_data() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.feed(b"event:questions updated\n\n");
        assert_eq!(
            messages,
            vec![SseMessage {
                event: "questions updated".to_string(),
                data: String::new(),
            }]
        );
    }

    #[test]
    fn lines_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"event: questions up").is_empty());
        assert!(decoder.feed(b"dated\r\ndata: {\"a\":").is_empty());
        let messages = decoder.feed(b" 1}\r\n\r\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "questions updated");
        assert_eq!(messages[0].data, "{\"a\": 1}");
    }

    #[test]
    fn split_utf8() {
        let body = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = body.split_at(10);
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail)[0].data, "caf\u{e9}");
    }

    #[test]
    fn heartbeats_and_unknown_fields() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.feed(b":\n\n: keepalive\nid: 7\nretry: 100\n\n");
        assert!(messages.is_empty());
    }

    #[test]
    fn multiple_events_and_data_lines() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.feed(b"data: one\ndata: two\n\nevent: a\n\nevent: b\n\n");
        let events: Vec<_> = messages.iter().map(|m| m.event.as_str()).collect();
        assert_eq!(events, vec!["message", "a", "b"]);
        assert_eq!(messages[0].data, "one\ntwo");
    }
}
