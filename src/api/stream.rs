use super::logging::emit_sse_parse_error;
use crate::types::GenerateContentResponse;
use anyhow::Result;

/// Frames a `streamGenerateContent?alt=sse` byte stream into response chunks.
///
/// Network chunks may split an event anywhere, including inside a multi-byte
/// character, so raw bytes are buffered until a blank line closes the event
/// and only whole events are decoded. Carriage returns are dropped on the way
/// in.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Result<Vec<GenerateContentResponse>> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = find_blank_line(&self.buffer[start..]) {
            let event_end = start + end + 2;
            let event_text = String::from_utf8_lossy(&self.buffer[start..event_end]);
            if let Some(event) = parse_event(&event_text) {
                events.push(event);
            }
            start = event_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(events)
    }

    /// Parses whatever is left once the byte stream ends. Servers are allowed
    /// to close the connection without the trailing blank line.
    pub fn finish(&mut self) -> Vec<GenerateContentResponse> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        if rest.trim().is_empty() {
            return Vec::new();
        }
        parse_event(&rest).into_iter().collect()
    }
}

fn find_blank_line(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_event(event_text: &str) -> Option<GenerateContentResponse> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in event_text.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    let json_data = data_lines.join("\n");
    let json_data = json_data.trim();
    if json_data.is_empty() || json_data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<GenerateContentResponse>(json_data) {
        Ok(event) => Some(event),
        Err(error) => {
            emit_sse_parse_error(event_type.as_deref(), json_data, &error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_framed_events_are_split() {
        let mut parser = StreamParser::new();
        let chunk = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\r\n\r\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"b\"}]}}]}\r\n\r\n";
        let events = parser.process(chunk).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].text().as_deref(), Some("b"));
    }

    #[test]
    fn test_finish_parses_unterminated_tail() {
        let mut parser = StreamParser::new();
        let events = parser
            .process(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"tail\"}]}}]}")
            .unwrap();
        assert!(events.is_empty());

        let tail = parser.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].text().as_deref(), Some("tail"));
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_done_marker_and_comments_are_ignored() {
        let mut parser = StreamParser::new();
        let events = parser.process(b": keep-alive\n\ndata: [DONE]\n\n").unwrap();
        assert!(events.is_empty());
    }
}
