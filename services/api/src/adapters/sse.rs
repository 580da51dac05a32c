//! services/api/src/adapters/sse.rs
//!
//! Incremental decoder for the `text/event-stream` framing used by the
//! chat-completions endpoint. The decoder is fed raw byte buffers exactly as
//! they arrive from the transport and yields text deltas in order.

use tracing::warn;

/// One decoded unit from the upstream byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An opaque text fragment. Fragments are order-significant and must be
    /// concatenated in arrival order.
    Delta(String),
    /// The `[DONE]` sentinel. Ends the decode loop; trailing buffered bytes
    /// are discarded.
    Done,
}

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Stateful event-stream decoder.
///
/// Bytes are buffered until a full line is available, so an event line or a
/// multi-byte UTF-8 character split across two transport reads is completed
/// by the next `push` rather than dropped or corrupted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminal sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one transport read into the decoder and returns every event that
    /// became complete. Lines without the `data: ` prefix (comments,
    /// keep-alives, blank separators) are ignored. A malformed JSON payload
    /// costs one delta, not the whole stream.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buf.extend_from_slice(bytes);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = match std::str::from_utf8(&line_bytes) {
                Ok(s) => s.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    warn!("Dropping undecodable event line: {e}");
                    continue;
                }
            };

            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let data = data.trim();

            if data == DONE_SENTINEL {
                self.done = true;
                self.buf.clear();
                events.push(StreamEvent::Done);
                return events;
            }

            match serde_json::from_str::<serde_json::Value>(data) {
                Ok(value) => {
                    let content = value
                        .get("choices")
                        .and_then(|c| c.get(0))
                        .and_then(|choice| choice.get("delta"))
                        .and_then(|delta| delta.get("content"))
                        .and_then(|content| content.as_str())
                        .unwrap_or_default();
                    // Empty deltas would only trigger no-op UI updates.
                    if !content.is_empty() {
                        events.push(StreamEvent::Delta(content.to_string()));
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed event payload: {e}");
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_event(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n"
        )
    }

    fn collect_deltas(decoder: &mut SseDecoder, bytes: &[u8]) -> Vec<String> {
        decoder
            .push(bytes)
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Delta(d) => Some(d),
                StreamEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn decodes_events_in_order() {
        let mut decoder = SseDecoder::new();
        let stream = format!(
            "{}{}data: [DONE]\n",
            delta_event("Hello"),
            delta_event(" world")
        );
        let events = decoder.push(stream.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hello".to_string()),
                StreamEvent::Delta(" world".to_string()),
                StreamEvent::Done,
            ]
        );
        assert!(decoder.is_done());
    }

    #[test]
    fn event_split_across_pushes_is_reassembled() {
        let mut decoder = SseDecoder::new();
        let line = delta_event("abc");
        let (head, tail) = line.as_bytes().split_at(12);
        assert!(collect_deltas(&mut decoder, head).is_empty());
        assert_eq!(collect_deltas(&mut decoder, tail), vec!["abc".to_string()]);
    }

    #[test]
    fn multibyte_character_split_across_pushes_survives() {
        let mut decoder = SseDecoder::new();
        let line = delta_event("占卜");
        let bytes = line.as_bytes();
        // Split in the middle of the first three-byte CJK character.
        let cut = line.find('占').unwrap() + 1;
        assert!(collect_deltas(&mut decoder, &bytes[..cut]).is_empty());
        assert_eq!(
            collect_deltas(&mut decoder, &bytes[cut..]),
            vec!["占卜".to_string()]
        );
    }

    #[test]
    fn byte_at_a_time_feeding_yields_every_delta() {
        let mut decoder = SseDecoder::new();
        let stream = format!("{}{}data: [DONE]\n", delta_event("你好"), delta_event("!"));
        let mut deltas = Vec::new();
        for byte in stream.as_bytes() {
            deltas.extend(collect_deltas(&mut decoder, &[*byte]));
        }
        assert_eq!(deltas, vec!["你好".to_string(), "!".to_string()]);
        assert!(decoder.is_done());
    }

    #[test]
    fn done_sentinel_discards_trailing_bytes() {
        let mut decoder = SseDecoder::new();
        let stream = format!("data: [DONE]\n{}", delta_event("garbage"));
        let events = decoder.push(stream.as_bytes());
        assert_eq!(events, vec![StreamEvent::Done]);
        // Later pushes are ignored outright.
        assert!(decoder.push(delta_event("more").as_bytes()).is_empty());
    }

    #[test]
    fn malformed_json_costs_one_delta_only() {
        let mut decoder = SseDecoder::new();
        let stream = format!("data: {{not json}}\n{}", delta_event("ok"));
        assert_eq!(
            collect_deltas(&mut decoder, stream.as_bytes()),
            vec!["ok".to_string()]
        );
    }

    #[test]
    fn comments_keepalives_and_empty_deltas_are_ignored() {
        let mut decoder = SseDecoder::new();
        let stream = format!(": keep-alive\n\nevent: ping\n{}", delta_event(""));
        assert!(decoder.push(stream.as_bytes()).is_empty());
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        let mut decoder = SseDecoder::new();
        let line = delta_event("x").replace('\n', "\r\n");
        assert_eq!(collect_deltas(&mut decoder, line.as_bytes()), vec!["x"]);
    }
}
