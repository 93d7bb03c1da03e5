use serde_json::Value;

use crate::events::{ServerEvent, EVENT_DEFAULT};

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so multi-byte characters
/// split across chunks decode intact. Carriage returns are dropped on entry.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ServerEvent> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let frame = String::from_utf8_lossy(&self.buffer[..split]).into_owned();
            self.buffer.drain(0..split + 2);

            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }

        events
    }

    /// True when no partial frame is pending.
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn parse_frame(frame: &str) -> Option<ServerEvent> {
    let mut event_name: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            if !value.is_empty() {
                event_name = Some(value);
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() {
        return None;
    }

    Some(decode_frame(event_name, &data))
}

/// Turn one frame's data into a [`ServerEvent`].
///
/// Non-JSON data is delivered as a `raw` event carrying the text.
pub fn decode_frame(event_name: Option<&str>, data: &str) -> ServerEvent {
    let value = match serde_json::from_str::<Value>(data) {
        Ok(value) => unwrap_envelope(value),
        Err(_) => return ServerEvent::raw(data),
    };

    let event_type = event_name
        .map(ToOwned::to_owned)
        .or_else(|| {
            value
                .get("type")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| EVENT_DEFAULT.to_owned());

    let data = match value {
        Value::Object(mut map) => match map.remove("properties") {
            Some(properties) => properties,
            None => Value::Object(map),
        },
        other => other,
    };

    ServerEvent::new(event_type, data)
}

/// Global events arrive as `{"directory": .., "payload": {type, properties}}`.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("payload") {
            Some(payload @ Value::Object(_)) => payload,
            Some(other) => {
                map.insert("payload".to_owned(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}
