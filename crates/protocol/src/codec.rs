//! Incremental line codec for the hub byte stream.
//!
//! The codec buffers raw bytes across reads and yields complete,
//! whitespace-trimmed lines. Splitting is independent of how the stream was
//! chunked: a line arriving over two reads produces exactly one event.

use tracing::trace;

use crate::constants::TELEMETRY_MARKER;
use crate::telemetry::TelemetrySnapshot;

/// A classified line from the hub stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Marker line with a valid embedded JSON object.
    Telemetry(TelemetrySnapshot),
    /// Any other non-empty line, forwarded verbatim.
    Log(String),
    /// Marker line whose JSON portion failed to parse.
    Malformed { raw: String },
}

/// Stateful decoder turning a raw byte stream into [`Line`]s.
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: String,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the internal buffer and drains every complete line.
    ///
    /// The tail after the last newline stays buffered for the next call.
    /// Empty lines are dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Line> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(boundary) = self.buffer.find('\n') {
            let raw: String = self.buffer.drain(..=boundary).collect();
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            lines.push(classify(line));
        }
        lines
    }

    /// Bytes currently held back waiting for a newline.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Classifies one complete, trimmed, non-empty line.
///
/// Telemetry parse failures degrade to [`Line::Malformed`] — a garbled line
/// must never tear down a live connection.
pub fn classify(line: &str) -> Line {
    if !line.starts_with(TELEMETRY_MARKER) {
        return Line::Log(line.to_string());
    }

    let Some(start) = line.find('{') else {
        trace!(raw = %line, "telemetry line without JSON object");
        return Line::Malformed {
            raw: line.to_string(),
        };
    };

    match TelemetrySnapshot::from_json(&line[start..]) {
        Ok(snapshot) => Line::Telemetry(snapshot),
        Err(e) => {
            trace!(raw = %line, error = %e, "malformed telemetry");
            Line::Malformed {
                raw: line.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_line() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"##TELEMETRY##:{\"batt\":42}\n");
        assert_eq!(lines.len(), 1);
        match &lines[0] {
            Line::Telemetry(snap) => assert_eq!(snap.batt(), Some(42.0)),
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn log_line_passes_through_verbatim() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"hello world\n");
        assert_eq!(lines, vec![Line::Log("hello world".into())]);
    }

    #[test]
    fn bad_json_yields_malformed_not_panic() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"##TELEMETRY##:{bad json\n");
        assert_eq!(
            lines,
            vec![Line::Malformed {
                raw: "##TELEMETRY##:{bad json".into()
            }]
        );
    }

    #[test]
    fn marker_without_brace_is_malformed() {
        assert!(matches!(
            classify("##TELEMETRY##:no json here"),
            Line::Malformed { .. }
        ));
    }

    #[test]
    fn partial_line_reassembly() {
        let mut codec = LineCodec::new();
        assert!(codec.feed(b"##TELE").is_empty());
        let lines = codec.feed(b"METRY##:{}\n");
        assert_eq!(lines.len(), 1);
        assert!(matches!(lines[0], Line::Telemetry(_)));
    }

    #[test]
    fn chunking_is_irrelevant() {
        let input = b"##TELEMETRY##:{\"batt\":5}\nplain log\n##TELEMETRY##:{\"batt\":6}\n";

        let mut whole = LineCodec::new();
        let expected = whole.feed(input);

        let mut byte_by_byte = LineCodec::new();
        let mut got = Vec::new();
        for b in input {
            got.extend(byte_by_byte.feed(std::slice::from_ref(b)));
        }

        assert_eq!(expected, got);
        assert_eq!(expected.len(), 3);
    }

    #[test]
    fn multiple_lines_in_one_read() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"one\ntwo\nthree\n");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_lines_are_dropped() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"\n\r\n  \nreal\n");
        assert_eq!(lines, vec![Line::Log("real".into())]);
    }

    #[test]
    fn crlf_is_trimmed() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"STATUS OK\r\n");
        assert_eq!(lines, vec![Line::Log("STATUS OK".into())]);
    }

    #[test]
    fn tail_stays_pending() {
        let mut codec = LineCodec::new();
        codec.feed(b"complete\nincomplete");
        assert_eq!(codec.pending(), "incomplete");
    }
}
