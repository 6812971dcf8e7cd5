//! Frame decoding for the push-over-POST wire format.
//!
//! The backend answers a chat request with a plain chunked body shaped like a
//! server-sent event stream:
//!
//! ```text
//! data: Hi
//!
//! data:  there
//!
//! event: done
//!
//! ```
//!
//! Chunks arrive with no alignment to frame boundaries, so [`FrameDecoder`]
//! keeps the unterminated tail between calls and only emits a frame once its
//! blank-line boundary has been seen.

const DATA_PREFIX: &str = "data:";
const DONE_LINE: &str = "event: done";

/// One decoded unit of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Content delta. May be empty when the frame was `data:` with nothing after it.
    Delta(String),
    /// Terminal marker (`event: done`).
    Done,
    /// Frame without content or terminator (comments, unknown event types).
    Ignored,
}

/// Incremental decoder holding the continuation buffer between chunks.
///
/// Buffering happens on raw bytes so a multi-byte UTF-8 sequence split across
/// two chunks is reassembled before it is decoded. A carriage return directly
/// before a line feed is dropped on input, which makes `\r\n` framing
/// equivalent to `\n` framing independently of where the chunk boundaries
/// fall. Any other carriage return is content.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// A `\r` ended the previous chunk; whether it is kept depends on the
    /// next byte.
    pending_cr: bool,
    /// Offset from which the next boundary search starts. Everything before
    /// it is known not to contain `\n\n`.
    scan_from: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            if std::mem::take(&mut self.pending_cr) && byte != b'\n' {
                self.buffer.push(b'\r');
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(byte);
            }
        }

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut cursor = self.scan_from;

        while let Some(offset) = find_boundary(&self.buffer[cursor..]) {
            let end = cursor + offset;
            frames.push(parse_frame(&self.buffer[consumed..end]));
            consumed = end + 2;
            cursor = consumed;
        }

        self.buffer.drain(..consumed);
        // The last byte may be the first half of a boundary.
        self.scan_from = self.buffer.len().saturating_sub(1);

        frames
    }

    /// Number of bytes waiting for a boundary.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the stream. Any unterminated remainder is discarded and the
    /// terminal frame is returned so callers always observe an end.
    pub fn finish(&mut self) -> Frame {
        if !self.buffer.is_empty() {
            tracing::debug!(
                "[FrameDecoder] Discarding {} unterminated bytes at end of stream",
                self.buffer.len()
            );
        }
        self.buffer.clear();
        self.scan_from = 0;
        self.pending_cr = false;
        Frame::Done
    }
}

fn find_boundary(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|window| window == b"\n\n")
}

/// Parses the text of one frame (without its trailing blank line).
fn parse_frame(raw: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(raw);
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.trim_end() == DONE_LINE {
            return Frame::Done;
        }
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        Frame::Ignored
    } else {
        Frame::Delta(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCENARIO: &[u8] = b"data: Hi\n\ndata:  there\n\nevent: done\n\n";

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        chunks
            .iter()
            .flat_map(|chunk| decoder.push(chunk))
            .collect()
    }

    #[test]
    fn test_decodes_scenario_in_one_chunk() {
        let frames = decode_chunks(&[SCENARIO]);
        assert_eq!(
            frames,
            vec![
                Frame::Delta("Hi".to_string()),
                Frame::Delta(" there".to_string()),
                Frame::Done,
            ]
        );
    }

    #[test]
    fn test_split_points_do_not_change_frames() {
        let whole = decode_chunks(&[SCENARIO]);

        // Every two-way split.
        for split in 0..=SCENARIO.len() {
            let (left, right) = SCENARIO.split_at(split);
            assert_eq!(decode_chunks(&[left, right]), whole, "split at {split}");
        }

        // Byte-at-a-time.
        let singles: Vec<&[u8]> = SCENARIO.chunks(1).collect();
        assert_eq!(decode_chunks(&singles), whole);

        // Uneven three-byte chunks.
        let triples: Vec<&[u8]> = SCENARIO.chunks(3).collect();
        assert_eq!(decode_chunks(&triples), whole);
    }

    #[test]
    fn test_split_points_on_mixed_stream() {
        let mixed: &[u8] = "data: caf\u{e9}\r\n\r\n\
                            : keep-alive\n\n\
                            data: line one\r\ndata: line two\n\n\
                            data:\n\n\
                            data: a\rb \u{1f600}\n\n\
                            event: done\r\n\r\n"
            .as_bytes();
        let expected = vec![
            Frame::Delta("caf\u{e9}".to_string()),
            Frame::Ignored,
            Frame::Delta("line one\nline two".to_string()),
            Frame::Delta(String::new()),
            Frame::Delta("a\rb \u{1f600}".to_string()),
            Frame::Done,
        ];
        assert_eq!(decode_chunks(&[mixed]), expected);

        // Every three-way split, which covers every two-way split too.
        for first in 0..=mixed.len() {
            for second in first..=mixed.len() {
                let chunks = [&mixed[..first], &mixed[first..second], &mixed[second..]];
                assert_eq!(
                    decode_chunks(&chunks),
                    expected,
                    "split at {first} and {second}"
                );
            }
        }

        let singles: Vec<&[u8]> = mixed.chunks(1).collect();
        assert_eq!(decode_chunks(&singles), expected);
    }

    #[test]
    fn test_partial_frame_is_held_back() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: par").is_empty());
        assert_eq!(decoder.buffered(), 9);
        assert!(decoder.push(b"tial\n").is_empty());
        assert_eq!(
            decoder.push(b"\n"),
            vec![Frame::Delta("partial".to_string())]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "data: caf\u{e9} \u{1f600}\n\n".as_bytes();
        // Split inside the emoji's four-byte sequence.
        let split = text.len() - 4;
        let frames = decode_chunks(&[&text[..split], &text[split..]]);
        assert_eq!(frames, vec![Frame::Delta("caf\u{e9} \u{1f600}".to_string())]);
    }

    #[test]
    fn test_empty_data_frame_is_empty_delta() {
        let frames = decode_chunks(&[b"data: a\n\ndata:\n\ndata: b\n\n"]);
        assert_eq!(
            frames,
            vec![
                Frame::Delta("a".to_string()),
                Frame::Delta(String::new()),
                Frame::Delta("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        let frames = decode_chunks(&[b": keep-alive\n\nevent: ping\nid: 7\n\ndata: x\nretry: 10\n\n"]);
        assert_eq!(
            frames,
            vec![
                Frame::Ignored,
                Frame::Ignored,
                Frame::Delta("x".to_string())
            ]
        );
    }

    #[test]
    fn test_crlf_framing() {
        let crlf: &[u8] = b"data: Hi\r\n\r\nevent: done\r\n\r\n";
        let whole = decode_chunks(&[crlf]);
        assert_eq!(whole, vec![Frame::Delta("Hi".to_string()), Frame::Done]);

        // Boundary split between '\r' and '\n'.
        assert_eq!(decode_chunks(&[&crlf[..9], &crlf[9..]]), whole);
    }

    #[test]
    fn test_lone_carriage_return_is_content() {
        assert_eq!(
            decode_chunks(&[b"data: a\rb\n\n"]),
            vec![Frame::Delta("a\rb".to_string())]
        );

        // The decision about a trailing '\r' waits for the next chunk.
        assert_eq!(
            decode_chunks(&[b"data: a\r", b"b\n\n"]),
            vec![Frame::Delta("a\rb".to_string())]
        );
        assert_eq!(
            decode_chunks(&[b"data: a\r", b"\n\r", b"\n"]),
            vec![Frame::Delta("a".to_string())]
        );
        assert_eq!(
            decode_chunks(&[b"data: a\r\r\n\n"]),
            vec![Frame::Delta("a\r".to_string())]
        );
    }

    #[test]
    fn test_multiple_data_lines_join_with_newline() {
        let frames = decode_chunks(&[b"data: line one\ndata: line two\n\n"]);
        assert_eq!(
            frames,
            vec![Frame::Delta("line one\nline two".to_string())]
        );
    }

    #[test]
    fn test_done_marker_wins_within_a_frame() {
        let frames = decode_chunks(&[b"data: late\nevent: done\n\n"]);
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn test_finish_discards_remainder_and_signals_done() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(
            decoder.push(b"data: one\n\ndata: unterminated"),
            vec![Frame::Delta("one".to_string())]
        );
        assert_eq!(decoder.finish(), Frame::Done);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_extra_blank_lines_between_frames() {
        let frames = decode_chunks(&[b"data: a\n\n\n\ndata: b\n\n"]);
        assert_eq!(
            frames,
            vec![
                Frame::Delta("a".to_string()),
                Frame::Ignored,
                Frame::Delta("b".to_string()),
            ]
        );
    }
}
