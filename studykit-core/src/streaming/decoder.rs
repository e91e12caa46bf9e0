//! Fragment-safe text decoding for streamed answers.
//!
//! Fragment boundaries are arbitrary, so a multi-byte scalar can arrive half
//! in one fragment and half in the next. The decoder carries the incomplete
//! trailing bytes forward and prefixes them onto the following fragment
//! instead of emitting a replacement character. Bytes that can never form a
//! valid sequence still decode to U+FFFD.

use crate::streaming::frame::{StreamFrameBuffer, StreamOutcome};

/// Incremental UTF-8 decoder with carry-over between fragments.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decode everything decodable from the carried bytes plus `input`,
    /// retaining any incomplete trailing sequence for the next call.
    pub(crate) fn decode(&mut self, input: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);

        let mut out = String::with_capacity(buf.len());
        let mut offset = 0;
        loop {
            match std::str::from_utf8(&buf[offset..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    offset = buf.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(
                        &buf[offset..offset + valid_up_to],
                    ));
                    match err.error_len() {
                        // Bytes that cannot start or continue any sequence.
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            offset += valid_up_to + invalid;
                        }
                        // Incomplete trailing sequence: hold it back.
                        None => {
                            offset += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        if offset < buf.len() {
            self.pending = buf[offset..].to_vec();
        }
        out
    }

    /// Flush at end of stream. A dangling partial sequence here can never
    /// complete, so it decodes lossily.
    pub(crate) fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&tail).into_owned()
    }
}

/// Decodes raw byte fragments and feeds the frame buffer.
///
/// One decoder serves exactly one attempt; a retry starts over with a fresh
/// instance, so nothing from a failed attempt can leak into a later one.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    utf8: Utf8Decoder,
    frame: StreamFrameBuffer,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw fragment. Returns the new cumulative prose snapshot when
    /// the visible prose grew.
    pub fn feed(&mut self, fragment: &[u8]) -> Option<String> {
        let text = self.utf8.decode(fragment);
        if text.is_empty() {
            return None;
        }
        self.frame.push(&text)
    }

    /// End of stream: flush carried bytes and resolve prose plus citations.
    pub fn finish(mut self) -> StreamOutcome {
        let tail = self.utf8.flush();
        if !tail.is_empty() {
            self.frame.push(&tail);
        }
        self.frame.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_scalar_split_across_fragments() {
        let text = "héllo 🌍 done";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut utf8 = Utf8Decoder::new();
            let mut decoded = utf8.decode(&bytes[..split]);
            decoded.push_str(&utf8.decode(&bytes[split..]));
            decoded.push_str(&utf8.flush());
            assert_eq!(decoded, text, "split at byte {split}");
        }
    }

    #[test]
    fn test_emoji_split_across_three_fragments() {
        let bytes = "🌍".as_bytes();
        let mut utf8 = Utf8Decoder::new();
        assert_eq!(utf8.decode(&bytes[..1]), "");
        assert_eq!(utf8.decode(&bytes[1..3]), "");
        assert_eq!(utf8.decode(&bytes[3..]), "🌍");
    }

    #[test]
    fn test_invalid_byte_becomes_replacement_character() {
        let mut utf8 = Utf8Decoder::new();
        assert_eq!(utf8.decode(b"ok\xffok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn test_dangling_partial_sequence_flushes_lossily() {
        let mut utf8 = Utf8Decoder::new();
        assert_eq!(utf8.decode(&"é".as_bytes()[..1]), "");
        assert_eq!(utf8.flush(), "\u{FFFD}");
        assert_eq!(utf8.flush(), "");
    }

    // Every 3-way partition (fragments may be empty, so this covers 1 and 2
    // fragments too) must yield the same prose and the same single citation.
    #[test]
    fn test_all_fragmentations_agree_on_prose_and_citation() {
        let wire = br#"hello__SOURCES__:[{"documentId":1}]"#;
        for i in 0..=wire.len() {
            for j in i..=wire.len() {
                let mut decoder = StreamDecoder::new();
                decoder.feed(&wire[..i]);
                decoder.feed(&wire[i..j]);
                decoder.feed(&wire[j..]);
                let outcome = decoder.finish();
                assert_eq!(outcome.prose, "hello", "boundaries at {i}/{j}");
                assert_eq!(outcome.sources.len(), 1, "boundaries at {i}/{j}");
                assert_eq!(outcome.sources[0].document_id, "1");
            }
        }
    }

    #[test]
    fn test_snapshots_never_expose_partial_sentinel() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(b"Plants use ").as_deref(), Some("Plants use "));
        assert_eq!(
            decoder.feed(b"sunlight.__SOUR").as_deref(),
            Some("Plants use sunlight.")
        );
        assert_eq!(
            decoder.feed(br#"CES__:[{"documentId":"bio.pdf","excerptText":"chlorophyll"}]"#),
            None
        );
        let outcome = decoder.finish();
        assert_eq!(outcome.prose, "Plants use sunlight.");
        assert_eq!(outcome.sources[0].document_id, "bio.pdf");
        assert_eq!(outcome.sources[0].excerpt_text, "chlorophyll");
    }
}
