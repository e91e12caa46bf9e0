//! Sentinel detection and prose/payload separation.
//!
//! The wire format is free-text prose followed, at an arbitrary point, by
//! the `__SOURCES__:` marker and a JSON array of citations, with nothing
//! after the array. Both the marker and the array can straddle fragment
//! boundaries, so every push re-scans the cumulative text rather than the
//! increment alone.

use crate::api::models::SourceCitation;
use crate::config::constants::protocol::SOURCES_SENTINEL;

/// Resolved end-of-stream content: displayable prose plus parsed citations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub prose: String,
    pub sources: Vec<SourceCitation>,
}

/// Accumulates decoded text, splits prose from the citation payload, and
/// hands out cumulative prose snapshots.
#[derive(Debug, Default)]
pub struct StreamFrameBuffer {
    running: String,
    /// Byte offset of the sentinel once it has been seen in full.
    sentinel_at: Option<usize>,
    /// Set once the payload parses; prose is frozen from then on.
    sources: Option<Vec<SourceCitation>>,
    /// Length of the last snapshot handed out.
    emitted: usize,
}

impl StreamFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one decoded increment. Returns the new cumulative prose
    /// snapshot when the visible prose grew, `None` otherwise.
    ///
    /// While the payload is still arriving, a failed parse is the expected
    /// state, not an error: snapshots simply keep excluding the sentinel and
    /// everything after it. A trailing run that could still turn out to be
    /// the start of the sentinel is withheld until disambiguated.
    pub fn push(&mut self, increment: &str) -> Option<String> {
        self.running.push_str(increment);
        if self.sources.is_some() {
            return None;
        }

        let visible = match self.running.find(SOURCES_SENTINEL) {
            Some(index) => {
                self.sentinel_at = Some(index);
                let candidate = &self.running[index + SOURCES_SENTINEL.len()..];
                if let Ok(parsed) = serde_json::from_str::<Vec<SourceCitation>>(candidate) {
                    self.sources = Some(parsed);
                }
                index
            }
            None => self.running.len() - partial_sentinel_suffix(&self.running),
        };

        if visible > self.emitted {
            self.emitted = visible;
            Some(self.running[..visible].to_string())
        } else {
            None
        }
    }

    /// Resolve at end of stream. Without a parsed payload the citations
    /// default to empty; if a sentinel was ever seen, it and any trailing
    /// unparsed bytes are stripped from the prose.
    pub fn finish(self) -> StreamOutcome {
        match (self.sources, self.sentinel_at) {
            (Some(sources), Some(index)) => StreamOutcome {
                prose: self.running[..index].to_string(),
                sources,
            },
            (None, Some(index)) => StreamOutcome {
                prose: self.running[..index].to_string(),
                sources: Vec::new(),
            },
            _ => StreamOutcome {
                prose: self.running,
                sources: Vec::new(),
            },
        }
    }
}

/// Length of the longest trailing run of `text` that is a proper prefix of
/// the sentinel. The sentinel is ASCII, so byte slicing is safe.
fn partial_sentinel_suffix(text: &str) -> usize {
    let longest = (SOURCES_SENTINEL.len() - 1).min(text.len());
    (1..=longest)
        .rev()
        .find(|&len| text.ends_with(&SOURCES_SENTINEL[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_only_snapshots_are_cumulative() {
        let mut buffer = StreamFrameBuffer::new();
        assert_eq!(buffer.push("Plants ").as_deref(), Some("Plants "));
        assert_eq!(buffer.push("use ").as_deref(), Some("Plants use "));
        let outcome = buffer.finish();
        assert_eq!(outcome.prose, "Plants use ");
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_partial_sentinel_withheld_from_snapshot() {
        let mut buffer = StreamFrameBuffer::new();
        assert_eq!(
            buffer.push("sunlight.__SOUR").as_deref(),
            Some("sunlight.")
        );
        // Turned out to be ordinary prose after all.
        assert_eq!(
            buffer.push("CE sign").as_deref(),
            Some("sunlight.__SOURCE sign")
        );
    }

    #[test]
    fn test_payload_split_across_pushes_parses_late() {
        let mut buffer = StreamFrameBuffer::new();
        buffer.push("answer__SOURCES__:[{\"documentId\":");
        // Payload incomplete: prose-only snapshot state, no failure.
        assert!(buffer.push("\"a.pdf\"").is_none());
        buffer.push("}]");
        let outcome = buffer.finish();
        assert_eq!(outcome.prose, "answer");
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].document_id, "a.pdf");
    }

    #[test]
    fn test_no_snapshot_after_payload_parses() {
        let mut buffer = StreamFrameBuffer::new();
        buffer.push("done__SOURCES__:[]");
        assert!(buffer.push("").is_none());
        let outcome = buffer.finish();
        assert_eq!(outcome.prose, "done");
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_unparseable_trailing_payload_stripped() {
        let mut buffer = StreamFrameBuffer::new();
        buffer.push("answer text__SOURCES__:[{broken");
        let outcome = buffer.finish();
        assert_eq!(outcome.prose, "answer text");
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_stream_end_right_after_sentinel() {
        let mut buffer = StreamFrameBuffer::new();
        buffer.push("answer__SOURCES__:");
        let outcome = buffer.finish();
        assert_eq!(outcome.prose, "answer");
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_sentinel_without_full_arrival_is_prose_at_end() {
        let mut buffer = StreamFrameBuffer::new();
        buffer.push("answer__SOUR");
        let outcome = buffer.finish();
        // Never completed into the sentinel, so it stays in the prose.
        assert_eq!(outcome.prose, "answer__SOUR");
    }

    #[test]
    fn test_snapshot_lengths_monotone_and_prefixing() {
        let mut buffer = StreamFrameBuffer::new();
        let mut snapshots = Vec::new();
        for piece in ["Pl", "ants use _", "_SOU", "RCES__:[", "]"] {
            if let Some(snapshot) = buffer.push(piece) {
                snapshots.push(snapshot);
            }
        }
        for pair in snapshots.windows(2) {
            assert!(pair[1].len() >= pair[0].len());
            assert!(pair[1].starts_with(pair[0].as_str()));
        }
    }
}
