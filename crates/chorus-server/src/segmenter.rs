//! Splits the chunk stream of the audio pipeline into synthesis requests.
//!
//! Two buffers are kept: a short segment buffer for low-latency speech and a
//! whole-turn buffer that is replayed as one request when the turn ends.

use chorus_types::TextChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Partial text, spoken as it arrives.
    Segment,
    /// The full answer of a finished turn.
    Whole,
}

impl FlushKind {
    pub fn is_segment(self) -> bool {
        matches!(self, Self::Segment)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Segment => "segment",
            Self::Whole => "whole",
        }
    }
}

/// Text ready to be sent to the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub kind: FlushKind,
    /// Turn of the chunk that triggered the flush.
    pub turn_id: String,
    pub text: String,
}

#[derive(Debug)]
pub struct Segmenter {
    threshold: usize,
    segment: String,
    segment_chars: usize,
    whole: String,
}

impl Segmenter {
    /// `threshold` is a length in characters; a segment flushes as soon as it
    /// grows past it.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            segment: String::new(),
            segment_chars: 0,
            whole: String::new(),
        }
    }

    /// Feeds one chunk and returns the flushes it triggers, in the order they
    /// must be synthesized.
    pub fn push(&mut self, chunk: &TextChunk) -> Vec<Flush> {
        if chunk.is_sentinel() {
            let mut flushes = Vec::with_capacity(2);
            if let Some(flush) = self.take_segment(&chunk.id) {
                flushes.push(flush);
            }
            if !self.whole.is_empty() {
                flushes.push(Flush {
                    kind: FlushKind::Whole,
                    turn_id: chunk.id.clone(),
                    text: std::mem::take(&mut self.whole),
                });
            }
            return flushes;
        }

        if chunk.content.is_empty() {
            return Vec::new();
        }

        self.segment.push_str(&chunk.content);
        self.segment_chars += chunk.content.chars().count();
        self.whole.push_str(&chunk.content);

        if self.segment_chars > self.threshold {
            self.take_segment(&chunk.id).into_iter().collect()
        } else {
            Vec::new()
        }
    }

    fn take_segment(&mut self, turn_id: &str) -> Option<Flush> {
        if self.segment.is_empty() {
            return None;
        }
        self.segment_chars = 0;
        Some(Flush {
            kind: FlushKind::Segment,
            turn_id: turn_id.to_string(),
            text: std::mem::take(&mut self.segment),
        })
    }

    /// Characters currently waiting in the segment buffer.
    pub fn pending_segment(&self) -> usize {
        self.segment_chars
    }

    pub fn pending_whole(&self) -> &str {
        &self.whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(segmenter: &mut Segmenter, id: &str, parts: &[&str]) -> Vec<Flush> {
        parts
            .iter()
            .flat_map(|part| segmenter.push(&TextChunk::new(id, *part)))
            .collect()
    }

    #[test]
    fn short_turn_flushes_segment_then_whole() {
        let mut segmenter = Segmenter::new(100);
        assert!(feed(&mut segmenter, "t1", &["Hi", " there"]).is_empty());

        let flushes = segmenter.push(&TextChunk::sentinel("t1"));
        assert_eq!(
            flushes,
            vec![
                Flush {
                    kind: FlushKind::Segment,
                    turn_id: "t1".to_string(),
                    text: "Hi there".to_string(),
                },
                Flush {
                    kind: FlushKind::Whole,
                    turn_id: "t1".to_string(),
                    text: "Hi there".to_string(),
                },
            ]
        );
        assert_eq!(segmenter.pending_segment(), 0);
        assert_eq!(segmenter.pending_whole(), "");
    }

    #[test]
    fn segment_flushes_once_past_threshold() {
        let mut segmenter = Segmenter::new(100);
        let (a, b) = ("a".repeat(60), "b".repeat(30));
        let flushes = feed(&mut segmenter, "t", &[a.as_str(), b.as_str()]);
        assert!(flushes.is_empty(), "90 chars stay buffered");

        let flushes = segmenter.push(&TextChunk::new("t", "c".repeat(20)));
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].kind, FlushKind::Segment);
        assert_eq!(flushes[0].text.chars().count(), 110);
        assert_eq!(segmenter.pending_segment(), 0);
        assert_eq!(segmenter.pending_whole().len(), 110);
    }

    #[test]
    fn flush_fires_at_first_char_past_threshold() {
        let mut segmenter = Segmenter::new(100);
        assert!(segmenter.push(&TextChunk::new("t", "x".repeat(100))).is_empty());

        let flushes = segmenter.push(&TextChunk::new("t", "y"));
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].text.chars().count(), 101);
        assert_eq!(segmenter.pending_segment(), 0);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let mut segmenter = Segmenter::new(10);
        // Ten CJK characters are thirty bytes.
        assert!(segmenter.push(&TextChunk::new("t", "你好你好你好你好你好")).is_empty());
        assert_eq!(segmenter.pending_segment(), 10);
        assert_eq!(segmenter.push(&TextChunk::new("t", "！")).len(), 1);
    }

    #[test]
    fn sentinel_after_segment_flush_emits_only_whole() {
        let mut segmenter = Segmenter::new(3);
        let flushes = feed(&mut segmenter, "t", &["abcd"]);
        assert_eq!(flushes.len(), 1);

        let flushes = segmenter.push(&TextChunk::sentinel("t"));
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].kind, FlushKind::Whole);
        assert_eq!(flushes[0].text, "abcd");
    }

    #[test]
    fn sentinel_on_empty_buffers_emits_nothing() {
        let mut segmenter = Segmenter::new(100);
        assert!(segmenter.push(&TextChunk::sentinel("t")).is_empty());
        assert!(segmenter.push(&TextChunk::new("t", "")).is_empty());
    }

    #[test]
    fn turns_do_not_bleed_into_each_other() {
        let mut segmenter = Segmenter::new(100);
        feed(&mut segmenter, "t1", &["first"]);
        segmenter.push(&TextChunk::sentinel("t1"));

        feed(&mut segmenter, "t2", &["second"]);
        let flushes = segmenter.push(&TextChunk::sentinel("t2"));
        assert_eq!(flushes.len(), 2);
        assert!(flushes.iter().all(|f| f.turn_id == "t2" && f.text == "second"));
    }

    #[test]
    fn segments_concatenate_to_whole() {
        let mut segmenter = Segmenter::new(5);
        let mut flushes = feed(
            &mut segmenter,
            "t",
            &["one ", "two ", "three ", "four ", "five"],
        );
        flushes.extend(segmenter.push(&TextChunk::sentinel("t")));

        let (segments, whole): (Vec<_>, Vec<_>) =
            flushes.into_iter().partition(|f| f.kind.is_segment());
        let joined: String = segments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(whole.len(), 1);
        assert_eq!(joined, whole[0].text);
        assert_eq!(joined, "one two three four five");
    }
}
