//! Sentence segmentation of streamed text.

/// Splits a stream of text deltas into sentences.
///
/// A boundary is whitespace directly after `.`, `!` or `?`. Terminal
/// punctuation at the very end of the buffered text also completes a
/// sentence, unless it is a `.` right after a digit (a decimal may still be
/// arriving). The segmenter keeps at most one incomplete sentence buffered.
/// Use one instance per turn, or call [`SentenceSegmenter::reset`] between
/// turns.
#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every sentence it completes.
    pub fn feed(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut sentences = Vec::new();
        let mut start = 0;
        let mut prev: Option<char> = None;
        let mut chars = self.buffer.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
                push_trimmed(&mut sentences, &self.buffer[start..i]);
                // the whole whitespace run belongs to the boundary
                let mut end = i + c.len_utf8();
                while let Some(&(j, next)) = chars.peek() {
                    if !next.is_whitespace() {
                        break;
                    }
                    end = j + next.len_utf8();
                    chars.next();
                }
                start = end;
                prev = None;
                continue;
            }
            prev = Some(c);
        }

        if start < self.buffer.len() && ends_sentence(&self.buffer[start..]) {
            push_trimmed(&mut sentences, &self.buffer[start..]);
            start = self.buffer.len();
        }

        self.buffer.drain(..start);
        sentences
    }

    /// Take the buffered remainder as a final sentence, if it has content.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        is_speakable(rest).then(|| rest.to_string())
    }

    /// Drop any partial sentence.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

fn ends_sentence(text: &str) -> bool {
    let mut rev = text.chars().rev();
    match (rev.next(), rev.next()) {
        (Some('.'), Some(before)) if before.is_ascii_digit() => false,
        (Some('.' | '!' | '?'), _) => true,
        _ => false,
    }
}

/// Punctuation-only leftovers, such as the tail of an ellipsis that arrived
/// in a later delta, carry nothing to say.
fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn push_trimmed(out: &mut Vec<String>, sentence: &str) {
    let sentence = sentence.trim();
    if is_speakable(sentence) {
        out.push(sentence.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_keeps_partial_sentence() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.feed("Hi there. How are"), vec!["Hi there."]);
        assert_eq!(seg.pending(), "How are");
        assert_eq!(seg.feed(" you?"), vec!["How are you?"]);
        assert_eq!(seg.pending(), "");
        assert!(seg.flush().is_none());
    }

    #[test]
    fn test_decimal_point_waits_for_more_text() {
        let mut seg = SentenceSegmenter::new();
        assert!(seg.feed("Pi is 3.").is_empty());
        assert_eq!(seg.feed("14. Next"), vec!["Pi is 3.14."]);
        assert_eq!(seg.pending(), "Next");
    }

    #[test]
    fn test_sentence_split_across_many_deltas() {
        let mut seg = SentenceSegmenter::new();
        let mut out = Vec::new();
        for delta in ["Hel", "lo", " there", "!", " How", " are", " you"] {
            out.extend(seg.feed(delta));
        }
        assert_eq!(out, vec!["Hello there!"]);
        assert_eq!(seg.flush().as_deref(), Some("How are you"));
    }

    #[test]
    fn test_multiple_sentences_in_one_delta() {
        let mut seg = SentenceSegmenter::new();
        let out = seg.feed("One! Two?\n\nThree. Fo");
        assert_eq!(out, vec!["One!", "Two?", "Three."]);
        assert_eq!(seg.pending(), "Fo");
    }

    #[test]
    fn test_punctuation_without_whitespace_is_not_a_boundary() {
        let mut seg = SentenceSegmenter::new();
        assert!(seg.feed("Version 1.2 is out").is_empty());
        assert!(seg.feed("...really").is_empty());
        assert_eq!(seg.flush().as_deref(), Some("Version 1.2 is out...really"));
    }

    #[test]
    fn test_trailing_whitespace_completes_sentence() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.feed("Done. "), vec!["Done."]);
        assert_eq!(seg.pending(), "");
        assert!(seg.flush().is_none());
    }

    #[test]
    fn test_flush_whitespace_only_yields_nothing() {
        let mut seg = SentenceSegmenter::new();
        seg.feed("   \n ");
        assert!(seg.flush().is_none());
        assert_eq!(seg.pending(), "");
    }

    #[test]
    fn test_ellipsis_split_across_deltas() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.feed("Wait."), vec!["Wait."]);
        assert!(seg.feed(".. ok").is_empty());
        assert_eq!(seg.pending(), "ok");
        assert_eq!(seg.flush().as_deref(), Some("ok"));

        assert!(seg.feed("!!").is_empty());
        assert_eq!(seg.flush(), None);
    }

    #[test]
    fn test_multibyte_text() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.feed("Ça va? Très bien. ¿Y tú"), vec!["Ça va?", "Très bien."]);
        assert_eq!(seg.pending(), "¿Y tú");
    }

    #[test]
    fn test_reset_drops_partial_sentence() {
        let mut seg = SentenceSegmenter::new();
        seg.feed("left over from the last turn");
        seg.reset();
        assert_eq!(seg.feed("New turn. "), vec!["New turn."]);
    }
}
