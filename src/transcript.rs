//! # Transcript Merging
//!
//! Merges the transcriptions of overlapping audio windows into one running
//! transcript. Consecutive windows share half a second of audio, so their
//! transcriptions usually share a few words at the boundary; the merge finds
//! that shared region and splices the new text on without duplicating it.
//!
//! ## Merge rules (in order):
//! 1. Empty previous transcript: the new text is the whole transcript.
//! 2. The new text contains the previous transcript verbatim: the new text
//!    subsumes everything committed so far, return it as-is.
//! 3. Longest suffix of `prev` that equals a prefix of `new` (compared on
//!    normalized words, up to `MAX_OVERLAP_WORDS`): splice the *original*
//!    non-overlapping words of `new` onto `prev`.
//! 4. No overlap: append `new` with a separating space. Text is never
//!    silently dropped.

/// Maximum number of boundary words considered when searching for overlap.
/// A 0.5 second overlap never yields anywhere near 30 spoken words, so this
/// bounds the search without risking a missed match.
pub const MAX_OVERLAP_WORDS: usize = 30;

/// Normalize a word for overlap comparison only: strip leading/trailing
/// punctuation and lowercase. The merged output always keeps the original
/// words, so casing and punctuation outside the overlap are preserved.
fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// Merge a new window transcription into the running transcript.
///
/// Comparison is case-insensitive and ignores surrounding punctuation, which
/// handles Whisper emitting e.g. `"...the server."` for one window and
/// `"The server handles"` for the next.
pub fn merge_transcripts(prev: &str, new: &str) -> String {
    if prev.is_empty() {
        return new.to_string();
    }

    // The new window may re-transcribe everything said so far (short
    // utterances fit entirely inside one window's overlap region).
    if new.contains(prev) {
        return new.to_string();
    }

    let prev_words: Vec<&str> = prev.split_whitespace().collect();
    let new_words: Vec<&str> = new.split_whitespace().collect();

    let prev_norm: Vec<String> = prev_words.iter().map(|w| normalize_word(w)).collect();
    let new_norm: Vec<String> = new_words.iter().map(|w| normalize_word(w)).collect();

    let max_k = prev_norm.len().min(new_norm.len()).min(MAX_OVERLAP_WORDS);

    // Longest overlap first: a suffix of prev matching a prefix of new.
    for k in (1..=max_k).rev() {
        if prev_norm[prev_norm.len() - k..] == new_norm[..k] {
            let tail = new_words[k..].join(" ");
            if tail.is_empty() {
                return prev.to_string();
            }
            return format!("{} {}", prev, tail);
        }
    }

    // No overlap found: append rather than drop.
    format!("{} {}", prev, new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prev_returns_new() {
        assert_eq!(merge_transcripts("", "hello world"), "hello world");
        assert_eq!(merge_transcripts("", ""), "");
    }

    #[test]
    fn test_subsumption_returns_new() {
        let merged = merge_transcripts("the quick", "well the quick brown fox");
        assert_eq!(merged, "well the quick brown fox");
    }

    #[test]
    fn test_single_word_overlap() {
        let merged = merge_transcripts("the quick brown", "brown fox jumps");
        assert_eq!(merged, "the quick brown fox jumps");
    }

    #[test]
    fn test_multi_word_overlap() {
        let merged = merge_transcripts(
            "I worked on a distributed cache",
            "a distributed cache for session data",
        );
        assert_eq!(merged, "I worked on a distributed cache for session data");
    }

    #[test]
    fn test_no_overlap_appends() {
        let merged = merge_transcripts("hello world", "completely unrelated text");
        assert_eq!(merged, "hello world completely unrelated text");
    }

    #[test]
    fn test_overlap_is_case_insensitive() {
        let merged = merge_transcripts("I built the Server", "the server handles requests");
        assert_eq!(merged, "I built the Server handles requests");
    }

    #[test]
    fn test_overlap_ignores_punctuation() {
        // The first window ends mid-sentence with punctuation Whisper added.
        let merged = merge_transcripts("we deployed it.", "We deployed it last year");
        assert_eq!(merged, "we deployed it. last year");
    }

    #[test]
    fn test_overlap_preserves_original_new_words() {
        // Words outside the overlap keep their original casing/punctuation.
        let merged = merge_transcripts("my name is", "is Priya, nice to meet you.");
        assert_eq!(merged, "my name is Priya, nice to meet you.");
    }

    #[test]
    fn test_new_entirely_overlapping_keeps_prev() {
        // The new window only re-heard the tail of what was committed.
        let merged = merge_transcripts("one two three four", "three four");
        assert_eq!(merged, "one two three four");
    }

    #[test]
    fn test_no_duplicated_boundary_words() {
        // For any k-word overlap the boundary words appear exactly once in
        // the result.
        let prev = "alpha beta gamma delta";
        let new = "gamma delta epsilon zeta";
        let merged = merge_transcripts(prev, new);
        assert_eq!(merged, "alpha beta gamma delta epsilon zeta");
        assert_eq!(merged.matches("gamma").count(), 1);
        assert_eq!(merged.matches("delta").count(), 1);
    }

    #[test]
    fn test_overlap_lookback_is_bounded() {
        // An overlap longer than MAX_OVERLAP_WORDS is not searched for; the
        // fallback still keeps every word.
        let long: Vec<String> = (0..40).map(|i| format!("w{}", i)).collect();
        let prev = long.join(" ");
        let merged = merge_transcripts(&prev, &prev.clone());
        // `new.contains(prev)` catches the identical case first.
        assert_eq!(merged, prev);
    }
}
