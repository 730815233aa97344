// Timestamp assignment heuristic
//
// Correlates diarized utterances with timed source segments (e.g. caption
// events) by keyword matching. Best-effort: sparse or total match failure
// degrades to missing timestamps, never an error.

use serde::{Deserialize, Serialize};

use crate::database::models::Utterance;

/// A timed span of source text, such as one caption event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedSegment {
    pub start_ms: i64,
    pub text: String,
}

/// Segments scanned per utterance before giving up
const SEARCH_WINDOW: usize = 30;
/// Keywords taken from the head of each utterance
const MAX_KEYWORDS: usize = 5;
/// Words this short carry too little signal to match on
const MIN_WORD_LEN: usize = 4;

/// Assign start/end timestamps to utterances from timed segments.
///
/// For each utterance the first five distinct words longer than three
/// characters are its keywords; the first in-window segment containing any
/// keyword supplies the start time, and the cursor advances past that
/// segment so earlier segments are never revisited. An unresolved end time
/// inherits the next utterance's resolved start; the last utterance and
/// any utterance without a match keep their timestamps unset.
pub fn assign_timestamps(utterances: &mut [Utterance], segments: &[TimedSegment]) {
    let mut cursor = 0usize;

    for utterance in utterances.iter_mut() {
        let keywords = keywords_of(&utterance.text);
        if keywords.is_empty() {
            continue;
        }

        let window_end = (cursor + SEARCH_WINDOW).min(segments.len());
        for j in cursor..window_end {
            let segment_text = segments[j].text.to_lowercase();
            if keywords.iter().any(|kw| segment_text.contains(kw.as_str())) {
                utterance.start_ms = Some(segments[j].start_ms);
                cursor = j + 1;
                break;
            }
        }
    }

    for i in 0..utterances.len() {
        if utterances[i].start_ms.is_none() || utterances[i].end_ms.is_some() {
            continue;
        }
        if let Some(next_start) = utterances.get(i + 1).and_then(|u| u.start_ms) {
            utterances[i].end_ms = Some(next_start);
        }
    }
}

/// First five distinct lowercase words longer than three characters
fn keywords_of(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    for word in lowered.split_whitespace() {
        if word.len() < MIN_WORD_LEN {
            continue;
        }
        if keywords.iter().any(|k| k == word) {
            continue;
        }
        keywords.push(word.to_string());
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
    }
    keywords
}
