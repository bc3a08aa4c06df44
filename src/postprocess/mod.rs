//! Transcript parsing.
//!
//! The vocabulary is the configured class labels plus `true` / `false`, which map to the
//! positive label and (for two-label sets) the other label. Matching is ASCII
//! case-insensitive on whole words.
//!
//! On a flag line whose key names exactly one label (`CleanFlag: true`), `true` binds to
//! that label and `false` to the other one. Two-label sets only.
//!
//! # Flag priority
//!
//! 1. the last `<Name>Flag: value` (or `= value`) line whose value holds a vocabulary token
//! 2. the earliest vocabulary token anywhere in the transcript
//! 3. otherwise [`FlagDecision::Default`]: the highest-scoring label, earlier label on ties
//!
//! # Explanation
//!
//! Text after an `Explanation:` / `Explanation =` marker if present, else the text after
//! the matched token. A default decision carries the whole trimmed transcript.
//!
//! Parsing never fails.

mod types;


pub use types::{FlagDecision, FlagSource, ParsedResponse};

use tracing::{debug, warn};

use crate::index::{ClassLabel, LabelSet};
use crate::retrieval::ClassScores;

const FLAG_KEY: &str = "flag";
const EXPLANATION_KEY: &str = "explanation";

/// A located vocabulary token: byte range in the transcript plus the label it maps to.
#[derive(Debug, Clone)]
struct TokenMatch {
    start: usize,
    end: usize,
    label: ClassLabel,
}

#[derive(Debug, Clone)]
pub struct ResponsePostprocessor {
    labels: LabelSet,
    /// Lowercased token -> label, longest token first.
    vocabulary: Vec<(String, ClassLabel)>,
}

impl ResponsePostprocessor {
    /// `positive` is what `true` maps to; `false` maps to the other label when exactly two
    /// labels are configured.
    pub fn new(labels: LabelSet, positive: &ClassLabel) -> Self {
        let mut vocabulary: Vec<(String, ClassLabel)> = labels
            .iter()
            .map(|l| (l.as_str().to_ascii_lowercase(), l.clone()))
            .collect();

        vocabulary.push(("true".to_string(), positive.clone()));
        if labels.len() == 2
            && let Some(negative) = labels.iter().find(|l| *l != positive)
        {
            vocabulary.push(("false".to_string(), negative.clone()));
        }
        vocabulary.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self { labels, vocabulary }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn process(&self, transcript: &str, class_scores: &ClassScores) -> ParsedResponse {
        let lowered = transcript.to_ascii_lowercase();

        let flag_line = self.last_flag_line(transcript, &lowered);
        let from_flag_line = flag_line.is_some();
        let matched = flag_line.or_else(|| self.earliest_token(&lowered, 0, lowered.len()));

        let (decision, explanation) = match matched {
            Some(m) => {
                let explanation = match explanation_marker(&lowered) {
                    // An explanation written above the flag line stops at that line.
                    Some(at) if from_flag_line && at <= m.start => {
                        let line_start = lowered[..m.start].rfind('\n').map_or(0, |i| i + 1);
                        transcript[at..line_start.max(at)].trim()
                    }
                    Some(at) => transcript[at..].trim(),
                    None => trim_lead(&transcript[m.end..]),
                }
                .to_string();
                debug!(label = %m.label, offset = m.start, "Flag recognized");
                (
                    FlagDecision::Recognized {
                        label: m.label,
                        token: transcript[m.start..m.end].to_string(),
                    },
                    explanation,
                )
            }
            None => {
                let label = self.default_label(class_scores);
                warn!(
                    label = %label,
                    transcript_len = transcript.len(),
                    "No flag token in transcript, using highest-scoring class"
                );
                (
                    FlagDecision::Default { label },
                    transcript.trim().to_string(),
                )
            }
        };

        ParsedResponse {
            decision,
            explanation,
            class_scores: class_scores.clone(),
            raw: transcript.to_string(),
        }
    }

    fn default_label(&self, class_scores: &ClassScores) -> ClassLabel {
        class_scores
            .best()
            .and_then(|l| self.labels.get(l.as_str()).ok())
            .unwrap_or_else(|| self.labels.first())
            .clone()
    }

    /// The last `...flag : value` line whose value contains a token.
    fn last_flag_line(&self, original: &str, lowered: &str) -> Option<TokenMatch> {
        let mut line_start = 0;
        let mut found = None;
        for line in lowered.split_inclusive('\n') {
            let line_end = line_start + line.len();
            if let Some((key_at, value_at)) = flag_value_offset(line)
                && let Some(m) = self.earliest_token(lowered, line_start + value_at, line_end)
            {
                let key = flag_key_prefix(&original[line_start..line_start + key_at]);
                found = Some(self.bind_boolean(lowered, m, key));
            }
            line_start = line_end;
        }
        found
    }

    /// Rebinds a `true`/`false` token to the label named by the flag key, if any.
    fn bind_boolean(&self, lowered: &str, m: TokenMatch, key: &str) -> TokenMatch {
        if self.labels.len() != 2 {
            return m;
        }
        let Some(named) = self.label_in_key(key) else {
            return m;
        };

        let label = match &lowered[m.start..m.end] {
            "true" => named.clone(),
            "false" => match self.labels.iter().find(|l| *l != named) {
                Some(other) => other.clone(),
                None => return m,
            },
            _ => return m,
        };
        TokenMatch { label, ..m }
    }

    /// The single label that appears as a segment of `key`, e.g. `clean` in `CleanFlag`.
    fn label_in_key(&self, key: &str) -> Option<&ClassLabel> {
        let mut named = self
            .labels
            .iter()
            .filter(|l| has_segment(key, &l.as_str().to_ascii_lowercase()));
        match (named.next(), named.next()) {
            (Some(label), None) => Some(label),
            _ => None,
        }
    }

    /// Earliest whole-word token inside `lowered[from..to]`; longer tokens win ties.
    fn earliest_token(&self, lowered: &str, from: usize, to: usize) -> Option<TokenMatch> {
        let haystack = &lowered[from..to];
        let mut best: Option<TokenMatch> = None;

        for (token, label) in &self.vocabulary {
            if token.is_empty() {
                continue;
            }
            let Some(at) = find_word(haystack, token) else {
                continue;
            };
            let start = from + at;
            if best.as_ref().is_none_or(|b| start < b.start) {
                best = Some(TokenMatch {
                    start,
                    end: start + token.len(),
                    label: label.clone(),
                });
            }
        }
        best
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// First occurrence of `word` in `haystack` bounded by non-word characters.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    haystack.match_indices(word).map(|(at, _)| at).find(|&at| {
        let end = at + word.len();
        let before_ok = at == 0 || !is_word_byte(bytes[at - 1]);
        let after_ok = end == bytes.len() || !is_word_byte(bytes[end]);
        before_ok && after_ok
    })
}

/// `(key offset, offset just past key\s*[:=])` for the first `key` followed by a
/// separator, searching left to right.
fn key_value_offset(text: &str, key: &str, whole_word: bool) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    for (at, _) in text.match_indices(key) {
        if whole_word && at > 0 && is_word_byte(bytes[at - 1]) {
            continue;
        }
        let mut i = at + key.len();
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            i += 1;
        }
        if i < bytes.len() && (bytes[i] == b':' || bytes[i] == b'=') {
            return Some((at, i + 1));
        }
    }
    None
}

/// `<ident>Flag: value` inside one line. Any identifier prefix is allowed.
fn flag_value_offset(line: &str) -> Option<(usize, usize)> {
    key_value_offset(line, FLAG_KEY, false)
}

fn explanation_marker(lowered: &str) -> Option<usize> {
    key_value_offset(lowered, EXPLANATION_KEY, true).map(|(_, value_at)| value_at)
}

/// The identifier immediately before `Flag`, with its original casing.
fn flag_key_prefix(before_flag: &str) -> &str {
    let bytes = before_flag.as_bytes();
    let mut start = bytes.len();
    while start > 0 && (is_word_byte(bytes[start - 1]) || bytes[start - 1] == b'-') {
        start -= 1;
    }
    &before_flag[start..]
}

/// Whether `segment` (lowercase) occurs in `key` bounded by separators, the key ends or
/// camel-case humps: `clean` is a segment of `CleanFlag`, `is_clean` and `PanelClean`.
fn has_segment(key: &str, segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let original = key.as_bytes();
    let lowered = key.to_ascii_lowercase();
    let bytes = lowered.as_bytes();

    lowered.match_indices(segment).any(|(at, _)| {
        let end = at + segment.len();
        let start_ok = at == 0
            || !bytes[at - 1].is_ascii_alphanumeric()
            || original[at].is_ascii_uppercase();
        let end_ok = end == bytes.len()
            || !bytes[end].is_ascii_alphanumeric()
            || original[end].is_ascii_uppercase();
        start_ok && end_ok
    })
}

/// Trims whitespace and separator punctuation left between a token and its explanation.
fn trim_lead(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | ',' | '.' | ';'))
        .trim_end()
}
