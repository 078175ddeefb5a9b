//! Geo Resolver
//!
//! Picks a single place for an event purely from its text.
//!
//! # Token-span algorithm
//!
//! ```text
//! 1. Tokenize: words are runs of alphanumerics (inner ' and - allowed).
//!    Punctuation other than whitespace ends a run ("Paris, Texas" = 2 runs).
//! 2. Runs: maximal sequences of capitalized tokens. Lowercase connectors
//!    ("de", "of", ...) may sit between two capitalized tokens.
//! 3. Candidates: every sub-span of 1..=3 tokens inside a run that neither
//!    starts nor ends on a connector, plus every capitalized part of a
//!    hyphenated word ("Russia-Ukraine" -> "Russia", "Ukraine").
//!    Single-token stop words are dropped.
//! 4. Each candidate is normalized and looked up; a hit yields the most
//!    populous entry of its bucket.
//! 5. Best hit: longest span, then whole words over hyphen parts, then
//!    highest population, then earliest position in the text.
//! 6. Only when nothing hits exactly, the same candidates are matched
//!    against near-identical keys (Jaro-Winkler >= FUZZY_MIN_SIMILARITY)
//!    and the most similar one wins, the ranking above breaking ties.
//! ```
//!
//! No randomness anywhere: same text + same index = same answer.

use crate::model::EventRecord;
use gazetteer::{normalize_name, GazetteerEntry, GazetteerIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Longest candidate span, in words
pub const MAX_SPAN_TOKENS: usize = 3;

/// Lowest Jaro-Winkler similarity the fuzzy fallback accepts
pub const FUZZY_MIN_SIMILARITY: f64 = 0.93;

/// Lowercase words allowed inside a place name
const CONNECTORS: &[&str] = &[
    "de", "del", "della", "da", "do", "dos", "das", "di", "la", "le", "les", "of", "upon", "al",
    "el", "on",
];

/// Capitalized words that are never places on their own
const STOP_WORDS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "today",
    "yesterday", "tomorrow", "breaking", "analysis", "update", "updates", "exclusive", "report",
    "video", "live", "watch", "opinion", "explainer", "fighting", "talks", "stall", "says", "say",
    "the", "a", "an", "in", "on", "at", "as", "after", "before", "how", "why", "what", "who",
    "when", "new", "more", "january", "february", "march", "april", "june", "july", "august",
    "september", "october", "november", "december",
];

/// Location chosen for a piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Gazetteer name of the place
    pub label: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: u64,
    /// Text span that matched, as written
    pub matched_text: String,
    /// Span length in words
    pub span_tokens: usize,
    /// Byte offset of the span in the resolved text
    pub position: usize,
    /// 1.0 for an exact key hit, lower for a fuzzy one
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy)]
struct Token<'t> {
    text: &'t str,
    start: usize,
    end: usize,
    capitalized: bool,
    /// Non-whitespace punctuation follows this token
    breaks_after: bool,
}

fn is_joiner(c: char) -> bool {
    matches!(c, '\'' | '’' | '-')
}

fn is_connector(word: &str) -> bool {
    CONNECTORS.contains(&word)
}

fn is_stop_word(normalized: &str) -> bool {
    STOP_WORDS.contains(&normalized)
}

/// Split text into word tokens, marking where punctuation interrupts
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, first) = chars[i];
        if !first.is_alphanumeric() {
            if !first.is_whitespace() {
                if let Some(last) = tokens.last_mut() {
                    last.breaks_after = true;
                }
            }
            i += 1;
            continue;
        }

        i += 1;
        while i < chars.len() {
            let c = chars[i].1;
            if c.is_alphanumeric() {
                i += 1;
            } else if is_joiner(c) && chars.get(i + 1).is_some_and(|&(_, n)| n.is_alphanumeric()) {
                i += 2;
            } else {
                break;
            }
        }
        let mut end = chars.get(i).map(|&(offset, _)| offset).unwrap_or(text.len());
        let mut breaks_after = false;

        // Possessive ends the name: "Kyiv's mayor" -> "Kyiv"
        let word = &text[start..end];
        for suffix in ["'s", "’s"] {
            if word.len() > suffix.len() && word.ends_with(suffix) {
                end -= suffix.len();
                breaks_after = true;
                break;
            }
        }

        tokens.push(Token {
            text: &text[start..end],
            start,
            end,
            capitalized: first.is_uppercase(),
            breaks_after,
        });
    }

    tokens
}

/// Maximal runs of capitalized tokens, as token index lists
fn capitalized_runs(tokens: &[Token<'_>]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        let joins = tok.capitalized
            || (!current.is_empty()
                && !tok.breaks_after
                && is_connector(tok.text)
                && tokens.get(i + 1).is_some_and(|next| next.capitalized));

        if joins {
            current.push(i);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }

        if tok.breaks_after && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

/// A normalized span worth looking up
#[derive(Debug)]
struct Candidate {
    key: String,
    span: usize,
    start: usize,
    end: usize,
    /// False for one part of a hyphenated word
    whole: bool,
}

fn candidates(tokens: &[Token<'_>], max_span: usize) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();

    for run in capitalized_runs(tokens) {
        for offset in 0..run.len() {
            for span in 1..=max_span.min(run.len() - offset) {
                let words = &run[offset..offset + span];
                let first = &tokens[words[0]];
                let last = &tokens[words[span - 1]];
                if !first.capitalized || !last.capitalized {
                    continue;
                }

                let joined = words
                    .iter()
                    .map(|&t| tokens[t].text)
                    .collect::<Vec<_>>()
                    .join(" ");
                let key = normalize_name(&joined);
                if key.is_empty() || (span == 1 && is_stop_word(&key)) {
                    continue;
                }
                out.push(Candidate {
                    key,
                    span,
                    start: first.start,
                    end: last.end,
                    whole: true,
                });
            }
        }
    }

    // "Russia-Ukraine", "pro-Russia": each capitalized part on its own
    for tok in tokens.iter().filter(|t| t.text.contains('-')) {
        let mut part_start = tok.start;
        for part in tok.text.split('-') {
            let start = part_start;
            part_start += part.len() + 1;

            if !part.chars().next().is_some_and(char::is_uppercase) {
                continue;
            }
            let key = normalize_name(part);
            if key.is_empty() || is_stop_word(&key) {
                continue;
            }
            out.push(Candidate {
                key,
                span: 1,
                start,
                end: start + part.len(),
                whole: false,
            });
        }
    }

    out
}

/// A candidate that hit the index
#[derive(Debug)]
struct Hit<'a> {
    entry: &'a GazetteerEntry,
    span: usize,
    start: usize,
    end: usize,
    whole: bool,
    similarity: f64,
}

impl<'a> Hit<'a> {
    fn new(candidate: &Candidate, entry: &'a GazetteerEntry, similarity: f64) -> Self {
        Self {
            entry,
            span: candidate.span,
            start: candidate.start,
            end: candidate.end,
            whole: candidate.whole,
            similarity,
        }
    }

    /// Larger is better: span, whole word, population, then earlier position
    fn rank(&self) -> (usize, bool, u64, Reverse<usize>) {
        (self.span, self.whole, self.entry.population, Reverse(self.start))
    }

    fn beats(&self, other: &Hit<'_>) -> bool {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| self.rank().cmp(&other.rank()))
            .is_gt()
    }
}

fn best_hit<'a>(hits: impl Iterator<Item = Hit<'a>>) -> Option<Hit<'a>> {
    hits.fold(None, |best, hit| match best {
        Some(b) if !hit.beats(&b) => Some(b),
        _ => Some(hit),
    })
}

/// Resolve free text to the single best gazetteer match.
///
/// `None` means no candidate matched; that is a normal outcome.
pub fn resolve(text: &str, index: &GazetteerIndex) -> Option<ResolvedLocation> {
    let tokens = tokenize(text);
    let max_span = MAX_SPAN_TOKENS.min(index.max_key_tokens().max(1));
    let candidates = candidates(&tokens, max_span);

    let exact = candidates
        .iter()
        .filter_map(|c| index.best_normalized(&c.key).map(|entry| Hit::new(c, entry, 1.0)));

    let hit = best_hit(exact).or_else(|| {
        best_hit(candidates.iter().filter_map(|c| {
            index
                .best_fuzzy(&c.key, FUZZY_MIN_SIMILARITY)
                .map(|m| Hit::new(c, m.entry, m.similarity))
        }))
    })?;

    debug!(
        "Resolved {:?} -> {} ({}, pop={}, sim={:.3})",
        &text[hit.start..hit.end],
        hit.entry.name,
        hit.entry.country_code,
        hit.entry.population,
        hit.similarity
    );

    Some(ResolvedLocation {
        label: hit.entry.name.clone(),
        country_code: hit.entry.country_code.clone(),
        latitude: hit.entry.latitude,
        longitude: hit.entry.longitude,
        population: hit.entry.population,
        matched_text: text[hit.start..hit.end].to_string(),
        span_tokens: hit.span,
        position: hit.start,
        similarity: hit.similarity,
    })
}

/// Resolve an event from its title followed by its summary.
///
/// The two are joined with a separator so a run never spans both.
pub fn resolve_event(event: &EventRecord, index: &GazetteerIndex) -> Option<ResolvedLocation> {
    resolve(&format!("{} | {}", event.title, event.summary), index)
}
