//! Text normalisation and relevance scoring for disambiguation
//!
//! Normalisation: Unicode lowercase, every non-alphanumeric character becomes
//! a space, whitespace collapsed. Diacritics are kept as-is.

use crate::model::Relevance;
use std::collections::HashSet;

/// Jaro-Winkler similarity at or above which two titles are a partial match
const SIMILARITY_THRESHOLD: f64 = 0.9;
/// Word overlap ratio at or above which two titles are a partial match
const OVERLAP_THRESHOLD: f32 = 0.6;
/// Shorter strings score too high on Jaro-Winkler by chance
const MIN_SIMILARITY_CHARS: usize = 5;

/// Normalise text for comparison
pub fn normalize(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title without decorations like "(Remastered 2011)", "[Live]" or " - Single"
fn title_head(title: &str) -> &str {
    let cut = [" (", " [", " - "]
        .iter()
        .filter_map(|marker| title.find(*marker))
        .min()
        .unwrap_or(title.len());
    let head = title[..cut].trim();
    if head.is_empty() {
        title
    } else {
        head
    }
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", phrase))
}

fn similar_spelling(left: &str, right: &str) -> bool {
    left.chars().count().min(right.chars().count()) >= MIN_SIMILARITY_CHARS
        && strsim::jaro_winkler(left, right) >= SIMILARITY_THRESHOLD
}

fn word_overlap_ratio(left: &str, right: &str) -> f32 {
    let left_tokens: HashSet<&str> = left.split_whitespace().collect();
    let right_tokens: HashSet<&str> = right.split_whitespace().collect();
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }
    let overlap = left_tokens.intersection(&right_tokens).count() as f32;
    overlap / (left_tokens.len().max(right_tokens.len()) as f32)
}

/// Score how well `candidate` matches the queried `target` text
pub fn relevance(target: &str, candidate: &str) -> Relevance {
    let target = normalize(target);
    let full = normalize(candidate);
    if target.is_empty() || full.is_empty() {
        return Relevance::Weak;
    }

    let head = normalize(title_head(candidate));
    if full == target || head == target {
        return Relevance::Exact;
    }

    // Containment only counts on word boundaries ("1" is not part of "1989")
    if contains_phrase(&full, &target)
        || contains_phrase(&target, &head)
        || word_overlap_ratio(&target, &full) >= OVERLAP_THRESHOLD
        || similar_spelling(&target, &head)
    {
        return Relevance::Partial;
    }

    Relevance::Weak
}

/// Case-insensitive, trimmed, whitespace-collapsed fuzzy match
pub fn fuzzy_matches(target: &str, candidate: &str) -> bool {
    relevance(target, candidate) >= Relevance::Partial
}

/// Exact equality after normalisation (used for artist names)
pub fn names_equal(left: &str, right: &str) -> bool {
    let left = normalize(left);
    !left.is_empty() && left == normalize(right)
}

/// Whether any credited artist plausibly is the requested one
pub fn artist_matches<'a>(target: &str, credited: impl IntoIterator<Item = &'a str>) -> bool {
    let mut credited = credited.into_iter().peekable();
    if credited.peek().is_none() {
        // Nothing to compare against
        return true;
    }
    credited.any(|name| fuzzy_matches(target, name))
}
