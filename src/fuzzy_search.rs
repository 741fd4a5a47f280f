//! Fuzzy title matching for reference candidates.

use std::collections::BTreeSet;

use log::debug;
use strsim::normalized_levenshtein;

use crate::types::ReferenceCandidate;

/// Minimum similarity a candidate must reach to be selected.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.6;

/// Lowercase, turn punctuation into spaces and collapse whitespace.
fn normalize(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Weight of a matching release year in the final score.
const YEAR_WEIGHT: f64 = 0.05;

fn is_year(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Split a trailing year token off a canonical "Title (Year)" string.
fn split_year<'s, 't>(tokens: &'s [&'t str]) -> (&'s [&'t str], Option<&'t str>) {
    match tokens.split_last() {
        Some((last, title)) if !title.is_empty() && is_year(last) => (title, Some(*last)),
        _ => (tokens, None),
    }
}

fn char_len(tokens: &BTreeSet<&str>) -> usize {
    tokens.iter().map(|token| token.chars().count()).sum()
}

/// Share of characters covered by tokens both sides have, measured
/// against the longer side. A lone shared word in a long title scores low.
fn token_coverage(left: &[&str], right: &[&str]) -> f64 {
    let left: BTreeSet<&str> = left.iter().copied().collect();
    let right: BTreeSet<&str> = right.iter().copied().collect();

    let longest = char_len(&left).max(char_len(&right));
    if longest == 0 {
        return 0.0;
    }
    let common: usize = left
        .intersection(&right)
        .map(|token| token.chars().count())
        .sum();
    common as f64 / longest as f64
}

/// Title-only similarity: edit distance or token coverage, whichever is higher.
fn title_score(target: &[&str], candidate: &[&str]) -> f64 {
    if target.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(&target.join(" "), &candidate.join(" "))
        .max(token_coverage(target, candidate))
}

/// Similarity between a canonical title and a candidate, in `[0, 1]`.
///
/// A trailing year on the target is matched separately: the candidate's copy
/// of that year is removed before comparing titles and only adds a small
/// bonus, so a year-only or single-word candidate cannot score high.
#[must_use]
pub fn title_similarity(target: &str, candidate: &str) -> f64 {
    let target = normalize(target);
    let candidate = normalize(candidate);
    let target_tokens: Vec<&str> = target.split_whitespace().collect();
    let candidate_tokens: Vec<&str> = candidate.split_whitespace().collect();

    let (target_title, year) = split_year(&target_tokens);
    let Some(year) = year else {
        return title_score(target_title, &candidate_tokens);
    };

    let candidate_title: Vec<&str> = candidate_tokens
        .iter()
        .copied()
        .filter(|token| *token != year)
        .collect();
    let year_bonus = if candidate_title.len() < candidate_tokens.len() {
        YEAR_WEIGHT
    } else {
        0.0
    };

    (1.0 - YEAR_WEIGHT) * title_score(target_title, &candidate_title) + year_bonus
}

/// Index of the best title, if it reaches the acceptance threshold.
///
/// Ties keep the earliest title.
#[must_use]
pub fn best_match_index<'a>(
    target: &str,
    titles: impl IntoIterator<Item = &'a str>,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (index, title) in titles.into_iter().enumerate() {
        let score = title_similarity(target, title);
        if score < ACCEPTANCE_THRESHOLD {
            continue;
        }
        let is_better = best
            .as_ref()
            .is_none_or(|(_, best_score)| score > *best_score);

        if is_better {
            debug!("New best match: {title} (score: {score:.3})");
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
}

/// Pick the candidate whose title best matches the canonical title.
#[must_use]
pub fn select_reference<'a>(
    canonical_title: &str,
    candidates: &'a [ReferenceCandidate],
) -> Option<&'a ReferenceCandidate> {
    best_match_index(
        canonical_title,
        candidates.iter().map(|candidate| candidate.title.as_str()),
    )
    .map(|index| &candidates[index])
}
