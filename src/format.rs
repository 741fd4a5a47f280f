//! Discord message formatting for search results, history and stats.

use std::fmt::Write;
use std::time::Duration;

use crate::types::{MovieInfo, RatingSource, ResolvedReference};

/// Maximum description characters shown before truncation.
const DESCRIPTION_PREVIEW_CHARS: usize = 500;

/// Truncate to `max_chars` characters, appending "..." when cut.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// "2h 49m" style runtime.
#[must_use]
pub fn runtime(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Rating lines, skipping sources that were absent or reported zero.
fn rating_lines(movie: &MovieInfo) -> Vec<String> {
    [RatingSource::Kp, RatingSource::Imdb]
        .into_iter()
        .filter_map(|source| {
            movie
                .ratings
                .get(source)
                .filter(|score| score.abs() > f64::EPSILON)
                .map(|score| format!("{}: *{score}*", source.label()))
        })
        .collect()
}

/// Full reply body for a resolved movie.
#[must_use]
pub fn movie_message(movie: &MovieInfo, reference: &ResolvedReference, elapsed: Duration) -> String {
    let mut message = format!("**{}**\n", movie.canonical_title());

    if let Some(minutes) = movie.runtime_minutes {
        let _ = writeln!(message, "{}", runtime(minutes));
    }

    if !movie.description.is_empty() {
        let _ = write!(
            message,
            "\n{}\n",
            preview(&movie.description, DESCRIPTION_PREVIEW_CHARS)
        );
    }

    let ratings = rating_lines(movie);
    if !ratings.is_empty() {
        let _ = write!(message, "\n{}\n", ratings.join("\n"));
    }

    if let Some(reference) = reference {
        let _ = write!(message, "\n[{}]({})\n", reference.title, reference.url);
    }

    let _ = write!(
        message,
        "\nSearch time: {:.2}s. Enjoy the movie!",
        elapsed.as_secs_f64()
    );
    message
}

/// "query → title" listing, or a notice when empty.
#[must_use]
pub fn history_message(history: &[(String, String)]) -> String {
    if history.is_empty() {
        return "Search history is empty.".to_string();
    }
    let lines: Vec<String> = history
        .iter()
        .map(|(query, title)| format!("{query} → {title}"))
        .collect();
    format!("Search history:\n{}", lines.join("\n"))
}

/// "title - N time(s)" listing, or a notice when empty.
#[must_use]
pub fn stats_message(stats: &[(String, u32)]) -> String {
    if stats.is_empty() {
        return "Stats are empty.".to_string();
    }
    let lines: Vec<String> = stats
        .iter()
        .map(|(title, count)| format!("{title} - {count} time(s)"))
        .collect();
    format!("Movie stats:\n{}", lines.join("\n"))
}

pub const HELP_TEXT: &str = "\
Available commands:
/movie <title> - Find a movie and information about it
/history - Show your search history
/stats - Show how often you searched each movie
/help - Show this help";
