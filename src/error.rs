use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a call to an external provider failed.
#[derive(Debug)]
pub enum ProviderErrorKind {
    /// The provider answered with a non-success HTTP status.
    Status(StatusCode),
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Connection-level failure before a response was received.
    Transport(String),
    /// The response body could not be interpreted.
    Malformed(String),
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Status(status) => write!(f, "status {status}"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Transport(message) => write!(f, "transport: {message}"),
            ProviderErrorKind::Malformed(message) => write!(f, "malformed response: {message}"),
        }
    }
}

impl ProviderErrorKind {
    /// Classify a `reqwest` failure, keeping timeouts distinct.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if err.is_decode() {
            ProviderErrorKind::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderErrorKind::Status(status)
        } else {
            ProviderErrorKind::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("No movie found for query: {0}")]
    NotFound(String),

    #[error("{provider} provider error: {kind}")]
    Provider {
        provider: &'static str,
        kind: ProviderErrorKind,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Serenity error: {0}")]
    Serenity(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for BotError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        BotError::Serenity(Box::new(err))
    }
}

impl From<rusqlite::Error> for BotError {
    fn from(err: rusqlite::Error) -> Self {
        BotError::Storage(err.to_string())
    }
}

impl BotError {
    /// Build a provider error from a `reqwest` failure.
    pub fn provider(provider: &'static str, err: &reqwest::Error) -> Self {
        BotError::Provider {
            provider,
            kind: ProviderErrorKind::from_reqwest(err),
        }
    }

    /// Returns true when a provider call failed by running out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BotError::Provider {
                kind: ProviderErrorKind::Timeout,
                ..
            }
        )
    }

    /// Returns a user-friendly error message suitable for displaying in Discord
    pub fn user_message(&self) -> String {
        match self {
            BotError::Validation(_) => "Please tell me the title of a movie to look for.".to_string(),
            BotError::NotFound(query) => format!("Nothing found for \"{query}\" :("),
            BotError::Provider { kind, .. } => match kind {
                ProviderErrorKind::Status(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                    "Sorry, I'm having authentication issues with the movie database. Please contact the bot administrator.".to_string()
                }
                ProviderErrorKind::Status(StatusCode::TOO_MANY_REQUESTS) => {
                    "Sorry, the movie database is rate limiting me. Please try again in a few moments.".to_string()
                }
                ProviderErrorKind::Timeout => {
                    "Sorry, the movie database took too long to answer. Please try again.".to_string()
                }
                ProviderErrorKind::Status(_) | ProviderErrorKind::Malformed(_) => {
                    "Sorry, the movie database is experiencing issues right now. Please try again later.".to_string()
                }
                ProviderErrorKind::Transport(_) => {
                    "Sorry, I'm having network issues. Please try again in a moment.".to_string()
                }
            },
            BotError::Storage(_) => {
                "Sorry, I can't reach my search history right now. Please try again later.".to_string()
            }
            BotError::Config(_) | BotError::EnvVar(_) => {
                "Sorry, there's a configuration issue on my end. Please contact the bot administrator.".to_string()
            }
            BotError::Serenity(_) => {
                "Sorry, I'm having trouble communicating with Discord right now. Please try again later.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_detected() {
        let err = BotError::Provider {
            provider: "kinopoisk",
            kind: ProviderErrorKind::Timeout,
        };
        assert!(err.is_timeout());
        assert!(!BotError::NotFound("x".to_string()).is_timeout());
    }

    #[test]
    fn provider_error_display_names_provider_and_status() {
        let err = BotError::Provider {
            provider: "vk",
            kind: ProviderErrorKind::Status(StatusCode::BAD_GATEWAY),
        };
        assert_eq!(err.to_string(), "vk provider error: status 502 Bad Gateway");
    }

    #[test]
    fn not_found_user_message_mentions_query() {
        let err = BotError::NotFound("venom".to_string());
        assert!(err.user_message().contains("venom"));
    }
}
