use std::{env, path::PathBuf, time::Duration};

use log::{debug, error, info};
use url::Url;

use crate::error::{BotError, Result};

const DEFAULT_DATABASE_PATH: &str = "cinema_bot.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_KINOPOISK_API_URL: &str = "https://api.kinopoisk.dev/v1.4/movie/search";
pub const DEFAULT_VK_API_URL: &str = "https://api.vk.com/method/video.search";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub kinopoisk_token: String,
    pub vk_token: String,
    pub database_path: PathBuf,
    pub http_timeout: Duration,
    pub kinopoisk_api_url: Url,
    pub vk_api_url: Url,
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|e| {
        error!("Failed to load {name} from environment: {e}");
        BotError::from(e)
    })
}

fn parse_timeout(raw: Option<String>) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(BotError::Config(format!(
            "HTTP_TIMEOUT_SECS must be a positive integer, got {raw:?}"
        ))),
    }
}

fn parse_url(name: &str, raw: Option<String>, default: &str) -> Result<Url> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| BotError::Config(format!("{name} is not a valid URL: {e}")))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        let discord_token = required("DISCORD_TOKEN")?;
        let kinopoisk_token = required("KINOPOISK_TOKEN")?;
        let vk_token = required("VK_TOKEN")?;

        let database_path = env::var("DATABASE_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH), PathBuf::from);
        let http_timeout = parse_timeout(env::var("HTTP_TIMEOUT_SECS").ok())?;
        let kinopoisk_api_url = parse_url(
            "KINOPOISK_API_URL",
            env::var("KINOPOISK_API_URL").ok(),
            DEFAULT_KINOPOISK_API_URL,
        )?;
        let vk_api_url = parse_url("VK_API_URL", env::var("VK_API_URL").ok(), DEFAULT_VK_API_URL)?;

        info!("Configuration loaded successfully");
        debug!("Discord token length: {} characters", discord_token.len());
        debug!("Kinopoisk token length: {} characters", kinopoisk_token.len());
        debug!("VK token length: {} characters", vk_token.len());
        debug!("Database path: {}", database_path.display());
        debug!("HTTP timeout: {http_timeout:?}");

        Ok(Self {
            discord_token,
            kinopoisk_token,
            vk_token,
            database_path,
            http_timeout,
            kinopoisk_api_url,
            vk_api_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults_when_unset() -> Result<()> {
        assert_eq!(
            parse_timeout(None)?,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
        Ok(())
    }

    #[test]
    fn timeout_rejects_zero_and_garbage() {
        assert!(parse_timeout(Some("0".to_string())).is_err());
        assert!(parse_timeout(Some("soon".to_string())).is_err());
    }

    #[test]
    fn timeout_accepts_padded_number() -> Result<()> {
        assert_eq!(parse_timeout(Some(" 3 ".to_string()))?, Duration::from_secs(3));
        Ok(())
    }

    #[test]
    fn url_override_is_validated() {
        assert!(parse_url("VK_API_URL", Some("not a url".to_string()), DEFAULT_VK_API_URL).is_err());
        let url = parse_url("VK_API_URL", None, DEFAULT_VK_API_URL).expect("default url parses");
        assert_eq!(url.host_str(), Some("api.vk.com"));
    }
}
