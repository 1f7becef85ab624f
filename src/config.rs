use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub ranking_timeout_ms: u64,
    pub urgent_window_hours: i64,
    pub soon_window_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            ranking_timeout_ms: parse_or_default("RANKING_TIMEOUT_MS", 2000)?,
            urgent_window_hours: parse_or_default("URGENT_WINDOW_HOURS", 24)?,
            soon_window_hours: parse_or_default("SOON_WINDOW_HOURS", 72)?,
        };

        if config.soon_window_hours < config.urgent_window_hours {
            return Err(AppError::Internal(
                "SOON_WINDOW_HOURS must be >= URGENT_WINDOW_HOURS".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
