//! Server configuration parsed from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_PLAYERS: usize = 10;
pub const DEFAULT_MAX_SCORE: u32 = 10;
pub const DEFAULT_TIMEOUT_MULTIPLIER: u32 = 1;
pub const DEFAULT_STAGE_SECS: u64 = 30;
pub const DEFAULT_WINNER_STAGE_SECS: u64 = 5;
pub const DEFAULT_DISCONNECT_GRACE_SECS: u64 = 10;
pub const DEFAULT_RATE_LIMIT_MESSAGES: usize = 30;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_ROOM_GC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Seats per room.
    pub max_players: usize,
    /// Score that ends a game.
    pub max_score: u32,
    /// Writing and voting stage length (already scaled by the multiplier).
    pub stage_timeout: Duration,
    /// How long the winner is shown before the next round.
    pub winner_timeout: Duration,
    pub disconnect_grace: Duration,
    pub rate_limit: RateLimitConfig,
    pub room_gc_interval: Duration,
    pub status_interval: Duration,
    /// Question deck file. The built-in deck is used when unset.
    pub questions_file: Option<PathBuf>,
    /// Static SPA directory served at `/`.
    pub web_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Build typed config from environment variables.
    ///
    /// All keys are optional:
    /// - `ADDR`: listen address, default `0.0.0.0:8080`
    /// - `MAX_PLAYERS`, `MAX_SCORE`: room capacity and winning score
    /// - `STAGE_SECS` × `TIMEOUT_MULTIPLIER`: writing/voting stage length
    /// - `WINNER_STAGE_SECS`, `DISCONNECT_GRACE_SECS`
    /// - `RATE_LIMIT_MESSAGES` per `RATE_LIMIT_WINDOW_SECS`
    /// - `ROOM_GC_INTERVAL_SECS`, `STATUS_INTERVAL_SECS`
    /// - `QUESTIONS_FILE`, `WEB_DIR`
    ///
    /// # Errors
    ///
    /// Returns an error if `ADDR` is set but is not a socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `ADDR` is set but is not a socket address.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid { key: "ADDR", value: raw_addr.clone() })?;

        let multiplier = parse_or(&lookup, "TIMEOUT_MULTIPLIER", DEFAULT_TIMEOUT_MULTIPLIER).max(1);
        let stage_secs = parse_or(&lookup, "STAGE_SECS", DEFAULT_STAGE_SECS);

        Ok(Self {
            addr,
            max_players: parse_or(&lookup, "MAX_PLAYERS", DEFAULT_MAX_PLAYERS).max(2),
            max_score: parse_or(&lookup, "MAX_SCORE", DEFAULT_MAX_SCORE).max(1),
            stage_timeout: Duration::from_secs(stage_secs.saturating_mul(u64::from(multiplier))),
            winner_timeout: Duration::from_secs(parse_or(&lookup, "WINNER_STAGE_SECS", DEFAULT_WINNER_STAGE_SECS)),
            disconnect_grace: Duration::from_secs(parse_or(
                &lookup,
                "DISCONNECT_GRACE_SECS",
                DEFAULT_DISCONNECT_GRACE_SECS,
            )),
            rate_limit: RateLimitConfig {
                limit: parse_or(&lookup, "RATE_LIMIT_MESSAGES", DEFAULT_RATE_LIMIT_MESSAGES),
                window: Duration::from_secs(parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)),
            },
            room_gc_interval: Duration::from_secs(
                parse_or(&lookup, "ROOM_GC_INTERVAL_SECS", DEFAULT_ROOM_GC_INTERVAL_SECS).max(1),
            ),
            status_interval: Duration::from_secs(
                parse_or(&lookup, "STATUS_INTERVAL_SECS", DEFAULT_STATUS_INTERVAL_SECS).max(1),
            ),
            questions_file: lookup("QUESTIONS_FILE").filter(|v| !v.is_empty()).map(PathBuf::from),
            web_dir: lookup("WEB_DIR").filter(|v| !v.is_empty()).map(PathBuf::from),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_players: DEFAULT_MAX_PLAYERS,
            max_score: DEFAULT_MAX_SCORE,
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_SECS),
            winner_timeout: Duration::from_secs(DEFAULT_WINNER_STAGE_SECS),
            disconnect_grace: Duration::from_secs(DEFAULT_DISCONNECT_GRACE_SECS),
            rate_limit: RateLimitConfig::default(),
            room_gc_interval: Duration::from_secs(DEFAULT_ROOM_GC_INTERVAL_SECS),
            status_interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            questions_file: None,
            web_dir: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
