//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Allowed client origins for CORS (comma-separated, empty = same origin only)
    pub client_origin: Option<String>,
    /// Directory holding the browser client
    pub static_dir: String,

    /// Match session rules
    pub session: SessionConfig,

    /// Supabase settings; the leaderboard stays in memory when absent
    pub supabase: Option<SupabaseConfig>,
}

/// Tunables for the match lifecycle
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long an active match runs before it concludes
    pub match_duration: Duration,
    /// Delay between a hit and the target's respawn
    pub respawn_delay: Duration,
    /// Minimum simultaneous players for a match to be active
    pub min_players: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            match_duration: Duration::from_millis(120_000),
            respawn_delay: Duration::from_millis(3_000),
            min_players: 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            match_duration: env_millis("MATCH_DURATION_MS", defaults.match_duration)?,
            respawn_delay: env_millis("RESPAWN_DELAY_MS", defaults.respawn_delay)?,
            min_players: env_parse("MIN_PLAYERS", defaults.min_players)?,
        };
        if session.min_players == 0 {
            return Err(ConfigError::Invalid("MIN_PLAYERS"));
        }

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (Err(_), Ok(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (Err(_), Err(_)) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()),
            session,
            supabase,
        })
    }
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    env_parse(key, default.as_millis() as u64).map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_rules() {
        let rules = SessionConfig::default();
        assert_eq!(rules.match_duration, Duration::from_secs(120));
        assert_eq!(rules.respawn_delay, Duration::from_secs(3));
        assert_eq!(rules.min_players, 2);
    }

    #[test]
    fn unparsable_number_is_rejected() {
        env::set_var("ARENA_TEST_BAD_NUMBER", "soon");
        let result = env_parse::<u64>("ARENA_TEST_BAD_NUMBER", 5);
        assert!(matches!(result, Err(ConfigError::Invalid("ARENA_TEST_BAD_NUMBER"))));
    }

    #[test]
    fn missing_number_falls_back_to_default() {
        let value = env_millis("ARENA_TEST_UNSET_MILLIS", Duration::from_millis(250)).unwrap();
        assert_eq!(value, Duration::from_millis(250));
    }
}
