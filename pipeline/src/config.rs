//! Configuration module for environment variable parsing.
//!
//! Both binaries read their settings once at startup. Blank values are treated
//! as unset, and unparsable numbers fall back to the documented default.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Errors raised while resolving configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {0:?}")]
    ListenAddr(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address; `:8080` means every interface on port 8080
    pub http_addr: String,

    /// Queue Store address, `host:port` or a `redis://` URL
    pub redis_addr: String,

    /// Name of the list holding the backlog
    pub queue_name: String,

    /// Result Sink file
    pub output_path: PathBuf,

    /// Artificial per-message processing delay
    pub processing_delay: Duration,

    /// Bounded wait of each blocking pop
    pub pop_timeout: Duration,

    /// Sleep after a failed pop before polling again
    pub retry_backoff: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            http_addr: var_or("HTTP_ADDR", ":8080"),

            redis_addr: var_or("REDIS_ADDR", "redis:6379"),

            queue_name: var_or("QUEUE_NAME", "messages"),

            output_path: PathBuf::from(var_or("OUTPUT_PATH", "/data/processed.log")),

            processing_delay: Duration::from_millis(parse_u64("PROCESSING_DELAY_MS", 0)),

            pop_timeout: Duration::from_secs(parse_u64("POP_TIMEOUT_SECS", 5).max(1)),

            retry_backoff: Duration::from_millis(parse_u64("RETRY_BACKOFF_MS", 1000)),
        }
    }

    /// Resolve `http_addr` into a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_addr(&self.http_addr)
    }
}

/// Parse `host:port`, or `:port` for all interfaces.
fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => raw.to_string(),
    };

    candidate
        .parse()
        .map_err(|_| ConfigError::ListenAddr(raw.to_string()))
}

/// Read a variable, treating blank as unset.
fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_u64(name: &str, default: u64) -> u64 {
    let raw = match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return default,
    };

    match raw.trim().parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid integer, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_or_blank_is_unset() {
        env::set_var("RELAYQ_TEST_BLANK", "   ");
        assert_eq!(var_or("RELAYQ_TEST_BLANK", "fallback"), "fallback");
        env::remove_var("RELAYQ_TEST_BLANK");
    }

    #[test]
    fn test_var_or_trims() {
        env::set_var("RELAYQ_TEST_TRIM", "  jobs ");
        assert_eq!(var_or("RELAYQ_TEST_TRIM", "messages"), "jobs");
        env::remove_var("RELAYQ_TEST_TRIM");
    }

    #[test]
    fn test_parse_u64_invalid_uses_default() {
        env::set_var("RELAYQ_TEST_DELAY", "soon");
        assert_eq!(parse_u64("RELAYQ_TEST_DELAY", 7), 7);
        env::set_var("RELAYQ_TEST_DELAY", "250");
        assert_eq!(parse_u64("RELAYQ_TEST_DELAY", 7), 250);
        env::remove_var("RELAYQ_TEST_DELAY");
    }

    #[test]
    fn test_parse_u64_default() {
        assert_eq!(parse_u64("RELAYQ_TEST_NONEXISTENT", 1000), 1000);
    }

    #[test]
    fn test_listen_addr_port_only() {
        let addr = parse_listen_addr(":8080").unwrap();
        assert_eq!(addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_listen_addr_full() {
        let addr = parse_listen_addr("127.0.0.1:9000").unwrap();
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_listen_addr_invalid() {
        assert!(parse_listen_addr("not-an-address").is_err());
    }
}
