use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SERVER_BUFFER: usize = 256;
const DEFAULT_CONNECTION_BUFFER: usize = 64;
const DEFAULT_CURSOR_INTERVAL_MS: u64 = 16;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the coordinator's inbound queue.
    pub server_buffer: usize,
    /// Capacity of each connection's outbound queue.
    pub connection_buffer: usize,
    /// Minimum time between forwarded cursor messages of one connection.
    pub cursor_interval: Duration,
    /// Directory with the browser client, served at `/` when set.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            server_buffer: DEFAULT_SERVER_BUFFER,
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
            cursor_interval: Duration::from_millis(DEFAULT_CURSOR_INTERVAL_MS),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT", defaults.port)?;
        let server_buffer = non_zero(parse_var(
            &lookup,
            "WHITEBOARD_SERVER_BUFFER",
            defaults.server_buffer,
        )?)
        .ok_or(ConfigError::Invalid {
            name: "WHITEBOARD_SERVER_BUFFER",
            value: "0".into(),
        })?;
        let connection_buffer = non_zero(parse_var(
            &lookup,
            "WHITEBOARD_CONNECTION_BUFFER",
            defaults.connection_buffer,
        )?)
        .ok_or(ConfigError::Invalid {
            name: "WHITEBOARD_CONNECTION_BUFFER",
            value: "0".into(),
        })?;
        let cursor_interval = Duration::from_millis(parse_var(
            &lookup,
            "WHITEBOARD_CURSOR_INTERVAL_MS",
            DEFAULT_CURSOR_INTERVAL_MS,
        )?);
        let static_dir = lookup("WHITEBOARD_STATIC_DIR").filter(|dir| !dir.trim().is_empty());

        Ok(Self {
            host,
            port,
            server_buffer,
            connection_buffer,
            cursor_interval,
            static_dir,
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn non_zero(value: usize) -> Option<usize> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn it_uses_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_in(&[])).expect("");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), ("127.0.0.1".to_string(), 8080));
    }

    #[test]
    fn it_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup_in(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "3000"),
            ("WHITEBOARD_CONNECTION_BUFFER", "8"),
            ("WHITEBOARD_CURSOR_INTERVAL_MS", "0"),
        ]))
        .expect("");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.connection_buffer, 8);
        assert_eq!(config.server_buffer, 256);
        assert_eq!(config.cursor_interval, Duration::from_millis(0));
        assert_eq!(config.static_dir, None);
    }

    #[test]
    fn it_reads_static_dir_when_not_blank() {
        let config =
            ServerConfig::from_lookup(lookup_in(&[("WHITEBOARD_STATIC_DIR", "../client")]))
                .expect("");
        assert_eq!(config.static_dir.as_deref(), Some("../client"));

        let config = ServerConfig::from_lookup(lookup_in(&[("WHITEBOARD_STATIC_DIR", " ")]))
            .expect("");
        assert_eq!(config.static_dir, None);
    }

    #[test]
    fn it_rejects_invalid_values() {
        assert_eq!(
            ServerConfig::from_lookup(lookup_in(&[("PORT", "http")])),
            Err(ConfigError::Invalid {
                name: "PORT",
                value: "http".into()
            })
        );
        assert!(
            ServerConfig::from_lookup(lookup_in(&[("WHITEBOARD_SERVER_BUFFER", "0")])).is_err()
        );
    }
}
