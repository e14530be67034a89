//! Process configuration loaded from environment variables.

use tracing::warn;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres URL; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    /// Read `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    /// Malformed values fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => defaults.max_connections,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(value = %raw, "invalid DATABASE_MAX_CONNECTIONS, using default");
                    defaults.max_connections
                }
            },
        };

        Self {
            database_url,
            max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(load(&[]), Config::default());
    }

    #[test]
    fn reads_values() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/flagplane"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/flagplane"));
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = load(&[
            ("DATABASE_URL", "  "),
            ("DATABASE_MAX_CONNECTIONS", "zero"),
        ]);
        assert_eq!(config, Config::default());
    }
}
