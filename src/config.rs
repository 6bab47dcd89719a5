//! Application configuration.
//!
//! Defaults are conservative: debug output is off, auto-HEAD is off. Values can be
//! read from the environment:
//!
//! - `FLOCK_ENV`: `development` (default), `production` or `test`
//! - `FLOCK_DEBUG`: `true`/`1` to expose internal error text in responses
//! - `FLOCK_AUTO_HEAD`: `true`/`1` to register HEAD alongside every GET route
//! - `FLOCK_POOL_IDLE`: maximum idle contexts kept by the pool (default: 1024)

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::Error;

/// Deployment environment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Env {
    #[default]
    Development,
    Production,
    Test,
}

impl Env {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production  => "production",
            Self::Test        => "test",
        }
    }
}

impl FromStr for Env {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test"                => Ok(Self::Test),
            other                 => Err(Error::InvalidConfig(format!("unknown environment `{other}`"))),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub name: String,
    pub env: Env,
    /// Expose internal error text in error responses.
    pub debug: bool,
    /// Register HEAD for every GET route.
    pub auto_head: bool,
    /// Upper bound on idle contexts kept for reuse.
    pub max_idle_contexts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "flock".to_owned(),
            env: Env::default(),
            debug: false,
            auto_head: false,
            max_idle_contexts: 1024,
        }
    }
}

impl Config {
    /// Loads configuration from `FLOCK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    /// Unparseable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("FLOCK_ENV") {
            match raw.parse() {
                Ok(env) => config.env = env,
                Err(e) => warn!("ignoring FLOCK_ENV: {e}"),
            }
        }
        if let Some(raw) = lookup("FLOCK_DEBUG") {
            config.debug = parse_flag("FLOCK_DEBUG", &raw).unwrap_or(config.debug);
        }
        if let Some(raw) = lookup("FLOCK_AUTO_HEAD") {
            config.auto_head = parse_flag("FLOCK_AUTO_HEAD", &raw).unwrap_or(config.auto_head);
        }
        if let Some(raw) = lookup("FLOCK_POOL_IDLE") {
            match raw.trim().parse() {
                Ok(n) => config.max_idle_contexts = n,
                Err(e) => warn!(value = %raw, "ignoring FLOCK_POOL_IDLE: {e}"),
            }
        }
        config
    }
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on"  => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(value = %raw, "ignoring {key}: expected a boolean");
            None
        }
    }
}
