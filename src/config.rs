use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::mail::SmtpSettings;
use crate::outbox::OutboxSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub redis_url: String,
    pub smtp: SmtpSettings,
    pub outbox: OutboxSettings,
    /// Interval of the background drain timer; `None` leaves draining to explicit calls.
    pub drain_interval: Option<Duration>,
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server_port = match var("SERVER_PORT") {
            Some(value) => parse("SERVER_PORT", value)?,
            None => 8080,
        };

        let redis_url = match var("REDIS_URL") {
            Some(url) => url,
            None => {
                let host = var("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
                let port: u16 = match var("REDIS_PORT") {
                    Some(value) => parse("REDIS_PORT", value)?,
                    None => 6379,
                };
                match var("REDIS_PASSWORD") {
                    Some(password) => format!("redis://:{}@{}:{}", password, host, port),
                    None => format!("redis://{}:{}", host, port),
                }
            }
        };

        let send_timeout = match var("OUTBOX_SEND_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse("OUTBOX_SEND_TIMEOUT_SECS", value)?),
            None => OutboxSettings::default().send_timeout,
        };

        let max_attempts = match var("OUTBOX_MAX_ATTEMPTS") {
            Some(value) => match parse::<u32>("OUTBOX_MAX_ATTEMPTS", value.clone())? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "OUTBOX_MAX_ATTEMPTS",
                        value,
                    })
                }
                n => Some(n),
            },
            None => None,
        };

        let drain_interval = match var("OUTBOX_DRAIN_INTERVAL_SECS") {
            Some(value) => match parse::<u64>("OUTBOX_DRAIN_INTERVAL_SECS", value)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        let smtp_user = var("SMTP_USER");
        let smtp_pass = var("SMTP_PASS");
        match (&smtp_user, &smtp_pass) {
            (Some(_), None) => return Err(ConfigError::Missing("SMTP_PASS")),
            (None, Some(_)) => return Err(ConfigError::Missing("SMTP_USER")),
            _ => {}
        }
        let smtp_from = var("SMTP_FROM")
            .or_else(|| smtp_user.clone())
            .ok_or(ConfigError::Missing("SMTP_FROM"))?;
        let smtp = SmtpSettings {
            host: var("SMTP_HOST").ok_or(ConfigError::Missing("SMTP_HOST"))?,
            port: match var("SMTP_PORT") {
                Some(value) => parse("SMTP_PORT", value)?,
                None => 587,
            },
            username: smtp_user,
            password: smtp_pass,
            from: smtp_from,
            timeout: send_timeout,
        };

        Ok(Self {
            server_host: var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port,
            redis_url,
            smtp,
            outbox: OutboxSettings {
                send_timeout,
                max_attempts,
            },
            drain_interval,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
