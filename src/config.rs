use std::fmt;

/// Missing or malformed environment variable
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, value) => write!(f, "{} has an invalid value: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Outbound email settings
///
/// Only the SMTP mailer sees this; request handlers never touch it.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub max_attempts: u32, // Per recipient, including the first try
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub frontend_url: String,
    pub page_size: u32,
    pub video_allowed_hosts: Vec<String>,
    pub email: EmailConfig,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source; `init` passes the process env
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let require = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = require("DATABASE_URL")?;
        let jwt_secret = require("JWT_SECRET_KEY")?;
        let frontend_url = require("FRONTEND_URL")?;
        let port = parse_or(&lookup, "PORT", 8000u16)?;
        let page_size = parse_or(&lookup, "PAGE_SIZE", 10u32)?;
        if !(1..=50).contains(&page_size) {
            return Err(ConfigError::Invalid("PAGE_SIZE", page_size.to_string()));
        }

        let video_allowed_hosts = lookup("VIDEO_ALLOWED_HOSTS")
            .unwrap_or_else(|| "youtube.com".to_string())
            .split(',')
            .map(|host| host.trim().to_lowercase())
            .filter(|host| !host.is_empty())
            .collect::<Vec<_>>();
        if video_allowed_hosts.is_empty() {
            return Err(ConfigError::Invalid("VIDEO_ALLOWED_HOSTS", String::new()));
        }

        let smtp_username = require("SMTP_USERNAME")?;
        let email = EmailConfig {
            smtp_server: require("SMTP_SERVER")?,
            smtp_port: parse_or(&lookup, "SMTP_PORT", 587u16)?,
            smtp_password: require("SMTP_PASSWORD")?,
            from_address: lookup("EMAIL_FROM").unwrap_or_else(|| smtp_username.clone()),
            smtp_username,
            max_attempts: parse_or(&lookup, "EMAIL_MAX_ATTEMPTS", 3u32)?.max(1),
        };

        Ok(Config {
            database_url,
            jwt_secret,
            port,
            frontend_url,
            page_size,
            video_allowed_hosts,
            email,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}
