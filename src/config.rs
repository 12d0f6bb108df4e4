use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/callback";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com";
pub const DEFAULT_TOKEN_FILE: &str = ".spotify_tokens.json";

/// Scopes needed to read the current track and to play/pause it.
pub const SCOPES: &[&str] = &[
    "user-read-currently-playing",
    "user-read-playback-state",
    "user-modify-playback-state",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
    pub token_file: PathBuf,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
}

impl Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            spotify_client_id: client_id.into(),
            spotify_client_secret: client_secret.into(),
            spotify_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            http_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source, e.g. the process
    /// environment or a fixed map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let spotify_client_id = lookup("SPOTIFY_CLIENT_ID")
            .ok_or_else(|| AppError::Config("SPOTIFY_CLIENT_ID not set".into()))?;

        let spotify_client_secret = lookup("SPOTIFY_CLIENT_SECRET")
            .ok_or_else(|| AppError::Config("SPOTIFY_CLIENT_SECRET not set".into()))?;

        let mut config = Self::new(spotify_client_id, spotify_client_secret);

        if let Some(uri) = lookup("SPOTIFY_REDIRECT_URI") {
            config.spotify_redirect_uri = uri;
        }
        if let Some(url) = lookup("SPOTIFY_ACCOUNTS_URL") {
            config.accounts_url = url;
        }
        if let Some(url) = lookup("SPOTIFY_API_URL") {
            config.api_url = url;
        }
        if let Some(path) = lookup("SPOTIFY_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(secs) = parse_secs(&lookup, "SPOTIFY_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, "SPOTIFY_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Space-separated scope string as sent to the authorize endpoint.
    pub fn scope(&self) -> String {
        SCOPES.join(" ")
    }

    pub fn get_missing_config(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.spotify_client_id.is_empty() {
            missing.push("SPOTIFY_CLIENT_ID".to_string());
        }
        if self.spotify_client_secret.is_empty() {
            missing.push("SPOTIFY_CLIENT_SECRET".to_string());
        }

        missing
    }

    pub fn validate_spotify_config(&self) -> bool {
        !self.spotify_client_id.is_empty() && !self.spotify_client_secret.is_empty()
    }
}

/// Whole, non-zero seconds; zero would mean an instant timeout or a
/// busy poll loop.
fn parse_secs<F>(lookup: &F, name: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(AppError::Config(format!("{} must be at least 1 second", name))),
        Ok(secs) => Ok(Some(secs)),
        Err(_) => Err(AppError::Config(format!(
            "{} must be a whole number of seconds",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const CREDENTIALS: [(&str, &str); 2] = [
        ("SPOTIFY_CLIENT_ID", "id"),
        ("SPOTIFY_CLIENT_SECRET", "secret"),
    ];

    #[test]
    fn test_lookup_applies_optional_overrides() {
        let mut vars = CREDENTIALS.to_vec();
        vars.extend([
            ("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:8080/callback"),
            ("SPOTIFY_ACCOUNTS_URL", "http://localhost:9000"),
            ("SPOTIFY_API_URL", "http://localhost:9001"),
            ("SPOTIFY_TOKEN_FILE", "/tmp/tokens.json"),
            ("SPOTIFY_HTTP_TIMEOUT_SECS", " 30 "),
            ("SPOTIFY_POLL_INTERVAL_SECS", "2"),
        ]);

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.spotify_client_id, "id");
        assert_eq!(config.spotify_redirect_uri, "http://127.0.0.1:8080/callback");
        assert_eq!(config.accounts_url, "http://localhost:9000");
        assert_eq!(config.api_url, "http://localhost:9001");
        assert_eq!(config.token_file, PathBuf::from("/tmp/tokens.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_lookup_without_overrides_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&CREDENTIALS)).unwrap();

        assert_eq!(config.accounts_url, DEFAULT_ACCOUNTS_URL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token_file, PathBuf::from(DEFAULT_TOKEN_FILE));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_lookup_requires_credentials() {
        let result = Config::from_lookup(lookup_from(&[("SPOTIFY_CLIENT_ID", "id")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_seconds_rejected() {
        for name in ["SPOTIFY_POLL_INTERVAL_SECS", "SPOTIFY_HTTP_TIMEOUT_SECS"] {
            let mut vars = CREDENTIALS.to_vec();
            vars.push((name, "0"));

            let result = Config::from_lookup(lookup_from(&vars));
            assert!(matches!(result, Err(AppError::Config(_))), "{} = 0 accepted", name);
        }
    }

    #[test]
    fn test_non_numeric_seconds_rejected() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("SPOTIFY_POLL_INTERVAL_SECS", "5s"));

        assert!(Config::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("id", "secret");
        assert_eq!(config.spotify_redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.validate_spotify_config());
    }

    #[test]
    fn test_scope_string() {
        let config = Config::new("id", "secret");
        assert_eq!(
            config.scope(),
            "user-read-currently-playing user-read-playback-state user-modify-playback-state"
        );
    }

    #[test]
    fn test_missing_config() {
        let config = Config::new("", "secret");
        assert_eq!(config.get_missing_config(), vec!["SPOTIFY_CLIENT_ID".to_string()]);
        assert!(!config.validate_spotify_config());
    }
}
