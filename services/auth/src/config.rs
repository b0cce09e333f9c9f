//! Server settings and the session cookie contract

use axum::http::HeaderValue;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Name of the cookie carrying the session token
pub use common::session_client::SESSION_COOKIE_NAME;

/// HTTP server and background task settings
///
/// # Environment Variables
/// - `AUTH_BIND_ADDR`: listen address (default: 0.0.0.0:8080)
/// - `AUTH_SWEEP_INTERVAL_SECS`: seconds between session sweeps (default: 10)
/// - `AUTH_COOKIE_SECURE`: add `Secure` to the session cookie (default: false)
/// - `AUTH_EVENT_STREAM_MAXLEN`: approximate length cap of event streams (default: 10000)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub sweep_interval_secs: u64,
    pub cookie_secure: bool,
    pub event_stream_maxlen: usize,
}

impl ServerSettings {
    /// Load settings from `AUTH_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("sweep_interval_secs", 10)?
            .set_default("cookie_secure", false)?
            .set_default("event_stream_maxlen", 10_000)?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "AUTH_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(settings)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Attributes of the `session_token` cookie
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookieSettings {
    pub fn new(secure: bool, max_age: Duration) -> Self {
        Self {
            secure,
            max_age_secs: max_age.as_secs(),
        }
    }

    /// `Set-Cookie` value handing `token` to the client
    pub fn session_cookie(&self, token: &str) -> Option<HeaderValue> {
        self.build(token, self.max_age_secs)
    }

    /// `Set-Cookie` value telling the client to drop its session cookie
    pub fn clear_cookie(&self) -> Option<HeaderValue> {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: u64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE_NAME, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "AUTH_BIND_ADDR",
        "AUTH_SWEEP_INTERVAL_SECS",
        "AUTH_COOKIE_SECURE",
        "AUTH_EVENT_STREAM_MAXLEN",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_server_settings_defaults() {
        clear_env();

        let settings = ServerSettings::from_env().unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.sweep_interval(), Duration::from_secs(10));
        assert!(!settings.cookie_secure);
        assert_eq!(settings.event_stream_maxlen, 10_000);
    }

    #[test]
    #[serial]
    fn test_server_settings_from_env() {
        clear_env();
        unsafe {
            std::env::set_var("AUTH_BIND_ADDR", "127.0.0.1:9000");
            std::env::set_var("AUTH_SWEEP_INTERVAL_SECS", "30");
            std::env::set_var("AUTH_COOKIE_SECURE", "true");
        }

        let settings = ServerSettings::from_env().unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
        assert_eq!(settings.sweep_interval_secs, 30);
        assert!(settings.cookie_secure);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_sweep_interval_is_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("AUTH_SWEEP_INTERVAL_SECS", "0");
        }

        assert!(ServerSettings::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = CookieSettings::new(false, Duration::from_secs(3600))
            .session_cookie("abc")
            .unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("session_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_secure_and_clear_cookie() {
        let settings = CookieSettings::new(true, Duration::from_secs(3600));
        let cleared = settings.clear_cookie().unwrap();
        let cleared = cleared.to_str().unwrap();

        assert!(cleared.starts_with("session_token=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert!(cleared.ends_with("; Secure"));
    }
}
