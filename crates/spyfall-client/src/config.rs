//! Client configuration: where the lobby server lives.
//!
//! The backend address comes from a single `API_URL` value (`host[:port]`,
//! no scheme). The client dials `{scheme}://{API_URL}{path}`, which with
//! the defaults is `ws://{API_URL}/api`.

use url::Url;

use crate::ConfigError;

/// Environment variable holding the backend `host[:port]`.
pub const API_URL_ENV: &str = "API_URL";

/// Configuration for a [`LobbyClient`](crate::LobbyClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend `host[:port]`. `None` until configured.
    pub api_url: Option<String>,

    /// `ws` or `wss`.
    pub scheme: String,

    /// Path of the socket endpoint on the server.
    pub path: String,

    /// Capacity of the [`ClientEvent`](crate::ClientEvent) broadcast
    /// channel. Slow event subscribers lag (and skip) past this many
    /// unread events.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            scheme: "ws".to_string(),
            path: "/api".to_string(),
            event_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Builds a config from the process environment (`API_URL`).
    ///
    /// A missing variable is not an error here; [`ws_url`](Self::ws_url)
    /// reports it when the URL is actually needed.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(API_URL_ENV).ok(),
            ..Self::default()
        }
    }

    /// Sets the backend `host[:port]`.
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Sets the URL scheme (`ws` or `wss`).
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the socket endpoint path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the event channel capacity (at least 1).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Assembles and validates the socket URL.
    ///
    /// # Errors
    /// - [`ConfigError::MissingApiUrl`]: no (or a blank) `api_url`
    /// - [`ConfigError::UnsupportedScheme`]: scheme isn't `ws`/`wss`
    /// - [`ConfigError::InvalidUrl`]: the result doesn't parse
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        let host = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;

        if !matches!(self.scheme.as_str(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme(self.scheme.clone()));
        }

        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let raw = format!("{}://{}{}", self.scheme, host.trim_end_matches('/'), path);

        let parsed = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidUrl {
                url: raw,
                source: url::ParseError::EmptyHost,
            });
        }

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url_shape() {
        let url = ClientConfig::default()
            .api_url("localhost:8080")
            .ws_url()
            .unwrap();
        assert_eq!(url, "ws://localhost:8080/api");
    }

    #[test]
    fn test_missing_api_url_is_an_error() {
        let result = ClientConfig::default().ws_url();
        assert!(matches!(result, Err(ConfigError::MissingApiUrl)));

        let result = ClientConfig::default().api_url("   ").ws_url();
        assert!(matches!(result, Err(ConfigError::MissingApiUrl)));
    }

    #[test]
    fn test_wss_and_custom_path() {
        let url = ClientConfig::default()
            .api_url("lobby.example.com")
            .scheme("wss")
            .path("socket")
            .ws_url()
            .unwrap();
        assert_eq!(url, "wss://lobby.example.com/socket");
    }

    #[test]
    fn test_http_scheme_rejected() {
        let result = ClientConfig::default()
            .api_url("localhost")
            .scheme("http")
            .ws_url();
        assert!(matches!(result, Err(ConfigError::UnsupportedScheme(s)) if s == "http"));
    }

    #[test]
    fn test_garbage_host_rejected() {
        let result = ClientConfig::default().api_url("local host:99999").ws_url();
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_event_capacity_never_zero() {
        assert_eq!(ClientConfig::default().event_capacity(0).event_capacity, 1);
    }
}
