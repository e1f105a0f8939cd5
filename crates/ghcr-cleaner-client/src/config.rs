//! HTTP client configuration

use serde::{Deserialize, Serialize};

/// Default GitHub REST API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default container registry
pub const DEFAULT_REGISTRY_URL: &str = "https://ghcr.io";

/// Credentials and endpoints shared by the GitHub and registry clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// GitHub REST API base URL
    pub api_url: String,
    /// Registry base URL, scheme included
    pub registry_url: String,
    /// Registry user name
    pub username: Option<String>,
    /// Personal access token or `GITHUB_TOKEN`
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            registry_url: std::env::var("GHCR_REGISTRY_URL")
                .unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string()),
            username: std::env::var("GITHUB_ACTOR").ok(),
            token: std::env::var("GITHUB_TOKEN").ok(),
            user_agent: format!("ghcr-cleaner/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for explicit endpoints, without credentials
    pub fn new(api_url: &str, registry: &str) -> Self {
        ClientConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            registry_url: registry_url(registry),
            username: None,
            token: None,
            user_agent: format!("ghcr-cleaner/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the registry from a bare host (`ghcr.io`) or a URL
    pub fn with_registry(mut self, registry: &str) -> Self {
        self.registry_url = registry_url(registry);
        self
    }

    /// Set credentials
    pub fn with_credentials(mut self, username: &str, token: &str) -> Self {
        self.username = Some(username.to_string());
        self.token = Some(token.to_string());
        self
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Registry host without scheme, used as the token `service`
    pub fn registry_host(&self) -> &str {
        self.registry_url
            .split_once("://")
            .map(|(_, host)| host)
            .unwrap_or(&self.registry_url)
            .trim_end_matches('/')
    }
}

/// Prefix a bare host with `https://`.
fn registry_url(registry: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.contains("://") {
        registry.to_string()
    } else {
        format!("https://{registry}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(!config.api_url.is_empty());
        assert!(!config.registry_url.is_empty());
        assert!(config.user_agent.starts_with("ghcr-cleaner/"));
    }

    #[test]
    fn test_bare_registry_host_gets_https() {
        let config = ClientConfig::new("https://api.github.com/", "ghcr.io");
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.registry_url, "https://ghcr.io");
        assert_eq!(config.registry_host(), "ghcr.io");
    }

    #[test]
    fn test_explicit_scheme_is_kept() {
        let config = ClientConfig::new(DEFAULT_API_URL, "http://localhost:5000/");
        assert_eq!(config.registry_url, "http://localhost:5000");
        assert_eq!(config.registry_host(), "localhost:5000");
    }

    #[test]
    fn test_with_credentials() {
        let config = ClientConfig::new(DEFAULT_API_URL, "ghcr.io").with_credentials("me", "secret");
        assert_eq!(config.username.as_deref(), Some("me"));
        assert_eq!(config.token.as_deref(), Some("secret"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
