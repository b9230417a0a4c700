//! Client configuration from environment variables.

use anyhow::Context;

use crate::realtime::ReconnectPolicy;

/// Base URLs of the backend services. Each service hosts its own hubs.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUrls {
    pub messages: String,
    pub events: String,
    pub coaching: String,
    pub notifications: String,
    pub users: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub services: ServiceUrls,
    /// Namespace for everything the client persists locally.
    pub storage_prefix: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `COURTSIDE_MESSAGES_API_URL` (default: "http://localhost:5001")
    /// - `COURTSIDE_EVENTS_API_URL` (default: "http://localhost:5002")
    /// - `COURTSIDE_COACHING_API_URL` (default: "http://localhost:5003")
    /// - `COURTSIDE_NOTIFICATIONS_API_URL` (default: "http://localhost:5004")
    /// - `COURTSIDE_USERS_API_URL` (default: "http://localhost:5005")
    /// - `COURTSIDE_STORAGE_PREFIX` (default: "courtside")
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let url = |name: &str, default: &str| -> anyhow::Result<String> {
            let value = lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string());
            url::Url::parse(&value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;
            Ok(value.trim_end_matches('/').to_string())
        };

        let services = ServiceUrls {
            messages: url("COURTSIDE_MESSAGES_API_URL", "http://localhost:5001")?,
            events: url("COURTSIDE_EVENTS_API_URL", "http://localhost:5002")?,
            coaching: url("COURTSIDE_COACHING_API_URL", "http://localhost:5003")?,
            notifications: url("COURTSIDE_NOTIFICATIONS_API_URL", "http://localhost:5004")?,
            users: url("COURTSIDE_USERS_API_URL", "http://localhost:5005")?,
        };

        let storage_prefix = lookup("COURTSIDE_STORAGE_PREFIX")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "courtside".to_string());

        Ok(Self {
            services,
            storage_prefix,
            reconnect: ReconnectPolicy::default(),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            services: ServiceUrls {
                messages: "http://localhost:5001".to_string(),
                events: "http://localhost:5002".to_string(),
                coaching: "http://localhost:5003".to_string(),
                notifications: "http://localhost:5004".to_string(),
                users: "http://localhost:5005".to_string(),
            },
            storage_prefix: "courtside".to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
