use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "https://api.gateway.ai";

/// Static configuration shared by every call made through a `GatewayClient`.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the gateway.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Default deadline for each call. `None` means no deadline unless a call
    /// sets one.
    pub timeout: Option<Duration>,
    /// Overrides the library user-agent.
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Creates a config with the default base URL and no default deadline.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            user_agent: None,
        }
    }

    /// Builds a config from `GATEWAY_API_KEY`, `GATEWAY_BASE_URL` and
    /// `GATEWAY_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var("GATEWAY_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config("missing GATEWAY_API_KEY".into()));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GATEWAY_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url.trim());
        }
        if let Ok(raw) = std::env::var("GATEWAY_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ClientError::Config(format!("invalid GATEWAY_TIMEOUT_SECS {raw:?}: {e}"))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the user-agent sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn user_agent_value(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("gateway-client-rust/{}", env!("CARGO_PKG_VERSION")))
    }
}
