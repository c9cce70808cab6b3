use super::error::{RestDaoError, RestResult};

/// Runtime configuration describing how to reach the hosted store.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the store, without a trailing slash.
    pub base_url: String,
    /// Optional auth token appended to every request.
    pub auth_token: Option<String>,
}

impl RestConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Attach an auth token to the configuration.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> RestResult<Self> {
        let base_url =
            std::env::var("PARTYQ_STORE_BASE_URL").map_err(|_| RestDaoError::MissingEnvVar {
                var: "PARTYQ_STORE_BASE_URL",
            })?;

        let mut config = Self::new(base_url);
        if let Ok(token) = std::env::var("PARTYQ_STORE_AUTH") {
            config = config.with_auth_token(token);
        }
        Ok(config)
    }
}
