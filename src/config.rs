use crate::error::{PerformanceError, Result};
use crate::normalize::NormalizationMode;
use crate::utils::join_url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::env;

const ENV_PREFIX: &str = "PERFORMANCE_";

/// Remote collections the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Auth,
    Sales,
    Orders,
    Targets,
    Teams,
    Clients,
}

impl Endpoint {
    fn segment(&self) -> &'static str {
        match self {
            Endpoint::Auth => "auth",
            Endpoint::Sales => "sales",
            Endpoint::Orders => "orders",
            Endpoint::Targets => "targets",
            Endpoint::Teams => "teams",
            Endpoint::Clients => "clients",
        }
    }

    fn env_key(&self) -> String {
        format!("{}{}_URL", ENV_PREFIX, self.segment().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfig {
    #[schemars(description = "Root of the API, e.g. https://dashboard.example.com")]
    pub base_url: String,

    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub sales_url: Option<String>,
    #[serde(default)]
    pub orders_url: Option<String>,
    #[serde(default)]
    pub targets_url: Option<String>,
    #[serde(default)]
    pub teams_url: Option<String>,
    #[serde(default)]
    pub clients_url: Option<String>,

    #[serde(default)]
    #[schemars(description = "How records that cannot be fully resolved are handled")]
    pub normalization: NormalizationMode,

    #[serde(default = "default_timeout_secs")]
    #[schemars(description = "Per-request timeout in seconds")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_url: None,
            sales_url: None,
            orders_url: None,
            targets_url: None,
            teams_url: None,
            clients_url: None,
            normalization: NormalizationMode::Lenient,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_normalization(mut self, mode: NormalizationMode) -> Self {
        self.normalization = mode;
        self
    }

    /// Reads `PERFORMANCE_API_BASE_URL` and the optional per-endpoint overrides.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var(format!("{}API_BASE_URL", ENV_PREFIX)).map_err(|_| {
            PerformanceError::Config(format!("{}API_BASE_URL is not set", ENV_PREFIX))
        })?;

        let mut config = Self::new(base_url);
        config.auth_url = env::var(Endpoint::Auth.env_key()).ok();
        config.sales_url = env::var(Endpoint::Sales.env_key()).ok();
        config.orders_url = env::var(Endpoint::Orders.env_key()).ok();
        config.targets_url = env::var(Endpoint::Targets.env_key()).ok();
        config.teams_url = env::var(Endpoint::Teams.env_key()).ok();
        config.clients_url = env::var(Endpoint::Clients.env_key()).ok();

        if let Ok(strict) = env::var(format!("{}STRICT_RECORDS", ENV_PREFIX)) {
            if matches!(strict.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                config.normalization = NormalizationMode::Strict;
            }
        }

        if let Ok(raw) = env::var(format!("{}TIMEOUT_SECS", ENV_PREFIX)) {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                PerformanceError::Config(format!("invalid {}TIMEOUT_SECS: {}", ENV_PREFIX, raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ApiConfig)
    }

    /// Pretty-printed schema, suitable for documenting a config file.
    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PerformanceError::Config("base_url is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PerformanceError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Collection URL for an endpoint: the explicit override, else `{base}/api/{segment}`.
    pub fn endpoint(&self, endpoint: Endpoint) -> String {
        let explicit = match endpoint {
            Endpoint::Auth => &self.auth_url,
            Endpoint::Sales => &self.sales_url,
            Endpoint::Orders => &self.orders_url,
            Endpoint::Targets => &self.targets_url,
            Endpoint::Teams => &self.teams_url,
            Endpoint::Clients => &self.clients_url,
        };

        match explicit {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => join_url(&join_url(&self.base_url, "api"), endpoint.segment()),
        }
    }
}
