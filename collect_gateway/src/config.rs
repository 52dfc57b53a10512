use std::time::Duration;

use log::*;
use fpg_common::Secret;

const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the collect gateway API, e.g. "https://gateway.example.com/erp"
    pub base_url: String,
    /// The school identifier this deployment collects for. Included in every signed payload.
    pub school_id: String,
    /// Human-readable gateway name recorded against each order.
    pub gateway_name: String,
    /// Pre-shared key used for all HS256 tokens exchanged with the gateway.
    pub signing_key: Secret<String>,
    /// Timeout for the collect-request creation call.
    pub create_timeout: Duration,
    /// Timeout for the status poll call.
    pub poll_timeout: Duration,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("FPG_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            warn!("FPG_GATEWAY_BASE_URL not set, using (probably useless) default");
            "https://gateway.example.com".to_string()
        });
        let school_id = std::env::var("FPG_GATEWAY_SCHOOL_ID").unwrap_or_else(|_| {
            warn!("FPG_GATEWAY_SCHOOL_ID not set, using (probably useless) default");
            "SCHOOL-000000".to_string()
        });
        let gateway_name = std::env::var("FPG_GATEWAY_NAME").unwrap_or_else(|_| "CollectGateway".to_string());
        let signing_key = Secret::new(std::env::var("FPG_GATEWAY_SIGNING_KEY").unwrap_or_else(|_| {
            warn!("FPG_GATEWAY_SIGNING_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let create_timeout = timeout_from_env("FPG_GATEWAY_CREATE_TIMEOUT", DEFAULT_CREATE_TIMEOUT);
        let poll_timeout = timeout_from_env("FPG_GATEWAY_POLL_TIMEOUT", DEFAULT_POLL_TIMEOUT);
        Self { base_url, school_id, gateway_name, signing_key, create_timeout, poll_timeout }
    }
}

fn timeout_from_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("Invalid value for {var}: {e}. Using the default of {}s.", default.as_secs()))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(default)
}
