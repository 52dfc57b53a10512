use std::env;

use collect_gateway::GatewayConfig;
use log::*;

const DEFAULT_FPG_HOST: &str = "127.0.0.1";
const DEFAULT_FPG_PORT: u16 = 8460;
const DEFAULT_REDIRECT_URL: &str = "http://localhost:3000/payment-status";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The frontend URL the payment callback redirects the payer's browser to, with the normalized status
    /// attached as query parameters.
    pub redirect_url: String,
    /// The public base URL of this server. Embedded into the callback URL handed to the gateway, so it must be
    /// reachable from the payer's browser.
    pub public_url: String,
    /// Everything needed to talk to the external collect gateway.
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FPG_HOST.to_string(),
            port: DEFAULT_FPG_PORT,
            database_url: String::default(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            public_url: format!("http://{DEFAULT_FPG_HOST}:{DEFAULT_FPG_PORT}"),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FPG_HOST").ok().unwrap_or_else(|| DEFAULT_FPG_HOST.into());
        let port = env::var("FPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FPG_PORT. {e} Using the default, {DEFAULT_FPG_PORT}, instead."
                    );
                    DEFAULT_FPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FPG_PORT);
        let database_url = env::var("FPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FPG_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let redirect_url = env::var("FPG_REDIRECT_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FPG_REDIRECT_URL is not set. Payers will be redirected to the default, {DEFAULT_REDIRECT_URL}.");
            DEFAULT_REDIRECT_URL.to_string()
        });
        let public_url = env::var("FPG_PUBLIC_URL").ok().unwrap_or_else(|| {
            let fallback = format!("http://{host}:{port}");
            warn!("🪛️ FPG_PUBLIC_URL is not set. Using {fallback}, which the gateway can probably not reach.");
            fallback
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        Self { host, port, database_url, redirect_url, public_url, gateway }
    }
}

//-------------------------------------------------  PaymentSettings  --------------------------------------------------
/// The subset of the server configuration the payment handlers need. Kept small, and excludes secrets, so it can
/// be handed to every request without passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct PaymentSettings {
    pub school_id: String,
    pub gateway_name: String,
    pub public_url: String,
    pub redirect_url: String,
}

impl PaymentSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            school_id: config.gateway.school_id.clone(),
            gateway_name: config.gateway.gateway_name.clone(),
            public_url: config.public_url.clone(),
            redirect_url: config.redirect_url.clone(),
        }
    }
}
