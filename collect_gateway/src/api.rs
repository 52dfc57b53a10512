use std::sync::Arc;

use fpg_common::Money;
use log::*;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{
    data_objects::{parse_collect_request_created, parse_collect_status_report},
    CollectRequestCreated,
    CollectStatusReport,
    GatewayConfig,
    GatewayError,
    SignatureService,
};

/// The outbound contract this system assumes of the collect gateway.
///
/// There are exactly two calls: create a collect request, and ask what became of one. Both are blocking I/O with
/// an explicit timeout; neither is retried here. The trait exists so the HTTP layer can be exercised against a
/// stub gateway in tests.
#[allow(async_fn_in_trait)]
pub trait CollectGateway {
    /// Create a collect request for `amount`, instructing the gateway to redirect the payer's browser to
    /// `callback_url` afterwards. Returns the gateway-assigned collect id and the URL to send the payer to.
    async fn create_collect_request(
        &self,
        amount: Money,
        callback_url: &str,
    ) -> Result<CollectRequestCreated, GatewayError>;

    /// Query the authoritative status of an existing collect request.
    async fn collect_status(&self, collect_request_id: &str) -> Result<CollectStatusReport, GatewayError>;
}

#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    signer: SignatureService,
    client: Arc<Client>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let signer = SignatureService::new(&config.signing_key);
        let client = Client::builder().build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, signer, client: Arc::new(client) })
    }

    pub fn signer(&self) -> &SignatureService {
        &self.signer
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Consume a response, mapping non-success statuses onto the bounded domain error set.
    async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()));
        }
        // The body is still read to completion so the connection can be reused.
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(GatewayError::AuthenticationFailed(format!("{status}: {message}")))
            },
            s if s.is_client_error() => Err(GatewayError::InvalidRequest(format!("{status}: {message}"))),
            s => Err(GatewayError::Unavailable(format!("{s}: {message}"))),
        }
    }

    fn transport_error(e: reqwest::Error) -> GatewayError {
        if e.is_timeout() || e.is_connect() {
            GatewayError::Unavailable(e.to_string())
        } else {
            GatewayError::InvalidRequest(e.to_string())
        }
    }
}

impl CollectGateway for GatewayClient {
    async fn create_collect_request(
        &self,
        amount: Money,
        callback_url: &str,
    ) -> Result<CollectRequestCreated, GatewayError> {
        let school_id = self.config.school_id.as_str();
        let sign = self
            .signer
            .collect_request_token(school_id, amount, callback_url)
            .map_err(|e| GatewayError::Signing(e.to_string()))?;
        let body = serde_json::json!({
            "school_id": school_id,
            "amount": amount,
            "callback_url": callback_url,
            "sign": sign,
        });
        let url = self.url("/create-collect-request");
        trace!("🏦️ POST {url} for {amount}");
        let response = self
            .client
            .post(url)
            .timeout(self.config.create_timeout)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let value = Self::read_json(response).await?;
        let created = parse_collect_request_created(&value)?;
        debug!("🏦️ Collect request {} created", created.collect_request_id);
        Ok(created)
    }

    async fn collect_status(&self, collect_request_id: &str) -> Result<CollectStatusReport, GatewayError> {
        let school_id = self.config.school_id.as_str();
        let sign = self
            .signer
            .status_query_token(school_id, collect_request_id)
            .map_err(|e| GatewayError::Signing(e.to_string()))?;
        let url = self.url(&format!("/collect-request/{collect_request_id}"));
        trace!("🏦️ GET {url}");
        let response = self
            .client
            .get(url)
            .timeout(self.config.poll_timeout)
            .query(&[("school_id", school_id), ("sign", sign.as_str())])
            .send()
            .await
            .map_err(Self::transport_error)?;
        let value = Self::read_json(response).await?;
        let report = parse_collect_status_report(&value)?;
        debug!("🏦️ Collect request {collect_request_id} reports status '{}'", report.status);
        Ok(report)
    }
}
