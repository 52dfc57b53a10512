use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("The gateway could not be reached: {0}")]
    Unavailable(String),
    #[error("The gateway rejected the request: {0}")]
    InvalidRequest(String),
    #[error("The gateway rejected our credentials: {0}")]
    AuthenticationFailed(String),
    #[error("Could not make sense of the gateway response: {0}")]
    InvalidResponse(String),
    #[error("The gateway accepted collect request {collect_request_id} but returned no payment URL")]
    MissingPaymentUrl { collect_request_id: String },
    #[error("Could not sign the request payload: {0}")]
    Signing(String),
}
