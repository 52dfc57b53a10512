use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use collect_gateway::GatewayError;
use fee_payment_engine::PaymentStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The callback carried neither a collect request id nor an order id.")]
    MissingCallbackIdentifiers,
    #[error("Webhook rejected: {0}")]
    UnauthorizedWebhook(String),
    #[error("The webhook payload is missing required order info fields: {0}")]
    MalformedWebhookPayload(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("The gateway rejected the payment request. {0}")]
    InvalidPaymentRequest(String),
    #[error("The gateway did not accept our credentials. {0}")]
    GatewayAuthenticationFailure(String),
    #[error("The gateway response could not be used. {0}")]
    InvalidGatewayResponse(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ServerError {
    /// The stable, machine-matchable label for the `error` field of error responses.
    fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) => "invalid request",
            Self::MissingCallbackIdentifiers => "missing callback identifiers",
            Self::UnauthorizedWebhook(_) => "unauthorized webhook",
            Self::MalformedWebhookPayload(_) => "malformed webhook payload",
            Self::NoRecordFound(_) => "not found",
            Self::GatewayUnavailable(_) => "gateway unavailable",
            Self::InvalidPaymentRequest(_) => "invalid payment request",
            Self::GatewayAuthenticationFailure(_) => "gateway authentication failure",
            Self::InvalidGatewayResponse(_) => "invalid gateway response",
            _ => "internal server error",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingCallbackIdentifiers => StatusCode::BAD_REQUEST,
            Self::MalformedWebhookPayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidPaymentRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnauthorizedWebhook(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayAuthenticationFailure(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidGatewayResponse(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.label(), "details": self.to_string() }).to_string())
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(m) => Self::GatewayUnavailable(m),
            GatewayError::InvalidRequest(m) => Self::InvalidPaymentRequest(m),
            GatewayError::AuthenticationFailed(m) => Self::GatewayAuthenticationFailure(m),
            GatewayError::InvalidResponse(m) => Self::InvalidGatewayResponse(m),
            GatewayError::MissingPaymentUrl { .. } => Self::InvalidGatewayResponse(e.to_string()),
            GatewayError::Signing(m) => Self::BackendError(format!("Could not sign gateway payload: {m}")),
            GatewayError::Initialization(m) => Self::InitializeError(m),
        }
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::CollectRequestNotFound(_) | PaymentStoreError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            e => Self::BackendError(e.to_string()),
        }
    }
}
