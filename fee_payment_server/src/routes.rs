//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about trust: the three status-bearing routes deliberately do not share a code path. The callback
//! degrades and always redirects, the webhook verifies and never degrades, and the poll sits in between. Folding
//! them together is how precedence bugs happen.
use std::collections::HashMap;

use actix_web::{get, http::header, web, HttpResponse, Responder};
use collect_gateway::{CollectGateway, GatewayError, SignatureService};
use fee_payment_engine::{
    db_types::{Channel, CollectId, NewOrder, OrderId, OrderStatus, PaymentStatus, StatusUpdate, StudentInfo},
    PaymentFlowApi,
    PaymentStore,
};
use fpg_common::Money;
use log::*;

use crate::{
    config::PaymentSettings,
    data_objects::{
        first_param,
        CreatePaymentRequest,
        CreatePaymentResponse,
        OrderInfo,
        WebhookAck,
        WebhookPayload,
        CALLBACK_COLLECT_ID_ALIASES,
        CALLBACK_ORDER_ID_ALIASES,
        CALLBACK_STATUS_ALIASES,
    },
    errors::ServerError,
    reconciliation::{poll_and_apply, PollOutcome},
};

// Actix cannot route generic handler functions directly, so each route gets a concrete `HttpServiceFactory`
// shim generated with the `route!` macro: one phantom type parameter per trait bound, in declaration order.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Create payment  ---------------------------------------------
route!(create_payment => Post "/create-payment" impl PaymentStore, CollectGateway);
/// Route handler for the payment initiation endpoint.
///
/// Validates the request, creates a pending order, asks the gateway for a collect request, registers the
/// settlement record under the gateway's collect id, and hands back the URL to send the payer to.
///
/// Validation failures reject before any network call. If the gateway answers with a collect id but no payment
/// URL, the collect id is registered anyway — the gateway may well have accepted the request, and the order must
/// stay reconcilable through the poller and webhook — and the caller gets an invalid-gateway-response error.
pub async fn create_payment<B, G>(
    body: web::Json<CreatePaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<G>,
    settings: web::Data<PaymentSettings>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: CollectGateway,
{
    let request = body.into_inner();
    let amount = Money::from(request.amount);
    if !amount.is_positive() {
        return Err(ServerError::InvalidRequestBody(format!("amount must be positive, got {}", request.amount)));
    }
    let name = request.student_info.name.trim();
    if name.is_empty() {
        return Err(ServerError::InvalidRequestBody("student name is required".to_string()));
    }
    let student = StudentInfo::with_defaults(name.to_string(), request.student_info.id, request.student_info.email);
    debug!("💻️ New payment of {amount} for student {}", student.name);

    let mut new_order =
        NewOrder::new(settings.school_id.clone(), settings.gateway_name.clone(), amount, student);
    if let Some(user) = request.initiated_by {
        new_order = new_order.with_initiated_by(user);
    }
    let order = api.process_new_order(new_order).await?;

    let callback_url = format!(
        "{}/payments/payment-callback?order_id={}",
        settings.public_url.trim_end_matches('/'),
        order.order_id
    );
    match gateway.create_collect_request(amount, &callback_url).await {
        Ok(created) => {
            let collect_id = CollectId::from(created.collect_request_id.as_str());
            api.register_collect_request(&order.order_id, &collect_id, amount).await?;
            info!("💻️ Payment [{}] initiated; payer redirects to the gateway", order.order_id);
            Ok(HttpResponse::Ok().json(CreatePaymentResponse {
                redirect_url: created.payment_url,
                collect_request_id: created.collect_request_id,
                order_id: order.order_id.to_string(),
                status: "success".to_string(),
            }))
        },
        Err(GatewayError::MissingPaymentUrl { collect_request_id }) => {
            warn!(
                "💻️ Gateway accepted collect request [{collect_request_id}] for order [{}] but returned no payment \
                 URL. Registering it so the webhook or poller can still settle the order.",
                order.order_id
            );
            let collect_id = CollectId::from(collect_request_id.as_str());
            api.register_collect_request(&order.order_id, &collect_id, amount).await?;
            Err(ServerError::InvalidGatewayResponse(format!(
                "collect request {collect_request_id} was created, but the response carried no payment URL"
            )))
        },
        Err(e) => {
            warn!("💻️ Could not create a collect request for order [{}]. {e}", order.order_id);
            Err(e.into())
        },
    }
}

//----------------------------------------------   Payment callback  -------------------------------------------
route!(payment_callback => Get "/payment-callback" impl PaymentStore, CollectGateway);
/// Route handler for the gateway's browser redirect.
///
/// This is the lowest-trust channel: everything in the query string is attacker-influenceable. An inline status
/// is applied only within the monotonic-trust rule; if that leaves the record unsettled, the authoritative
/// status endpoint is polled. Whatever happens — including internal failure — the payer's browser is redirected
/// to the frontend, degrading to `pending`. The only short-circuit is a request with no identifiers at all,
/// which is rejected before any store access.
pub async fn payment_callback<B, G>(
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentFlowApi<B>>,
    gateway: web::Data<G>,
    settings: web::Data<PaymentSettings>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: CollectGateway,
{
    let query = query.into_inner();
    let collect_id = first_param(&query, &CALLBACK_COLLECT_ID_ALIASES).map(CollectId::from);
    let order_id = first_param(&query, &CALLBACK_ORDER_ID_ALIASES).map(|s| OrderId::from(s.to_string()));
    if collect_id.is_none() && order_id.is_none() {
        return Err(ServerError::MissingCallbackIdentifiers);
    }
    let inline_status = first_param(&query, &CALLBACK_STATUS_ALIASES);
    trace!(
        "💻️ Payment callback for collect id {:?} / order id {:?}, inline status {inline_status:?}",
        collect_id.as_ref().map(CollectId::as_str),
        order_id.as_ref().map(OrderId::as_str)
    );

    let record = reconcile_callback(&api, gateway.get_ref(), collect_id.as_ref(), order_id.as_ref(), inline_status)
        .await;

    let status = record.as_ref().map(|r| r.status).unwrap_or(PaymentStatus::Pending);
    let final_order_id = record
        .as_ref()
        .map(|r| r.order_id.to_string())
        .or_else(|| order_id.map(|o| o.to_string()))
        .unwrap_or_default();
    let final_collect_id = record
        .as_ref()
        .map(|r| r.collect_id.to_string())
        .or_else(|| collect_id.map(|c| c.to_string()))
        .unwrap_or_default();
    let location = format!(
        "{}?status={status}&order_id={final_order_id}&collect_request_id={final_collect_id}",
        settings.redirect_url
    );
    debug!("💻️ Redirecting payer to {location}");
    Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
}

/// The callback's reconciliation ladder. Infallible: every internal failure degrades to "whatever we know so
/// far", because the caller has a redirect to deliver.
async fn reconcile_callback<B, G>(
    api: &PaymentFlowApi<B>,
    gateway: &G,
    collect_id: Option<&CollectId>,
    order_id: Option<&OrderId>,
    inline_status: Option<&str>,
) -> Option<OrderStatus>
where
    B: PaymentStore,
    G: CollectGateway,
{
    let mut record = match api.resolve_status(collect_id, order_id).await {
        Ok(record) => record,
        Err(e) => {
            warn!("💻️ Could not look up the settlement record for the callback. {e}");
            None
        },
    };

    // Step 1: apply the inline status, if there is one. The trust rule decides whether it sticks.
    if let (Some(inline), Some(current)) = (inline_status, record.as_ref()) {
        let update = StatusUpdate::new(PaymentStatus::normalize(inline));
        match api.apply_status_update(Channel::Callback, &current.collect_id, update).await {
            Ok(outcome) => record = Some(outcome.record().clone()),
            Err(e) => warn!("💻️ Could not apply the inline callback status. {e}"),
        }
    }

    // Step 2: if the record is still unsettled, ask the gateway directly.
    if let Some(current) = record.as_ref() {
        if !current.status.is_terminal() {
            match poll_and_apply(api, gateway, &current.collect_id).await {
                PollOutcome::Applied(r) | PollOutcome::Superseded(r) => record = Some(r),
                PollOutcome::Inconclusive => {
                    debug!("💻️ Poll was inconclusive; [{}] stays {}", current.collect_id, current.status);
                },
            }
        }
    }

    record
}

//----------------------------------------------   Payment webhook  --------------------------------------------
route!(payment_webhook => Post "/payment-webhook" impl PaymentStore);
/// Route handler for the gateway's server-to-server settlement push.
///
/// This is the highest-trust channel, and the strictest: the signature is verified before a single payload
/// field is read, the payload must carry the complete required field set before anything is written, and every
/// failure is an explicit error response so the gateway's retry policy can re-deliver. A verified webhook
/// overwrites the settlement record unconditionally.
pub async fn payment_webhook<B>(
    body: web::Json<WebhookPayload>,
    api: web::Data<PaymentFlowApi<B>>,
    signer: web::Data<SignatureService>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
{
    let payload = body.into_inner();
    let claims = signer.verify_webhook_token(&payload.sign).map_err(|e| {
        warn!("💻️ Rejecting webhook with an unverifiable signature. {e}");
        ServerError::UnauthorizedWebhook(e.to_string())
    })?;

    // Authenticated from here on. Log the raw payload before parsing, so malformed-but-genuine deliveries are
    // auditable too.
    let claimed_id = CollectId::from(claims.collect_request_id.as_str());
    api.record_webhook(&claimed_id, &payload.order_info).await?;

    let info: OrderInfo = serde_json::from_value(payload.order_info)
        .map_err(|e| ServerError::MalformedWebhookPayload(e.to_string()))?;
    if info.order_id != claims.collect_request_id {
        warn!(
            "💻️ Webhook signature covers collect request [{}] but the payload names [{}]. Rejecting.",
            claims.collect_request_id, info.order_id
        );
        return Err(ServerError::UnauthorizedWebhook("signature does not cover this collect request".to_string()));
    }

    let collect_id = CollectId::from(info.order_id.as_str());
    let update = StatusUpdate {
        status: PaymentStatus::normalize(&info.status),
        transaction_amount: Some(info.transaction_amount),
        payment_mode: info.payment_mode,
        payment_details: info.payment_details,
        bank_reference: info.bank_reference,
        payment_message: info.payment_message,
        error_message: info.error_message,
        payment_time: info.payment_time,
    };
    let outcome = api.apply_status_update(Channel::Webhook, &collect_id, update).await?;
    info!("💻️ Webhook settled [{collect_id}] as {}", outcome.record().status);
    Ok(HttpResponse::Ok().json(WebhookAck {
        message: "Webhook processed successfully".to_string(),
        order_id: collect_id.to_string(),
    }))
}

//----------------------------------------------   Transaction status  -----------------------------------------
route!(transaction_status => Get "/transaction-status/{collect_id}" impl PaymentStore);
/// Read-only lookup of the current settlement record for a collect request.
pub async fn transaction_status<B>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
{
    let collect_id = CollectId::from(path.into_inner());
    debug!("💻️ GET transaction status for [{collect_id}]");
    match api.status_by_collect_id(&collect_id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(ServerError::NoRecordFound(format!("No settlement record for collect request {collect_id}"))),
    }
}
