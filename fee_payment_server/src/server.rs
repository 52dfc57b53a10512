use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use actix_web::dev::Server;
use collect_gateway::GatewayClient;
use fee_payment_engine::{PaymentFlowApi, SqliteDatabase};

use crate::{
    config::{PaymentSettings, ServerConfig},
    errors::ServerError,
    routes::{health, CreatePaymentRoute, PaymentCallbackRoute, PaymentWebhookRoute, TransactionStatusRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = GatewayClient::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayClient,
) -> Result<Server, ServerError> {
    let settings = PaymentSettings::from_config(&config);
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone());
        let signer = gateway.signer().clone();
        let payment_scope = web::scope("/payments")
            .service(CreatePaymentRoute::<SqliteDatabase, GatewayClient>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase, GatewayClient>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(TransactionStatusRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fps::access_log"))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(signer))
            .app_data(web::Data::new(settings.clone()))
            .service(health)
            .service(payment_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
