use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::*;
use settlement_engine::{
    notifications::{DeliveryFuture, DeliveryHandler, Notification},
    NotificationQueue,
    RecoveryApi,
    SettlementApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::{get_remote_ip, is_whitelisted},
    routes::{
        health,
        notification_stats,
        GatewayWebhookRoute,
        PaymentDetailsRoute,
        RecoveryExportRoute,
        RecoveryPreviewRoute,
        RecoveryRunRoute,
        RefundRoute,
    },
};

/// Gateway exports can run to many thousands of rows.
const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_options(
        &config.database_url,
        config.max_connections,
        config.tx_options.acquire_timeout,
    )
    .await
    .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let queue = NotificationQueue::new(config.notifications.clone());
    let worker = queue.start(log_delivery_handler());
    let srv = create_server_instance(config, db, queue.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("📬️ Stopping the notification worker");
    queue.stop();
    if let Err(e) = worker.await {
        warn!("📬️ Notification worker did not shut down cleanly. {e}");
    }
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    queue: NotificationQueue,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let settlement_api = SettlementApi::new(db.clone(), queue.clone(), config.gateway.secrets())
            .with_secret_variant(config.gateway.variant())
            .with_options(config.tx_options.clone());
        let recovery_api = RecoveryApi::new(db.clone(), queue.clone(), config.recovery.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(recovery_api))
            .app_data(web::Data::new(queue.clone()));
        let api_scope = web::scope("/api")
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_SIZE))
            .service(RefundRoute::<SqliteDatabase>::new())
            .service(PaymentDetailsRoute::<SqliteDatabase>::new())
            .service(RecoveryPreviewRoute::<SqliteDatabase>::new())
            .service(RecoveryRunRoute::<SqliteDatabase>::new())
            .service(RecoveryExportRoute::<SqliteDatabase>::new())
            .service(notification_stats);
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.gateway.whitelist.clone();
        let gateway_scope = web::scope("/gateway")
            .app_data(webhook_form_config())
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                if is_whitelisted(peer_ip, whitelist.as_deref()) {
                    srv.call(req)
                } else {
                    warn!("💻️ Rejecting gateway callback from {peer_ip:?}. The address is not whitelisted.");
                    ok(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(GatewayWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(gateway_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Reports malformed callback bodies with the same JSON error shape as every other failure.
pub fn webhook_form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

/// Delivers notifications to the log. Wiring in a mail provider means swapping this handler out.
pub fn log_delivery_handler() -> DeliveryHandler {
    Arc::new(|notification: Notification| {
        Box::pin(async move {
            info!("📬️ {} → {}: {}", notification.kind(), notification.recipient(), notification.subject());
            debug!("📬️ {}", notification.render());
            Ok(())
        }) as DeliveryFuture
    })
}
