use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use chrono::{TimeZone, Utc};
use settlement_engine::{
    db_types::{ItemKind, Money, Payment, PaymentStatus},
    recovery_objects::RecoveryConfig,
    test_utils::fixtures::test_secrets,
    NotificationQueue,
    RecoveryApi,
    SettlementApi,
};

use super::mocks::{mock_ledger, MockLedger};
use crate::{
    routes::{
        notification_stats,
        GatewayWebhookRoute,
        PaymentDetailsRoute,
        RecoveryExportRoute,
        RecoveryPreviewRoute,
        RecoveryRunRoute,
        RefundRoute,
    },
    server::webhook_form_config,
};

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response was not JSON")
    }
}

/// Sends `req` to an app wired up like the real server, backed by a mock ledger configured with `setup`.
pub async fn call(req: TestRequest, setup: fn(&mut MockLedger)) -> TestResponse {
    call_with_queue(req, setup, NotificationQueue::default()).await
}

pub async fn call_with_queue(req: TestRequest, setup: fn(&mut MockLedger), queue: NotificationQueue) -> TestResponse {
    let _ = env_logger::try_init().ok();
    let ledger = mock_ledger(setup);
    let settlement_api = SettlementApi::new(ledger.clone(), queue.clone(), test_secrets());
    let recovery_api = RecoveryApi::new(ledger, queue.clone(), RecoveryConfig::default());
    let app = App::new()
        .app_data(web::Data::new(settlement_api))
        .app_data(web::Data::new(recovery_api))
        .app_data(web::Data::new(queue))
        .service(
            web::scope("/gateway")
                .app_data(webhook_form_config())
                .service(GatewayWebhookRoute::<MockLedger>::new()),
        )
        .service(
            web::scope("/api")
                .service(RefundRoute::<MockLedger>::new())
                .service(PaymentDetailsRoute::<MockLedger>::new())
                .service(RecoveryPreviewRoute::<MockLedger>::new())
                .service(RecoveryRunRoute::<MockLedger>::new())
                .service(RecoveryExportRoute::<MockLedger>::new())
                .service(notification_stats),
        );
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let content_type =
        res.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let body = test::read_body(res).await;
    TestResponse { status, content_type, body: String::from_utf8_lossy(&body).into_owned() }
}

pub fn completed_payment(transaction_id: &str, order_id: &str, amount: i64) -> Payment {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    Payment {
        id: 1,
        transaction_id: transaction_id.to_string(),
        order_id: order_id.to_string(),
        amount: Money::from_major(amount),
        currency: "MYR".to_string(),
        payment_method: Some("FPX".to_string()),
        status: PaymentStatus::Completed,
        purchase_kind: ItemKind::Event,
        ticket_id: Some(1),
        entitlement_id: None,
        created_at: at,
        updated_at: at,
    }
}
