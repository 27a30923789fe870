//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Database work is always awaited, and parsing an uploaded export
//! (which can be a sizeable spreadsheet) is pushed onto the blocking thread pool with [`web::block`].
use actix_web::{get, http::header, web, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    records::{parse_export, write_export, ExportFormat, ExportRow, WebhookFields},
    NotificationQueue,
    RecoveryApi,
    SettlementApi,
    SettlementDatabase,
};

use crate::{
    data_objects::{RecoveryParams, WebhookResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
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

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(gateway_webhook => Post "/webhook" impl SettlementDatabase);
/// Route handler for the gateway's payment callback.
///
/// The gateway posts a form-encoded body, signed with the shared gateway secret. Callbacks that fail signature
/// verification are rejected with a 401 before anything is written.
///
/// Callbacks are idempotent. A transaction that has already been settled is acknowledged with a 200 and no changes,
/// so that the gateway stops retrying.
pub async fn gateway_webhook<B: SettlementDatabase>(
    form: web::Form<WebhookFields>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let fields = form.into_inner();
    info!("💻️ Gateway callback for transaction {} ({})", fields.transaction_id, fields.status);
    let outcome = api.process_webhook(&fields).await.map_err(|e| {
        warn!("💻️ Could not process gateway callback for {}. {e}", fields.transaction_id);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(WebhookResponse::from(outcome)))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_details => Get "/payments/{transaction_id}" impl SettlementDatabase);
/// Fetches a payment and every revenue entry it produced, active or refunded.
pub async fn payment_details<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let transaction_id = path.into_inner();
    debug!("💻️ GET payment details for {transaction_id}");
    let details = api.payment_details(&transaction_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(refund => Post "/refunds/{transaction_id}" impl SettlementDatabase);
/// Refunds a settled transaction. Refunding a transaction that was already refunded (or failed) is a no-op and
/// returns the payment as it stands.
pub async fn refund<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let transaction_id = path.into_inner();
    info!("💻️ Refund requested for transaction {transaction_id}");
    let outcome = api.refunds().refund(&transaction_id).await.map_err(|e| {
        warn!("💻️ Could not refund transaction {transaction_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Recovery  ----------------------------------------------------
route!(recovery_preview => Post "/recovery/preview" impl SettlementDatabase);
/// Upload a gateway transaction export (CSV by default, `?format=xlsx` for spreadsheets) and report what a recovery
/// run would settle. Nothing is written.
pub async fn recovery_preview<B: SettlementDatabase>(
    query: web::Query<RecoveryParams>,
    body: web::Bytes,
    api: web::Data<RecoveryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rows = read_upload(body, query.format).await?;
    let report = api.preview(&rows).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(recovery_run => Post "/recovery/run" impl SettlementDatabase);
/// Upload a gateway transaction export and settle the payments whose callbacks never arrived.
pub async fn recovery_run<B: SettlementDatabase>(
    query: web::Query<RecoveryParams>,
    body: web::Bytes,
    api: web::Data<RecoveryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let rows = read_upload(body, query.format).await?;
    info!("💻️ Starting recovery run over {} export rows", rows.len());
    let result = api.recover(&rows).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(recovery_export => Post "/recovery/export" impl SettlementDatabase);
/// Upload a gateway transaction export and download just the records a recovery run would settle, in the export's
/// own column layout. `?output=csv|xlsx` picks the download format.
pub async fn recovery_export<B: SettlementDatabase>(
    query: web::Query<RecoveryParams>,
    body: web::Bytes,
    api: web::Data<RecoveryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let output = query.output_format();
    let rows = read_upload(body, query.format).await?;
    let report = api.preview(&rows).await?;
    let records = report.records_to_recover;
    debug!("💻️ Writing {} records to a {output:?} recovery file", records.len());
    let file = web::block(move || write_export(&records, output))
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))??;
    let disposition = format!("attachment; filename=\"recovery.{}\"", output.extension());
    Ok(HttpResponse::Ok()
        .content_type(output.content_type())
        .insert_header((header::CONTENT_DISPOSITION, disposition))
        .body(file))
}

async fn read_upload(body: web::Bytes, format: ExportFormat) -> Result<Vec<ExportRow>, ServerError> {
    if body.is_empty() {
        return Err(ServerError::InvalidRequestBody("No export file was uploaded".to_string()));
    }
    trace!("💻️ Parsing {} byte {format:?} export", body.len());
    let rows =
        web::block(move || parse_export(&body, format)).await.map_err(|e| ServerError::BackendError(e.to_string()))??;
    Ok(rows)
}

//----------------------------------------------   Notifications  ----------------------------------------------------
#[get("/notifications")]
pub async fn notification_stats(queue: web::Data<NotificationQueue>) -> impl Responder {
    trace!("💻️ GET notification queue stats");
    HttpResponse::Ok().json(queue.stats())
}
