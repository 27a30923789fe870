use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::SettlementError,
    db_types::{GatewayStatus, Money},
    helpers::HashedFields,
    records::ExportRow,
};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

const NAIVE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

/// A gateway payment, in the single shape the rest of the engine works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub status: GatewayStatus,
    pub payment_method: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub description: String,
    pub merchant_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The form body the gateway posts to the callback URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookFields {
    pub amount: String,
    pub currency: String,
    pub product_description: String,
    pub order_id: String,
    pub customer_order_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub transaction_id: String,
    pub status: String,
    pub hash: String,
    pub channel: String,
}

impl WebhookFields {
    /// The values the gateway signed, exactly as they were received.
    pub fn hashed_fields(&self) -> HashedFields<'_> {
        HashedFields {
            amount: &self.amount,
            currency: &self.currency,
            description: &self.product_description,
            order_id: &self.order_id,
            customer_name: &self.customer_name,
            customer_email: &self.customer_email,
            customer_phone: &self.customer_phone,
            transaction_id: &self.transaction_id,
            status: &self.status,
        }
    }

    /// `order_id` if the gateway filled it in, otherwise the merchant's own `customer_order_id`.
    pub fn effective_order_id(&self) -> &str {
        let order_id = self.order_id.trim();
        if order_id.is_empty() {
            self.customer_order_id.trim()
        } else {
            order_id
        }
    }
}

/// Why an export row was left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSkip {
    /// 1-based data row number (the header is row 0).
    pub row: usize,
    pub transaction_id: Option<String>,
    pub reason: String,
}

impl RowSkip {
    fn new(row: &ExportRow, reason: impl Into<String>) -> Self {
        Self { row: row.row, transaction_id: non_blank(row.transaction_id.as_deref()), reason: reason.into() }
    }
}

impl PaymentRecord {
    pub fn try_from_webhook(fields: &WebhookFields) -> Result<Self, SettlementError> {
        let transaction_id = required(&fields.transaction_id, "transaction_id")?;
        let order_id = required(fields.effective_order_id(), "order_id")?;
        let amount = required(&fields.amount, "amount")?
            .parse::<Money>()
            .map_err(|e| SettlementError::Validation(format!("amount: {e}")))?;
        if amount <= Money::default() {
            return Err(SettlementError::Validation("amount: must be positive".to_string()));
        }
        let status = required(&fields.status, "status")?
            .parse::<GatewayStatus>()
            .map_err(|e| SettlementError::Validation(format!("status: {e}")))?;
        let customer_email = required(&fields.customer_email, "customer_email")?;
        let currency = non_blank(Some(&fields.currency)).unwrap_or_else(|| settle_common::DEFAULT_CURRENCY_CODE.into());
        Ok(Self {
            transaction_id,
            order_id,
            amount,
            currency,
            status,
            payment_method: non_blank(Some(&fields.channel)),
            customer_name: fields.customer_name.trim().to_string(),
            customer_email,
            customer_phone: non_blank(Some(&fields.customer_phone)),
            description: fields.product_description.trim().to_string(),
            merchant_email: None,
            created_at: Utc::now(),
        })
    }

    /// Converts one row of a gateway export. Rows that cannot take part in a recovery run are reported as a
    /// [`RowSkip`] rather than failing the whole file.
    pub fn try_from_export_row(row: &ExportRow) -> Result<Self, RowSkip> {
        let transaction_id =
            non_blank(row.transaction_id.as_deref()).ok_or_else(|| RowSkip::new(row, "missing transaction id"))?;
        let order_id = non_blank(row.order_id.as_deref())
            .filter(|o| !o.eq_ignore_ascii_case("N/A"))
            .ok_or_else(|| RowSkip::new(row, "missing order id"))?;
        let amount = non_blank(row.amount.as_deref())
            .ok_or_else(|| RowSkip::new(row, "missing amount"))?
            .parse::<Money>()
            .map_err(|e| RowSkip::new(row, format!("invalid amount: {e}")))?;
        if amount <= Money::default() {
            return Err(RowSkip::new(row, "non-positive amount"));
        }
        let status = non_blank(row.status.as_deref())
            .ok_or_else(|| RowSkip::new(row, "missing status"))?
            .parse::<GatewayStatus>()
            .map_err(|e| RowSkip::new(row, e.to_string()))?;
        let (customer_name, customer_email) = split_customer(row.customers.as_deref().unwrap_or_default());
        let customer_email = customer_email.ok_or_else(|| RowSkip::new(row, "no customer e-mail address"))?;
        let date = non_blank(row.date.as_deref()).ok_or_else(|| RowSkip::new(row, "missing date"))?;
        let created_at = parse_export_date(&date).ok_or_else(|| RowSkip::new(row, format!("invalid date: {date}")))?;
        Ok(Self {
            transaction_id,
            order_id,
            amount,
            currency: settle_common::DEFAULT_CURRENCY_CODE.to_string(),
            status,
            payment_method: non_blank(row.method.as_deref()),
            customer_name,
            customer_email,
            customer_phone: None,
            description: String::new(),
            merchant_email: non_blank(row.merchant_email.as_deref()),
            created_at,
        })
    }

    /// Lowercase e-mail, used to group records by buyer.
    pub fn email_key(&self) -> String {
        self.customer_email.trim().to_lowercase()
    }
}

fn required(value: &str, name: &str) -> Result<String, SettlementError> {
    non_blank(Some(value)).ok_or_else(|| {
        debug!("🧾️ Webhook is missing required field {name}");
        SettlementError::Validation(format!("Missing required field: {name}"))
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Splits the export's `Customer(s)` column into a name and the first e-mail address it contains.
fn split_customer(customers: &str) -> (String, Option<String>) {
    match EMAIL.find(customers) {
        Some(m) => {
            let name = format!("{} {}", &customers[..m.start()], &customers[m.end()..]);
            let name = name
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .trim_matches(|c: char| c.is_whitespace() || "()<>[],;:-|".contains(c))
                .to_string();
            (name, Some(m.as_str().to_string()))
        },
        None => (customers.trim().to_string(), None),
    }
}

/// Export dates are in gateway local time with no zone, except RFC 3339 timestamps. Naive times are taken as UTC.
pub(crate) fn parse_export_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
