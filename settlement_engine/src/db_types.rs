use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use settle_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      ItemKind       ---------------------------------------------------------
/// The kind of item a purchase is for. Also used as the `source_type` of revenue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Event,
    Movie,
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Event => write!(f, "event"),
            ItemKind::Movie => write!(f, "movie"),
        }
    }
}

//--------------------------------------    GatewayStatus    ---------------------------------------------------------
/// The outcome of a transaction as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayStatus {
    Success,
    Failed,
}

impl FromStr for GatewayStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "paid" | "completed" | "1" => Ok(Self::Success),
            "failed" | "failure" | "fail" | "cancelled" | "declined" | "0" => Ok(Self::Failed),
            other => Err(ConversionError(format!("Unknown gateway status: {other}"))),
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Success => write!(f, "SUCCESS"),
            GatewayStatus::Failed => write!(f, "FAILED"),
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The payment settled and the purchase was fulfilled.
    Completed,
    /// A previously completed payment was reversed by a late failure notice from the gateway.
    Failed,
    /// A previously completed payment was refunded.
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

//--------------------------------------    TicketStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
}

//--------------------------------------  EntitlementStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Cancelled,
    Refunded,
}

//--------------------------------------    RevenueStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RevenueStatus {
    Active,
    Refunded,
}

//--------------------------------------    ReversalKind     ---------------------------------------------------------
/// Why a settled payment is being reversed. This determines the terminal statuses of the payment and the purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReversalKind {
    /// The gateway sent a failure notice for a transaction that had already settled.
    Failed,
    /// An explicit refund.
    Refunded,
}

impl ReversalKind {
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            ReversalKind::Failed => PaymentStatus::Failed,
            ReversalKind::Refunded => PaymentStatus::Refunded,
        }
    }

    pub fn ticket_status(&self) -> TicketStatus {
        match self {
            ReversalKind::Failed => TicketStatus::Cancelled,
            ReversalKind::Refunded => TicketStatus::Refunded,
        }
    }

    pub fn entitlement_status(&self) -> EntitlementStatus {
        match self {
            ReversalKind::Failed => EntitlementStatus::Cancelled,
            ReversalKind::Refunded => EntitlementStatus::Refunded,
        }
    }
}

//--------------------------------------        User         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    /// Running total of active revenue credited to this user. A denormalised cache of the revenue tables.
    pub total_revenue: Money,
    /// The affiliate that referred this user, if any.
    pub referred_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Event        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub available_tickets: i64,
    pub is_affiliate: bool,
    /// Affiliate commission in basis points (10% = 1000).
    pub commission_bps: Option<i64>,
}

//--------------------------------------        Movie        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub is_affiliate: bool,
    pub commission_bps: Option<i64>,
}

/// The parts of a sellable item that settlement cares about, whatever its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleItem {
    Event(Event),
    Movie(Movie),
}

impl SaleItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            SaleItem::Event(_) => ItemKind::Event,
            SaleItem::Movie(_) => ItemKind::Movie,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SaleItem::Event(e) => e.id,
            SaleItem::Movie(m) => m.id,
        }
    }

    pub fn owner_id(&self) -> i64 {
        match self {
            SaleItem::Event(e) => e.owner_id,
            SaleItem::Movie(m) => m.owner_id,
        }
    }

    /// The commission rate, if this item takes part in the affiliate programme.
    pub fn affiliate_commission_bps(&self) -> Option<i64> {
        let (enrolled, bps) = match self {
            SaleItem::Event(e) => (e.is_affiliate, e.commission_bps),
            SaleItem::Movie(m) => (m.is_affiliate, m.commission_bps),
        };
        bps.filter(|b| enrolled && *b > 0)
    }
}

//--------------------------------------       Ticket        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_code: String,
    pub qr_payload: String,
    pub event_id: i64,
    /// `None` for sales where the buyer has no user account yet.
    pub user_id: Option<i64>,
    pub buyer_email: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_code: String,
    pub qr_payload: String,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub buyer_email: String,
}

//--------------------------------------  VideoEntitlement   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct VideoEntitlement {
    pub id: i64,
    pub movie_id: i64,
    pub user_id: i64,
    pub buyer_email: String,
    pub status: EntitlementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fulfilled side of a settled payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Purchase {
    Ticket(Ticket),
    Video(VideoEntitlement),
}

impl Purchase {
    pub fn buyer_email(&self) -> &str {
        match self {
            Purchase::Ticket(t) => &t.buyer_email,
            Purchase::Video(v) => &v.buyer_email,
        }
    }

    pub fn ticket_code(&self) -> Option<&str> {
        match self {
            Purchase::Ticket(t) => Some(&t.ticket_code),
            Purchase::Video(_) => None,
        }
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    /// The gateway transaction id. Unique, and the idempotency key for settlement.
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    pub purchase_kind: ItemKind,
    pub ticket_id: Option<i64>,
    pub entitlement_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_id: String,
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub payment_method: Option<String>,
    pub purchase_kind: ItemKind,
}

//--------------------------------------    RevenueEntry     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueBeneficiary {
    Creator,
    Affiliate,
}

/// A ledger entry crediting a creator or an affiliate with part of a settled amount.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct RevenueEntry {
    pub id: i64,
    pub beneficiary_id: i64,
    pub amount: Money,
    pub source_type: ItemKind,
    pub source_id: i64,
    /// The buyer whose purchase generated this revenue.
    pub referred_user_id: Option<i64>,
    pub transaction_id: String,
    /// Set only for affiliate entries.
    pub commission_bps: Option<i64>,
    pub is_paid: bool,
    pub status: RevenueStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRevenueEntry {
    pub beneficiary: RevenueBeneficiary,
    pub beneficiary_id: i64,
    pub amount: Money,
    pub source_type: ItemKind,
    pub source_id: i64,
    pub referred_user_id: Option<i64>,
    pub transaction_id: String,
    pub commission_bps: Option<i64>,
}

/// All revenue entries recorded against one gateway transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionRevenue {
    pub creator: Vec<RevenueEntry>,
    pub affiliate: Vec<RevenueEntry>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn event(is_affiliate: bool, commission_bps: Option<i64>) -> SaleItem {
        SaleItem::Event(Event {
            id: 5,
            title: "Gig".into(),
            owner_id: 1,
            available_tickets: 1,
            is_affiliate,
            commission_bps,
        })
    }

    #[test]
    fn gateway_status_parsing() {
        assert_eq!("SUCCESS".parse::<GatewayStatus>().unwrap(), GatewayStatus::Success);
        assert_eq!(" failed ".parse::<GatewayStatus>().unwrap(), GatewayStatus::Failed);
        assert!("pending".parse::<GatewayStatus>().is_err());
    }

    #[test]
    fn affiliate_commission_requires_enrolment_and_rate() {
        assert_eq!(event(true, Some(1000)).affiliate_commission_bps(), Some(1000));
        assert_eq!(event(false, Some(1000)).affiliate_commission_bps(), None);
        assert_eq!(event(true, None).affiliate_commission_bps(), None);
        assert_eq!(event(true, Some(0)).affiliate_commission_bps(), None);
    }

    #[test]
    fn reversal_statuses() {
        assert_eq!(ReversalKind::Refunded.payment_status(), PaymentStatus::Refunded);
        assert_eq!(ReversalKind::Failed.ticket_status(), TicketStatus::Cancelled);
        assert_eq!(ReversalKind::Refunded.entitlement_status(), EntitlementStatus::Refunded);
    }
}
