use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, Purchase},
    records::PaymentRecord,
    settlement_objects::{ReversalReceipt, SettlementReceipt},
};

/// A customer-facing message, raised by the engine after the state change it describes has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    TicketPurchase {
        to: String,
        buyer_name: String,
        event_title: String,
        ticket_code: String,
        amount: Money,
        transaction_id: String,
    },
    VideoPurchase {
        to: String,
        buyer_name: String,
        movie_title: String,
        amount: Money,
        transaction_id: String,
    },
    PaymentFailed {
        to: String,
        buyer_name: String,
        order_id: String,
        amount: Money,
        transaction_id: String,
    },
    TicketRecovered {
        to: String,
        buyer_name: String,
        event_title: String,
        ticket_code: String,
        amount: Money,
        transaction_id: String,
    },
    RefundInitiated {
        to: String,
        amount: Money,
        transaction_id: String,
    },
}

impl Notification {
    /// The purchase confirmation for a settled live payment.
    pub fn purchase_confirmation(record: &PaymentRecord, receipt: &SettlementReceipt) -> Self {
        match &receipt.purchase {
            Purchase::Ticket(ticket) => Notification::TicketPurchase {
                to: record.customer_email.clone(),
                buyer_name: record.customer_name.clone(),
                event_title: receipt.item_title.clone(),
                ticket_code: ticket.ticket_code.clone(),
                amount: record.amount,
                transaction_id: record.transaction_id.clone(),
            },
            Purchase::Video(_) => Notification::VideoPurchase {
                to: record.customer_email.clone(),
                buyer_name: record.customer_name.clone(),
                movie_title: receipt.item_title.clone(),
                amount: record.amount,
                transaction_id: record.transaction_id.clone(),
            },
        }
    }

    /// Sent when a ticket is issued by a recovery run, long after the buyer paid.
    pub fn ticket_recovered(record: &PaymentRecord, receipt: &SettlementReceipt) -> Self {
        Notification::TicketRecovered {
            to: record.customer_email.clone(),
            buyer_name: record.customer_name.clone(),
            event_title: receipt.item_title.clone(),
            ticket_code: receipt.purchase.ticket_code().unwrap_or_default().to_string(),
            amount: record.amount,
            transaction_id: record.transaction_id.clone(),
        }
    }

    pub fn payment_failed(record: &PaymentRecord) -> Self {
        Notification::PaymentFailed {
            to: record.customer_email.clone(),
            buyer_name: record.customer_name.clone(),
            order_id: record.order_id.clone(),
            amount: record.amount,
            transaction_id: record.transaction_id.clone(),
        }
    }

    /// `None` if the reversed payment had no purchase to take a buyer address from.
    pub fn refund_initiated(receipt: &ReversalReceipt) -> Option<Self> {
        let purchase = receipt.purchase.as_ref()?;
        Some(Notification::RefundInitiated {
            to: purchase.buyer_email().to_string(),
            amount: receipt.payment.amount,
            transaction_id: receipt.payment.transaction_id.clone(),
        })
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::TicketPurchase { to, .. }
            | Notification::VideoPurchase { to, .. }
            | Notification::PaymentFailed { to, .. }
            | Notification::TicketRecovered { to, .. }
            | Notification::RefundInitiated { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::TicketPurchase { .. } => "ticket_purchase",
            Notification::VideoPurchase { .. } => "video_purchase",
            Notification::PaymentFailed { .. } => "payment_failed",
            Notification::TicketRecovered { .. } => "ticket_recovered",
            Notification::RefundInitiated { .. } => "refund_initiated",
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::TicketPurchase { event_title, .. } => format!("Your ticket for {event_title}"),
            Notification::VideoPurchase { movie_title, .. } => format!("{movie_title} is ready to watch"),
            Notification::PaymentFailed { order_id, .. } => format!("Payment for order {order_id} was not completed"),
            Notification::TicketRecovered { event_title, .. } => format!("Your ticket for {event_title} has been issued"),
            Notification::RefundInitiated { transaction_id, .. } => format!("Refund started for {transaction_id}"),
        }
    }

    /// A plain text rendering, for logs and simple mail transports.
    pub fn render(&self) -> String {
        match self {
            Notification::TicketPurchase { buyer_name, event_title, ticket_code, amount, transaction_id, .. }
            | Notification::TicketRecovered { buyer_name, event_title, ticket_code, amount, transaction_id, .. } => {
                format!(
                    "Hi {buyer_name}, your ticket {ticket_code} for {event_title} is confirmed. Amount paid: {amount} \
                     (ref {transaction_id})."
                )
            },
            Notification::VideoPurchase { buyer_name, movie_title, amount, transaction_id, .. } => {
                format!("Hi {buyer_name}, you can now watch {movie_title}. Amount paid: {amount} (ref {transaction_id}).")
            },
            Notification::PaymentFailed { buyer_name, order_id, amount, transaction_id, .. } => format!(
                "Hi {buyer_name}, your payment of {amount} for order {order_id} did not go through (ref \
                 {transaction_id}). You have not been charged for this order."
            ),
            Notification::RefundInitiated { amount, transaction_id, .. } => {
                format!("A refund of {amount} for transaction {transaction_id} has been initiated.")
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialises_with_type_tag() {
        let n = Notification::RefundInitiated {
            to: "a@example.com".into(),
            amount: Money::from_major(100),
            transaction_id: "TX1".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "refund_initiated");
        assert_eq!(json["amount"], "100.00");
        assert_eq!(n.kind(), "refund_initiated");
        assert_eq!(n.recipient(), "a@example.com");
        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }
}
