//! The settlement and reversal steps. All of them run inside a [`UnitOfWork`].
use log::*;

use crate::{
    db::{
        sqlite::{catalog, payments, purchases, revenue, revenue::RevenueSource, SqliteDatabaseError, UnitOfWork},
        traits::{InsertPaymentResult, Prefetched, SettlementError},
    },
    db_types::{NewPayment, Payment, Purchase, ReversalKind, SaleItem, User},
    helpers::compute_split,
    settlement_objects::{ReversalOutcome, ReversalReceipt, SettlementReceipt, SettlementRequest},
};

/// What to do when a ticket buyer has no user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerPolicy {
    /// Issue the ticket anyway, unlinked. Used for live gateway callbacks, where the money has already been taken.
    AllowUnlinked,
    /// Refuse to settle. Used in recovery, where unmatched records are left for manual review.
    Required,
}

pub enum SettleStep {
    Settled(SettlementReceipt),
    AlreadyProcessed(Payment),
}

/// Settles one payment inside the given unit of work. Nothing is committed here; on error the caller must roll back.
///
/// The payment row is inserted first. This reserves the transaction id, and also makes the first statement of the
/// unit of work a write, so that concurrent settlements queue on SQLite's write lock rather than failing to upgrade a
/// read lock.
pub async fn settle_within(
    uow: &mut UnitOfWork<'_>,
    request: &SettlementRequest,
    prefetched: Option<Prefetched>,
    policy: BuyerPolicy,
) -> Result<SettleStep, SettlementError> {
    let record = &request.record;
    let target = request.target;
    let new_payment = NewPayment {
        transaction_id: record.transaction_id.clone(),
        order_id: record.order_id.clone(),
        amount: record.amount,
        currency: record.currency.clone(),
        payment_method: record.payment_method.clone(),
        purchase_kind: target.kind,
    };
    let payment_id = match payments::idempotent_insert(&new_payment, uow.conn()).await? {
        InsertPaymentResult::Inserted(id) => id,
        InsertPaymentResult::AlreadyExists(tx_id) => {
            debug!("🧾️ Transaction {tx_id} has already been settled");
            let existing = fetch_existing_payment(&tx_id, uow).await?;
            return Ok(SettleStep::AlreadyProcessed(existing));
        },
    };

    let Prefetched { item, buyer } = match prefetched {
        Some(p) => p,
        None => Prefetched {
            item: catalog::fetch_item(target, uow.conn()).await?,
            buyer: catalog::fetch_user_by_email(&record.customer_email, uow.conn()).await?,
        },
    };
    let item = item.ok_or(SettlementError::ItemNotFound { kind: target.kind, id: target.item_id })?;
    let buyer_id = buyer.as_ref().map(|b| b.id);

    let purchase = match &item {
        SaleItem::Event(event) => {
            if buyer.is_none() && policy == BuyerPolicy::Required {
                return Err(SettlementError::BuyerNotFound(record.customer_email.clone()));
            }
            if !catalog::take_ticket(event.id, uow.conn()).await? {
                info!("🧾️ Event #{} is sold out. Cannot settle {}", event.id, record.transaction_id);
                return Err(SettlementError::InventoryExhausted(event.id));
            }
            if buyer.is_none() {
                warn!(
                    "🧾️ No user account for {}. Issuing an unlinked ticket for {}",
                    record.customer_email, record.transaction_id
                );
            }
            let ticket = purchases::issue_ticket(
                event.id,
                buyer_id,
                &record.customer_email,
                &record.transaction_id,
                uow.conn(),
            )
            .await?;
            Purchase::Ticket(ticket)
        },
        SaleItem::Movie(movie) => {
            let buyer_id = buyer_id.ok_or_else(|| SettlementError::BuyerNotFound(record.customer_email.clone()))?;
            let entitlement =
                purchases::insert_entitlement(movie.id, buyer_id, &record.customer_email, uow.conn()).await?;
            Purchase::Video(entitlement)
        },
    };
    payments::link_purchase(payment_id, &purchase, uow.conn()).await?;

    let affiliate = affiliate_for(&item, buyer.as_ref());
    let split = compute_split(record.amount, item.owner_id(), affiliate);
    let source = RevenueSource {
        kind: item.kind(),
        item_id: item.id(),
        buyer_id,
        transaction_id: &record.transaction_id,
    };
    let revenue = revenue::apply_split(&split, source, uow.conn()).await?;

    let payment = fetch_existing_payment(&record.transaction_id, uow).await?;
    debug!("🧾️ Transaction {} settled against {} #{}", record.transaction_id, item.kind(), item.id());
    Ok(SettleStep::Settled(SettlementReceipt {
        payment,
        purchase,
        item_title: item_title(&item),
        buyer_id,
        revenue,
    }))
}

/// Reverses a completed settlement inside the given unit of work.
pub async fn reverse_within(
    uow: &mut UnitOfWork<'_>,
    transaction_id: &str,
    kind: ReversalKind,
) -> Result<ReversalOutcome, SettlementError> {
    // Write first, as in settlement, so the unit of work takes the write lock before it reads anything
    if !payments::close_completed_payment(transaction_id, kind.payment_status(), uow.conn()).await? {
        let payment = payments::fetch_payment(transaction_id, uow.conn())
            .await?
            .ok_or_else(|| SettlementError::PaymentNotFound(transaction_id.to_string()))?;
        debug!("🧾️ Payment {transaction_id} is already {}. Nothing to reverse.", payment.status);
        return Ok(ReversalOutcome::AlreadyReversed(payment));
    }
    let payment = fetch_existing_payment(transaction_id, uow).await?;
    let purchase = match (payment.ticket_id, payment.entitlement_id) {
        (Some(ticket_id), _) => {
            let ticket = purchases::update_ticket_status(ticket_id, kind.ticket_status(), uow.conn()).await?;
            if let Some(t) = &ticket {
                catalog::return_ticket(t.event_id, uow.conn()).await?;
            }
            ticket.map(Purchase::Ticket)
        },
        (None, Some(entitlement_id)) => {
            purchases::update_entitlement_status(entitlement_id, kind.entitlement_status(), uow.conn())
                .await?
                .map(Purchase::Video)
        },
        (None, None) => {
            warn!("🧾️ Payment {transaction_id} has no linked purchase");
            None
        },
    };
    let reversed_revenue = revenue::reverse_for_transaction(transaction_id, uow.conn()).await?;
    info!(
        "🧾️ Payment {transaction_id} reversed ({kind:?}). {} revenue entries refunded.",
        reversed_revenue.len()
    );
    Ok(ReversalOutcome::Reversed(ReversalReceipt { kind, payment, purchase, reversed_revenue }))
}

fn affiliate_for(item: &SaleItem, buyer: Option<&User>) -> Option<(i64, i64)> {
    let commission_bps = item.affiliate_commission_bps()?;
    let affiliate_id = buyer?.referred_by?;
    Some((affiliate_id, commission_bps))
}

fn item_title(item: &SaleItem) -> String {
    match item {
        SaleItem::Event(e) => e.title.clone(),
        SaleItem::Movie(m) => m.title.clone(),
    }
}

async fn fetch_existing_payment(transaction_id: &str, uow: &mut UnitOfWork<'_>) -> Result<Payment, SettlementError> {
    payments::fetch_payment(transaction_id, uow.conn()).await?.ok_or_else(|| {
        SqliteDatabaseError::QueryError(format!("Payment {transaction_id} vanished mid-transaction")).into()
    })
}
