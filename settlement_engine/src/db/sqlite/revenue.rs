//! The creator and affiliate revenue ledgers.
//!
//! Each ledger entry is paired with an adjustment to the beneficiary's `users.total_revenue` in the same unit of
//! work, so that the running total always equals the sum of that user's active entries.
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::catalog, traits::SettlementError},
    db_types::{ItemKind, Money, NewRevenueEntry, RevenueBeneficiary, RevenueEntry, RevenueStatus, TransactionRevenue},
    helpers::RevenueSplit,
    settlement_objects::AppliedRevenue,
};

const CREATOR_COLUMNS: &str = "id, creator_id AS beneficiary_id, amount, source_type, source_id, referred_user_id, \
                               transaction_id, NULL AS commission_bps, is_paid, status, created_at";
const AFFILIATE_COLUMNS: &str = "id, affiliate_id AS beneficiary_id, amount, source_type, source_id, \
                                 referred_user_id, transaction_id, commission_bps, is_paid, status, created_at";

fn table(beneficiary: RevenueBeneficiary) -> &'static str {
    match beneficiary {
        RevenueBeneficiary::Creator => "creator_revenue",
        RevenueBeneficiary::Affiliate => "affiliate_revenue",
    }
}

/// Records a ledger entry and credits the beneficiary's running total.
pub async fn credit(entry: &NewRevenueEntry, conn: &mut SqliteConnection) -> Result<i64, SettlementError> {
    if !catalog::adjust_total_revenue(entry.beneficiary_id, entry.amount, &mut *conn).await? {
        return Err(SettlementError::BeneficiaryNotFound(entry.beneficiary_id));
    }
    let id = match entry.beneficiary {
        RevenueBeneficiary::Creator => {
            sqlx::query_scalar(
                "INSERT INTO creator_revenue (creator_id, amount, source_type, source_id, referred_user_id, \
                 transaction_id, status) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(entry.beneficiary_id)
            .bind(entry.amount)
            .bind(entry.source_type)
            .bind(entry.source_id)
            .bind(entry.referred_user_id)
            .bind(&entry.transaction_id)
            .bind(RevenueStatus::Active)
            .fetch_one(&mut *conn)
            .await?
        },
        RevenueBeneficiary::Affiliate => {
            sqlx::query_scalar(
                "INSERT INTO affiliate_revenue (affiliate_id, amount, commission_bps, source_type, source_id, \
                 referred_user_id, transaction_id, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(entry.beneficiary_id)
            .bind(entry.amount)
            .bind(entry.commission_bps.unwrap_or_default())
            .bind(entry.source_type)
            .bind(entry.source_id)
            .bind(entry.referred_user_id)
            .bind(&entry.transaction_id)
            .bind(RevenueStatus::Active)
            .fetch_one(&mut *conn)
            .await?
        },
    };
    trace!(
        "🗃️ {} +{} to user #{} for {}",
        table(entry.beneficiary),
        entry.amount,
        entry.beneficiary_id,
        entry.transaction_id
    );
    Ok(id)
}

/// Where a settled amount came from.
#[derive(Debug, Clone, Copy)]
pub struct RevenueSource<'a> {
    pub kind: ItemKind,
    pub item_id: i64,
    pub buyer_id: Option<i64>,
    pub transaction_id: &'a str,
}

/// Applies a computed split: the creator's entry first, then the affiliate's, if any.
pub async fn apply_split(
    split: &RevenueSplit,
    source: RevenueSource<'_>,
    conn: &mut SqliteConnection,
) -> Result<Vec<AppliedRevenue>, SettlementError> {
    let mut shares = vec![(RevenueBeneficiary::Creator, split.creator_id, split.creator_amount, None)];
    if let Some(share) = split.affiliate {
        shares.push((RevenueBeneficiary::Affiliate, share.affiliate_id, share.amount, Some(share.commission_bps)));
    }
    let mut applied = Vec::with_capacity(shares.len());
    for (beneficiary, beneficiary_id, amount, commission_bps) in shares {
        let entry = NewRevenueEntry {
            beneficiary,
            beneficiary_id,
            amount,
            source_type: source.kind,
            source_id: source.item_id,
            referred_user_id: source.buyer_id,
            transaction_id: source.transaction_id.to_string(),
            commission_bps,
        };
        credit(&entry, &mut *conn).await?;
        applied.push(AppliedRevenue { beneficiary, beneficiary_id, amount, commission_bps });
    }
    Ok(applied)
}

pub async fn fetch_for_transaction(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<TransactionRevenue, SettlementError> {
    let creator = sqlx::query_as(&format!(
        "SELECT {CREATOR_COLUMNS} FROM creator_revenue WHERE transaction_id = ? ORDER BY id"
    ))
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;
    let affiliate = sqlx::query_as(&format!(
        "SELECT {AFFILIATE_COLUMNS} FROM affiliate_revenue WHERE transaction_id = ? ORDER BY id"
    ))
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(TransactionRevenue { creator, affiliate })
}

/// Marks every active entry for the transaction as refunded and takes the same amounts off the beneficiaries' running
/// totals. Entries that were already refunded are left alone. Returns the entries that changed.
pub async fn reverse_for_transaction(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<RevenueEntry>, SettlementError> {
    let TransactionRevenue { creator, affiliate } = fetch_for_transaction(transaction_id, &mut *conn).await?;
    let entries = creator
        .into_iter()
        .map(|e| (RevenueBeneficiary::Creator, e))
        .chain(affiliate.into_iter().map(|e| (RevenueBeneficiary::Affiliate, e)))
        .filter(|(_, e)| e.status == RevenueStatus::Active);
    let mut reversed = Vec::new();
    for (beneficiary, mut entry) in entries {
        let result = sqlx::query(&format!("UPDATE {} SET status = ? WHERE id = ? AND status = ?", table(beneficiary)))
            .bind(RevenueStatus::Refunded)
            .bind(entry.id)
            .bind(RevenueStatus::Active)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            continue;
        }
        let debit: Money = -entry.amount;
        if !catalog::adjust_total_revenue(entry.beneficiary_id, debit, &mut *conn).await? {
            return Err(SettlementError::BeneficiaryNotFound(entry.beneficiary_id));
        }
        debug!("🗃️ Reversed {} of {} revenue for user #{}", entry.amount, table(beneficiary), entry.beneficiary_id);
        entry.status = RevenueStatus::Refunded;
        reversed.push(entry);
    }
    Ok(reversed)
}
