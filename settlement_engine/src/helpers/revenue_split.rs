use crate::db_types::Money;

/// How a settled amount is shared out between the item's creator and, optionally, the buyer's referring affiliate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueSplit {
    pub creator_id: i64,
    pub creator_amount: Money,
    pub affiliate: Option<AffiliateShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffiliateShare {
    pub affiliate_id: i64,
    pub amount: Money,
    pub commission_bps: i64,
}

/// Computes the revenue split for a settled `amount`.
///
/// The creator is always credited with the full amount. The affiliate commission is paid on top of, not out of,
/// the creator's share. `affiliate` is `(affiliate_id, commission_bps)` and is only `Some` when the item takes part
/// in the affiliate programme and the buyer was referred. A commission that rounds to zero is not recorded.
pub fn compute_split(amount: Money, creator_id: i64, affiliate: Option<(i64, i64)>) -> RevenueSplit {
    let affiliate = affiliate
        .map(|(affiliate_id, commission_bps)| AffiliateShare {
            affiliate_id,
            amount: amount.percent_bps(commission_bps),
            commission_bps,
        })
        .filter(|share| share.amount > Money::default());
    RevenueSplit { creator_id, creator_amount: amount, affiliate }
}
