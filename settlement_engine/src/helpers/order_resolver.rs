use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{db::traits::SettlementError, db_types::ItemKind};

static EVENT_ORDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^EVENT_(\d+)_\d+$").unwrap());
static MOVIE_ORDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^MOVIE_(\d+)_\d+$").unwrap());

/// The item an order id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OrderTarget {
    pub kind: ItemKind,
    pub item_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedOrder {
    Event { item_id: i64 },
    Movie { item_id: i64 },
    Unrecognized,
}

impl ResolvedOrder {
    pub fn target(&self) -> Option<OrderTarget> {
        match *self {
            ResolvedOrder::Event { item_id } => Some(OrderTarget { kind: ItemKind::Event, item_id }),
            ResolvedOrder::Movie { item_id } => Some(OrderTarget { kind: ItemKind::Movie, item_id }),
            ResolvedOrder::Unrecognized => None,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, ResolvedOrder::Event { .. })
    }

    /// Webhooks must name a purchasable item. Anything else is a hard error.
    pub fn require(self, order_id: &str) -> Result<OrderTarget, SettlementError> {
        self.target().ok_or_else(|| SettlementError::UnrecognizedOrderFormat(order_id.to_string()))
    }
}

/// Maps a gateway order id of the form `{KIND}_{itemId}_{disambiguator}` onto the item being bought.
pub fn resolve_order_id(order_id: &str) -> ResolvedOrder {
    let capture = |re: &Regex| re.captures(order_id).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<i64>().ok());
    if let Some(item_id) = capture(&EVENT_ORDER) {
        ResolvedOrder::Event { item_id }
    } else if let Some(item_id) = capture(&MOVIE_ORDER) {
        ResolvedOrder::Movie { item_id }
    } else {
        ResolvedOrder::Unrecognized
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolve_order_ids() {
        assert_eq!(resolve_order_id("EVENT_5_1000"), ResolvedOrder::Event { item_id: 5 });
        assert_eq!(resolve_order_id("MOVIE_12_1699999999"), ResolvedOrder::Movie { item_id: 12 });
        assert_eq!(resolve_order_id("Weekend_in_Taipei"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id("N/A"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id(""), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id("EVENT_5"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id("event_5_1000"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id(" EVENT_5_1000"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id("EVENT_x_1000"), ResolvedOrder::Unrecognized);
        assert_eq!(resolve_order_id("EVENT_99999999999999999999_1"), ResolvedOrder::Unrecognized);
    }

    #[test]
    fn require_target() {
        let target = resolve_order_id("EVENT_5_1000").require("EVENT_5_1000").unwrap();
        assert_eq!(target, OrderTarget { kind: ItemKind::Event, item_id: 5 });
        let err = resolve_order_id("ORDER_5_1000").require("ORDER_5_1000").unwrap_err();
        assert!(matches!(err, SettlementError::UnrecognizedOrderFormat(s) if s == "ORDER_5_1000"));
    }
}
