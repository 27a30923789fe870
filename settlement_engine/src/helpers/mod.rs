pub mod gateway_hash;
mod order_resolver;
mod revenue_split;
mod ticket_codes;

pub use gateway_hash::{GatewaySecrets, HashedFields, SecretVariant};
pub use order_resolver::{resolve_order_id, OrderTarget, ResolvedOrder};
pub use revenue_split::{compute_split, AffiliateShare, RevenueSplit};
pub use ticket_codes::{new_ticket_code, qr_payload};
