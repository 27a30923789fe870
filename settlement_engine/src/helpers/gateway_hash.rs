//! # Gateway callback authentication
//!
//! The payment gateway signs every callback with a shared secret. The signature is an HMAC-SHA256 over a fixed
//! sequence of form values, joined with `|`, and sent as lowercase hex in the `hash` form field:
//!
//! ```text
//!    {amount}|{currency}|{description}|{orderId}|{customerName}|{customerEmail}|{customerPhone}|{transactionId}|{status}
//! ```
//!
//! Values are used exactly as they arrive. No trimming, no case folding and no re-formatting of the amount, since
//! the gateway signs the raw strings it sends.
//!
//! The gateway issues a production secret and a separate sandbox secret. Which one is used to verify a callback is a
//! deployment decision, selected with [`SecretVariant`].
use hmac::{Hmac, Mac};
use log::*;
use settle_common::Secret;
use sha2::Sha256;

use crate::db::traits::SettlementError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecretVariant {
    #[default]
    Production,
    Test,
}

/// The callback values that take part in the signature, in signing order.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedFields<'a> {
    pub amount: &'a str,
    pub currency: &'a str,
    pub description: &'a str,
    pub order_id: &'a str,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub customer_phone: &'a str,
    pub transaction_id: &'a str,
    pub status: &'a str,
}

impl<'a> HashedFields<'a> {
    pub fn message(&self) -> String {
        [
            self.amount,
            self.currency,
            self.description,
            self.order_id,
            self.customer_name,
            self.customer_email,
            self.customer_phone,
            self.transaction_id,
            self.status,
        ]
        .join("|")
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewaySecrets {
    production: Secret<String>,
    test: Option<Secret<String>>,
}

impl GatewaySecrets {
    pub fn new(production: Secret<String>, test: Option<Secret<String>>) -> Self {
        Self { production, test }
    }

    fn key(&self, variant: SecretVariant) -> Option<&str> {
        let key = match variant {
            SecretVariant::Production => Some(&self.production),
            SecretVariant::Test => self.test.as_ref(),
        };
        key.map(|k| k.reveal().as_str()).filter(|k| !k.is_empty())
    }

    /// Produces the lowercase hex signature for the given fields. Returns `None` if the selected secret is not
    /// configured.
    pub fn sign(&self, fields: &HashedFields<'_>, variant: SecretVariant) -> Option<String> {
        let mut mac = new_mac(self.key(variant)?)?;
        mac.update(fields.message().as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `claimed_hash` against the signature of `fields` in constant time.
    ///
    /// A missing secret, a claimed hash that is not valid hex, or a mismatch all return `false`.
    pub fn verify(&self, fields: &HashedFields<'_>, claimed_hash: &str, variant: SecretVariant) -> bool {
        let Some(key) = self.key(variant) else {
            warn!("🔐️ No {variant:?} gateway secret is configured. Callback cannot be verified.");
            return false;
        };
        let Ok(claimed) = hex::decode(claimed_hash.trim()) else {
            debug!("🔐️ Callback hash is not valid hex");
            return false;
        };
        let Some(mut mac) = new_mac(key) else {
            return false;
        };
        mac.update(fields.message().as_bytes());
        mac.verify_slice(&claimed).is_ok()
    }

    pub fn verify_or_err(
        &self,
        fields: &HashedFields<'_>,
        claimed_hash: &str,
        variant: SecretVariant,
    ) -> Result<(), SettlementError> {
        if self.verify(fields, claimed_hash, variant) {
            trace!("🔐️ Callback hash for {} ✅️", fields.transaction_id);
            Ok(())
        } else {
            warn!("🔐️ Invalid callback hash for transaction {}. Rejecting.", fields.transaction_id);
            Err(SettlementError::Authenticity)
        }
    }
}

fn new_mac(key: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(key.as_bytes()).ok()
}
