//! Raw and normalized ledger events.
//!
//! `RawEvent` is the loosely typed row handed in by the event store; `Event`
//! is the fully typed form the engine folds over. Every raw event carries a
//! stable `event_key` so diagnostics can be correlated back to source rows.

use crate::domain::{Decimal, Direction, Symbol, TimeMs};
use serde::{Deserialize, Serialize};

/// Normalized event verb. Closed set; `OPEN`/`CLOSE` aliases are resolved
/// into `Buy`/`Sell` during normalization using the declared direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
    Swap,
    Airdrop,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Deposit => "DEPOSIT",
            Action::Withdrawal => "WITHDRAWAL",
            Action::Swap => "SWAP",
            Action::Airdrop => "AIRDROP",
        };
        write!(f, "{}", s)
    }
}

/// A raw financial event as recorded by the event store.
///
/// Numeric fields are `f64` because upstream rows are loosely typed; the
/// normalizer coerces them and skips anything non-finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event time in milliseconds since Unix epoch.
    pub time_ms: i64,
    /// Action verb: BUY, SELL, DEPOSIT, WITHDRAWAL, SWAP, AIRDROP, or the
    /// OPEN/CLOSE aliases.
    pub action: String,
    /// Instrument being acted on (received instrument for SWAP).
    pub instrument: String,
    /// Declared exposure direction; absent means LONG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Quantity of the instrument.
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Price per unit in `price_currency`.
    #[serde(default)]
    pub unit_price: Option<f64>,
    /// Valuation currency of `unit_price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_currency: Option<String>,
    /// Fee amount, in `fee_currency`.
    #[serde(default)]
    pub fee_amount: Option<f64>,
    /// Currency the fee was paid in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_currency: Option<String>,
    /// Leverage multiple; absent or <= 1 means unleveraged.
    #[serde(default)]
    pub leverage: Option<f64>,
    /// Paid instrument of a SWAP; defaults to `price_currency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_from: Option<String>,
    /// Received instrument of a SWAP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_to: Option<String>,
}

impl RawEvent {
    /// Parse a raw event from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Compute a stable unique key for this event.
    ///
    /// # Hash Collision Resistance
    ///
    /// The key truncates a SHA-256 hash to 128 bits (16 bytes), roughly 2^64
    /// collision resistance via the birthday bound — far beyond any realistic
    /// per-account event count.
    pub fn event_key(&self) -> String {
        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(self.time_ms.to_le_bytes());
        hash_var(&mut hasher, self.action.trim());
        hash_var(&mut hasher, &self.instrument.trim().to_uppercase());
        hash_var(&mut hasher, self.direction.as_deref().unwrap_or("").trim());
        hasher.update(self.quantity.unwrap_or(0.0).to_le_bytes());
        hasher.update(self.unit_price.unwrap_or(0.0).to_le_bytes());
        hasher.update(self.fee_amount.unwrap_or(0.0).to_le_bytes());

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}

/// A normalized event, ready for the ledger fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable unique identifier, inherited from the raw event.
    pub event_key: String,
    /// Event time in milliseconds since Unix epoch.
    pub time_ms: TimeMs,
    /// Resolved action verb.
    pub action: Action,
    /// Exposure direction the event applies to.
    pub direction: Direction,
    /// Instrument being acted on.
    pub instrument: Symbol,
    /// Quantity of the instrument, >= 0.
    pub quantity: Decimal,
    /// Price per unit in `price_currency`, >= 0.
    pub unit_price: Decimal,
    /// Valuation currency of `unit_price`.
    pub price_currency: Symbol,
    /// Fee amount in `fee_currency`, >= 0.
    pub fee_amount: Decimal,
    /// Currency the fee was paid in.
    pub fee_currency: Symbol,
    /// Leverage multiple, >= 1.
    pub leverage: Decimal,
    /// Paid instrument of a SWAP (already defaulted to `price_currency`).
    pub swap_from: Option<Symbol>,
    /// Received instrument of a SWAP.
    pub swap_to: Option<Symbol>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(action: &str) -> RawEvent {
        RawEvent {
            time_ms: 1000,
            action: action.to_string(),
            instrument: "BTC".to_string(),
            direction: None,
            quantity: Some(1.0),
            unit_price: Some(50000.0),
            price_currency: Some("USDT".to_string()),
            fee_amount: Some(10.0),
            fee_currency: Some("USDT".to_string()),
            leverage: None,
            swap_from: None,
            swap_to: None,
        }
    }

    #[test]
    fn test_event_key_deterministic() {
        let a = raw("BUY");
        let b = raw("BUY");
        assert_eq!(a.event_key(), b.event_key());
        assert!(a.event_key().starts_with("hash:"));
        assert_eq!(a.event_key().len(), 5 + 32);
    }

    #[test]
    fn test_event_key_differs_per_event() {
        let a = raw("BUY");
        let mut b = raw("BUY");
        b.unit_price = Some(50001.0);
        assert_ne!(a.event_key(), b.event_key());

        let c = raw("SELL");
        assert_ne!(a.event_key(), c.event_key());
    }

    #[test]
    fn test_event_key_ignores_symbol_case() {
        let a = raw("BUY");
        let mut b = raw("BUY");
        b.instrument = "btc".to_string();
        assert_eq!(a.event_key(), b.event_key());
    }

    #[test]
    fn test_raw_event_from_json_sparse_row() {
        let event = RawEvent::from_json(
            r#"{"time_ms": 1000, "action": "AIRDROP", "instrument": "ARB", "quantity": 200}"#,
        )
        .unwrap();
        assert_eq!(event.action, "AIRDROP");
        assert_eq!(event.quantity, Some(200.0));
        assert_eq!(event.unit_price, None);
        assert_eq!(event.direction, None);
    }

    #[test]
    fn test_raw_event_json_roundtrip() {
        let event = raw("SWAP");
        let json = serde_json::to_string(&event).unwrap();
        let back = RawEvent::from_json(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"BUY\"");
        assert_eq!(
            serde_json::to_string(&Action::Withdrawal).unwrap(),
            "\"WITHDRAWAL\""
        );
    }
}
