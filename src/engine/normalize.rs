//! Event normalization: raw store rows into typed ledger events.
//!
//! Resolves the OPEN/CLOSE aliases against the declared direction, uppercases
//! symbols, and coerces loose numerics. A row that cannot be normalized is
//! rejected with a caveat; it never aborts the batch.

use crate::domain::{Action, Decimal, Direction, Event, RawEvent, Symbol, TimeMs};
use crate::error::Caveat;

/// Default valuation currency when a row does not name one.
const DEFAULT_PRICE_CURRENCY: &str = "USDT";

/// Normalize one raw event.
///
/// # Errors
/// Returns a [`Caveat::MalformedEvent`] describing why the row was skipped.
pub fn normalize_event(raw: &RawEvent) -> Result<Event, Caveat> {
    let event_key = raw.event_key();
    let malformed = |reason: &str| Caveat::MalformedEvent {
        event_key: event_key.clone(),
        reason: reason.to_string(),
    };

    let direction = Direction::from_raw(raw.direction.as_deref());
    let action = resolve_action(&raw.action, direction).ok_or_else(|| malformed("unknown action"))?;

    let instrument = Symbol::normalized(&raw.instrument);
    if instrument.is_empty() {
        return Err(malformed("missing instrument"));
    }

    let quantity = match raw.quantity {
        None => return Err(malformed("missing quantity")),
        Some(q) => Decimal::from_f64(q).ok_or_else(|| malformed("non-finite quantity"))?,
    };
    if quantity.is_negative() {
        return Err(malformed("negative quantity"));
    }

    // Only BUY/SELL/SWAP read the price; quantity-only actions default it.
    let price_required = matches!(action, Action::Buy | Action::Sell | Action::Swap);
    let unit_price = match raw.unit_price {
        Some(p) => match Decimal::from_f64(p) {
            Some(p) if !p.is_negative() => p,
            Some(_) => return Err(malformed("negative unit price")),
            None if price_required => return Err(malformed("non-finite unit price")),
            None => Decimal::zero(),
        },
        None if price_required => return Err(malformed("missing unit price")),
        None => Decimal::zero(),
    };

    let price_currency = raw
        .price_currency
        .as_deref()
        .map(Symbol::normalized)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Symbol::new(DEFAULT_PRICE_CURRENCY));

    let fee_amount = raw
        .fee_amount
        .and_then(Decimal::from_f64)
        .filter(|f| f.is_positive())
        .unwrap_or_else(Decimal::zero);

    let fee_currency = raw
        .fee_currency
        .as_deref()
        .map(Symbol::normalized)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| price_currency.clone());

    let leverage = raw
        .leverage
        .and_then(Decimal::from_f64)
        .filter(|l| *l > Decimal::one())
        .unwrap_or_else(Decimal::one);

    let swap_from = raw
        .swap_from
        .as_deref()
        .map(Symbol::normalized)
        .filter(|s| !s.is_empty());

    // For a SWAP the received leg falls back to the row's instrument column.
    let (instrument, swap_to) = if action == Action::Swap {
        let received = raw
            .swap_to
            .as_deref()
            .map(Symbol::normalized)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| instrument.clone());
        (received.clone(), Some(received))
    } else {
        (instrument, None)
    };

    Ok(Event {
        event_key,
        time_ms: TimeMs::new(raw.time_ms),
        action,
        direction,
        instrument,
        quantity,
        unit_price,
        price_currency,
        fee_amount,
        fee_currency,
        leverage,
        swap_from,
        swap_to,
    })
}

/// Resolve the action verb, folding the OPEN/CLOSE aliases into BUY/SELL
/// based on the declared direction.
fn resolve_action(raw: &str, direction: Direction) -> Option<Action> {
    match raw.trim().to_uppercase().as_str() {
        "BUY" => Some(Action::Buy),
        "SELL" => Some(Action::Sell),
        "DEPOSIT" => Some(Action::Deposit),
        "WITHDRAWAL" | "WITHDRAW" => Some(Action::Withdrawal),
        "SWAP" => Some(Action::Swap),
        "AIRDROP" => Some(Action::Airdrop),
        "OPEN" => Some(if direction.is_short() {
            Action::Sell
        } else {
            Action::Buy
        }),
        "CLOSE" => Some(if direction.is_short() {
            Action::Buy
        } else {
            Action::Sell
        }),
        _ => None,
    }
}
