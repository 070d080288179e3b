//! Fee valuation: converts a fee into the common valuation currency.
//!
//! Fees paid in a cash-equivalent currency pass through at face value. Fees
//! paid in an instrument with an open stack are valued at that stack's
//! blended notional-per-unit. Anything else cannot be priced and is excluded
//! from cost basis with a caveat.

use crate::config::EngineConfig;
use crate::domain::{Decimal, Direction, Symbol};
use crate::engine::lots::LotStack;
use crate::error::Caveat;
use std::collections::HashMap;

/// Value a fee in the common valuation currency.
///
/// Probes the fee currency's open stacks Long-first, then Short. Returns the
/// fee value plus an optional caveat when the fee had to be dropped.
pub fn value_fee(
    fee_amount: Decimal,
    fee_currency: &Symbol,
    stacks: &HashMap<(Symbol, Direction), LotStack>,
    config: &EngineConfig,
) -> (Decimal, Option<Caveat>) {
    if config.is_dust(fee_amount) {
        return (Decimal::zero(), None);
    }

    if config.is_stable(fee_currency) {
        return (fee_amount, None);
    }

    for direction in [Direction::Long, Direction::Short] {
        let key = (fee_currency.clone(), direction);
        if let Some(rate) = stacks
            .get(&key)
            .and_then(|stack| stack.blended_notional_per_unit(config.dust_epsilon))
        {
            return (fee_amount * rate, None);
        }
    }

    (
        Decimal::zero(),
        Some(Caveat::UnpricedFee {
            currency: fee_currency.clone(),
            amount: fee_amount,
        }),
    )
}
