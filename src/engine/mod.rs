//! Pure computation engine for deterministic lot accounting.

use crate::domain::{Decimal, Symbol};
use std::collections::HashMap;

pub mod fees;
pub mod ledger;
pub mod lots;
pub mod normalize;
pub mod rollup;
pub mod transfer;
pub mod valuation;

pub use ledger::LotEngine;
pub use lots::{Consumed, CostLot, LotStack, ShortOpenMode};
pub use normalize::normalize_event;
pub use rollup::{rollup_tree, ChildAllocation, TreeSummary, WalletChild, WalletNode};
pub use transfer::{CostFragment, PoolMatch, TransferPool};
pub use valuation::{AccountReport, Position};

/// Injected read-only live-price lookup.
///
/// The engine only reads prices and treats the result as a point-in-time
/// snapshot; an absent price propagates as unknown, never as zero.
pub trait PriceSource {
    fn price(&self, instrument: &Symbol) -> Option<Decimal>;
}

impl PriceSource for HashMap<Symbol, Decimal> {
    fn price(&self, instrument: &Symbol) -> Option<Decimal> {
        self.get(instrument).copied()
    }
}

/// Adapter turning a closure into a [`PriceSource`].
#[derive(Debug, Clone, Copy)]
pub struct PriceFn<F>(pub F);

impl<F> PriceSource for PriceFn<F>
where
    F: Fn(&Symbol) -> Option<Decimal>,
{
    fn price(&self, instrument: &Symbol) -> Option<Decimal> {
        (self.0)(instrument)
    }
}

/// A price source with no prices: every valuation comes back unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrices;

impl PriceSource for NoPrices {
    fn price(&self, _instrument: &Symbol) -> Option<Decimal> {
        None
    }
}
