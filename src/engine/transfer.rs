//! Transfer-cost pool: cost basis survives a withdrawal from one account
//! followed by a deposit of the same instrument into another.
//!
//! A withdrawal enqueues the consumed cost as a fragment; a later deposit of
//! the same instrument drains fragments FIFO, splitting the head fragment
//! proportionally when the deposit is smaller than it.

use crate::domain::{Decimal, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// A withdrawn slice of quantity and the cost basis it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostFragment {
    pub quantity: Decimal,
    pub notional_cost: Decimal,
    pub margin_cost: Decimal,
}

/// Result of draining the pool against one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolMatch {
    /// Quantity the pool could supply.
    pub quantity: Decimal,
    /// Notional cost inherited with that quantity.
    pub notional_cost: Decimal,
    /// Margin cost inherited with that quantity.
    pub margin_cost: Decimal,
    /// Deposited quantity the pool could not account for; this portion has
    /// no known origin and opens at zero cost.
    pub unmatched: Decimal,
}

/// FIFO queues of withdrawn cost fragments, keyed by instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferPool {
    queues: HashMap<Symbol, VecDeque<CostFragment>>,
}

impl TransferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a withdrawal's consumed cost for later inheritance.
    pub fn enqueue(&mut self, instrument: Symbol, fragment: CostFragment) {
        if fragment.quantity.is_positive() {
            self.queues.entry(instrument).or_default().push_back(fragment);
        }
    }

    /// Drain up to `requested` quantity of `instrument` from the pool.
    ///
    /// Fragments are consumed oldest-first; the head fragment is split
    /// proportionally when only part of it is needed.
    pub fn consume(&mut self, instrument: &Symbol, requested: Decimal, epsilon: Decimal) -> PoolMatch {
        let mut matched = PoolMatch {
            unmatched: requested,
            ..PoolMatch::default()
        };

        let Some(queue) = self.queues.get_mut(instrument) else {
            return matched;
        };

        let mut remaining = requested;
        while remaining > epsilon {
            let Some(fragment) = queue.front_mut() else { break };

            if fragment.quantity <= epsilon {
                queue.pop_front();
                continue;
            }

            let used = remaining.min(fragment.quantity);
            let fraction = used / fragment.quantity;
            let notional_share = fragment.notional_cost * fraction;
            let margin_share = fragment.margin_cost * fraction;

            fragment.quantity -= used;
            fragment.notional_cost -= notional_share;
            fragment.margin_cost -= margin_share;

            matched.quantity += used;
            matched.notional_cost += notional_share;
            matched.margin_cost += margin_share;
            remaining -= used;

            if fragment.quantity <= epsilon {
                queue.pop_front();
            }
        }

        if queue.is_empty() {
            self.queues.remove(instrument);
        }

        matched.unmatched = requested - matched.quantity;
        matched
    }

    /// Quantity still parked in the pool for an instrument.
    pub fn pending_quantity(&self, instrument: &Symbol) -> Decimal {
        self.queues
            .get(instrument)
            .map(|q| q.iter().map(|f| f.quantity).sum())
            .unwrap_or_else(Decimal::zero)
    }

    /// Returns true when no fragments are parked anywhere.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
