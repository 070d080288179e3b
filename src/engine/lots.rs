//! Cost-lot stack: the core data structure of the engine.
//!
//! One stack exists per (instrument, direction) an account has ever touched.
//! Lots append on open and are consumed under the configured discipline on
//! close; a weighted-average discipline consumes proportionally from every
//! lot so the blended average survives partial closes.

use crate::config::Discipline;
use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A discrete slice of acquired quantity carrying its own entry cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLot {
    /// Lot id, for per-lot breakdowns.
    pub id: Uuid,
    /// When the lot was opened.
    pub opened_at: TimeMs,
    /// Quantity remaining in this lot.
    pub quantity: Decimal,
    /// Full economic exposure: what a 1x position would have cost.
    pub notional_cost: Decimal,
    /// Cash actually committed. Invariant: margin_cost <= notional_cost,
    /// equal when leverage <= 1.
    pub margin_cost: Decimal,
}

impl CostLot {
    /// Create a new lot.
    pub fn new(
        opened_at: TimeMs,
        quantity: Decimal,
        notional_cost: Decimal,
        margin_cost: Decimal,
    ) -> Self {
        CostLot {
            id: Uuid::new_v4(),
            opened_at,
            quantity,
            notional_cost,
            margin_cost,
        }
    }

    /// Create a lot with no cost basis (airdrop, deposit of unknown origin).
    pub fn zero_cost(opened_at: TimeMs, quantity: Decimal) -> Self {
        Self::new(opened_at, quantity, Decimal::zero(), Decimal::zero())
    }
}

/// Which action verb opened the short side of a stack.
///
/// Once set, the mode governs the meaning of every subsequent BUY/SELL on
/// that stack until the stack empties, at which point it resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortOpenMode {
    /// No short position has been opened on this stack yet.
    #[default]
    Unset,
    /// Buy-to-open, later sell-to-close.
    ViaBuy,
    /// Borrow-and-sell first, later buy-to-close.
    ViaSell,
}

/// Quantity and cost removed from a stack by one consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Consumed {
    /// Quantity actually consumed (capped at what was available).
    pub quantity: Decimal,
    /// Notional cost carried by the consumed quantity.
    pub notional_cost: Decimal,
    /// Margin cost carried by the consumed quantity.
    pub margin_cost: Decimal,
}

impl Consumed {
    fn none() -> Self {
        Consumed::default()
    }
}

/// Ordered sequence of cost lots for one (instrument, direction) key, plus
/// the realized P/L locked in by closes against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotStack {
    lots: VecDeque<CostLot>,
    /// Realized P/L accumulated by closes on this stack.
    pub realized_pnl: Decimal,
    /// How the short side of this stack was opened.
    pub short_open_mode: ShortOpenMode,
}

impl LotStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lot.
    pub fn open(&mut self, lot: CostLot) {
        self.lots.push_back(lot);
    }

    /// Total open quantity.
    pub fn quantity(&self) -> Decimal {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    /// Total open notional cost.
    pub fn notional_cost(&self) -> Decimal {
        self.lots.iter().map(|l| l.notional_cost).sum()
    }

    /// Total open margin cost.
    pub fn margin_cost(&self) -> Decimal {
        self.lots.iter().map(|l| l.margin_cost).sum()
    }

    /// Blended notional cost per unit of open quantity.
    ///
    /// `None` when the stack holds nothing above the dust floor.
    pub fn blended_notional_per_unit(&self, epsilon: Decimal) -> Option<Decimal> {
        let quantity = self.quantity();
        if quantity <= epsilon {
            None
        } else {
            Some(self.notional_cost() / quantity)
        }
    }

    /// Returns true when nothing above the dust floor remains open.
    pub fn is_drained(&self, epsilon: Decimal) -> bool {
        self.quantity() <= epsilon
    }

    /// Read-only view of the open lots.
    pub fn lots(&self) -> &VecDeque<CostLot> {
        &self.lots
    }

    /// Consume `requested` quantity under `discipline`.
    ///
    /// Consumption silently caps at the available quantity; the caller is
    /// responsible for surfacing the over-consumption as a caveat. When the
    /// stack drains, the short-open mode resets so the next event on this
    /// key re-resolves it.
    pub fn consume(
        &mut self,
        requested: Decimal,
        discipline: Discipline,
        epsilon: Decimal,
    ) -> Consumed {
        let available = self.quantity();
        let take = requested.min(available);
        if take <= epsilon {
            self.reset_if_drained(epsilon);
            return Consumed::none();
        }

        let consumed = match discipline {
            Discipline::Fifo => self.consume_sequential(take, epsilon, false),
            Discipline::Lifo => self.consume_sequential(take, epsilon, true),
            Discipline::Avg => self.consume_proportional(take, available),
        };

        self.reset_if_drained(epsilon);
        consumed
    }

    /// Consume lot-by-lot from one end of the queue.
    fn consume_sequential(&mut self, take: Decimal, epsilon: Decimal, newest_first: bool) -> Consumed {
        let mut remaining = take;
        let mut consumed = Consumed::none();

        while remaining > epsilon {
            let lot = if newest_first {
                self.lots.back_mut()
            } else {
                self.lots.front_mut()
            };
            let Some(lot) = lot else { break };

            if lot.quantity <= epsilon {
                if newest_first {
                    self.lots.pop_back();
                } else {
                    self.lots.pop_front();
                }
                continue;
            }

            let used = remaining.min(lot.quantity);
            let fraction = used / lot.quantity;
            let notional_share = lot.notional_cost * fraction;
            let margin_share = lot.margin_cost * fraction;

            lot.quantity -= used;
            lot.notional_cost -= notional_share;
            lot.margin_cost -= margin_share;

            consumed.quantity += used;
            consumed.notional_cost += notional_share;
            consumed.margin_cost += margin_share;
            remaining -= used;

            if lot.quantity <= epsilon {
                if newest_first {
                    self.lots.pop_back();
                } else {
                    self.lots.pop_front();
                }
            }
        }

        consumed
    }

    /// Remove `take` proportionally from every lot, so the blended average
    /// cost of whatever remains is unchanged.
    fn consume_proportional(&mut self, take: Decimal, available: Decimal) -> Consumed {
        let consumed_fraction = take / available;
        let keep_fraction = Decimal::one() - consumed_fraction;

        let mut consumed = Consumed::none();
        for lot in self.lots.iter_mut() {
            consumed.quantity += lot.quantity * consumed_fraction;
            consumed.notional_cost += lot.notional_cost * consumed_fraction;
            consumed.margin_cost += lot.margin_cost * consumed_fraction;

            lot.quantity = lot.quantity * keep_fraction;
            lot.notional_cost = lot.notional_cost * keep_fraction;
            lot.margin_cost = lot.margin_cost * keep_fraction;
        }

        consumed
    }

    fn reset_if_drained(&mut self, epsilon: Decimal) {
        if self.is_drained(epsilon) {
            self.lots.clear();
            self.short_open_mode = ShortOpenMode::Unset;
        }
    }
}
