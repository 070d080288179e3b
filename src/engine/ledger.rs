//! The ledger fold: sorted events into lot stacks, cash, and realized P/L.
//!
//! This is the single consolidated computation every caller goes through.
//! It is a pure, synchronous fold: nothing is retained between invocations,
//! and repeated computation over identical input is idempotent.

use crate::config::EngineConfig;
use crate::domain::{
    sort_events_deterministic, Action, Decimal, Direction, Event, RawEvent, Symbol,
};
use crate::engine::fees::value_fee;
use crate::engine::lots::{Consumed, CostLot, LotStack, ShortOpenMode};
use crate::engine::normalize::normalize_event;
use crate::engine::transfer::{CostFragment, TransferPool};
use crate::engine::valuation::{build_report, AccountReport};
use crate::engine::PriceSource;
use crate::error::Caveat;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// The cost-basis / lot-accounting engine.
///
/// One instance per account configuration; `compute` is safe to call
/// repeatedly and concurrently from distinct accounts since no state is
/// shared across invocations.
#[derive(Debug, Clone, Default)]
pub struct LotEngine {
    config: EngineConfig,
}

impl LotEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute positions for one account from its full event history.
    pub fn compute(&self, raw_events: &[RawEvent], prices: &dyn PriceSource) -> AccountReport {
        let mut pool = TransferPool::new();
        self.compute_with_pool(raw_events, prices, &mut pool)
    }

    /// Compute positions for one account, sharing a transfer-cost pool.
    ///
    /// Multi-account passes thread the same pool through each account's
    /// computation so cost basis survives cross-account transfers.
    pub fn compute_with_pool(
        &self,
        raw_events: &[RawEvent],
        prices: &dyn PriceSource,
        pool: &mut TransferPool,
    ) -> AccountReport {
        let mut ledger = Ledger::new(&self.config);

        let mut events = Vec::with_capacity(raw_events.len());
        for raw in raw_events {
            match normalize_event(raw) {
                Ok(event) => events.push(event),
                Err(caveat) => {
                    warn!(caveat = %caveat, "skipping raw event");
                    ledger.caveats.push(caveat);
                }
            }
        }
        sort_events_deterministic(&mut events);

        for event in &events {
            ledger.apply(event, pool);
        }

        ledger.into_report(&self.config, prices)
    }
}

/// Mutable fold state for one account.
struct Ledger<'a> {
    config: &'a EngineConfig,
    stacks: HashMap<(Symbol, Direction), LotStack>,
    cash: BTreeMap<Symbol, Decimal>,
    caveats: Vec<Caveat>,
}

impl<'a> Ledger<'a> {
    fn new(config: &'a EngineConfig) -> Self {
        Ledger {
            config,
            stacks: HashMap::new(),
            cash: BTreeMap::new(),
            caveats: Vec::new(),
        }
    }

    fn apply(&mut self, event: &Event, pool: &mut TransferPool) {
        if self.config.is_dust(event.quantity) {
            debug!(event_key = %event.event_key, "ignoring dust-quantity event");
            return;
        }

        debug!(
            event_key = %event.event_key,
            action = %event.action,
            instrument = %event.instrument,
            quantity = %event.quantity,
            "applying event"
        );

        match event.action {
            Action::Airdrop => self.apply_airdrop(event),
            Action::Deposit => self.apply_deposit(event, pool),
            Action::Withdrawal => self.apply_withdrawal(event, pool),
            Action::Buy => self.apply_buy(event),
            Action::Sell => self.apply_sell(event),
            Action::Swap => self.apply_swap(event),
        }
    }

    /// AIRDROP: free cost basis on the long side.
    fn apply_airdrop(&mut self, event: &Event) {
        let lot = CostLot::zero_cost(event.time_ms, event.quantity);
        self.stack_mut(&event.instrument, Direction::Long).open(lot);
    }

    /// DEPOSIT: cash for stables; otherwise inherit cost from the transfer
    /// pool and open at zero cost for whatever the pool cannot supply.
    fn apply_deposit(&mut self, event: &Event, pool: &mut TransferPool) {
        if self.config.is_stable(&event.instrument) {
            self.adjust_cash(&event.instrument, event.quantity);
            return;
        }

        let matched = pool.consume(&event.instrument, event.quantity, self.config.dust_epsilon);
        if !self.config.is_dust(matched.quantity) {
            let lot = CostLot::new(
                event.time_ms,
                matched.quantity,
                matched.notional_cost,
                matched.margin_cost,
            );
            self.stack_mut(&event.instrument, Direction::Long).open(lot);
        }
        if !self.config.is_dust(matched.unmatched) {
            let lot = CostLot::zero_cost(event.time_ms, matched.unmatched);
            self.stack_mut(&event.instrument, Direction::Long).open(lot);
        }
    }

    /// WITHDRAWAL: cash for stables; otherwise consume the long stack and
    /// park the consumed cost in the transfer pool.
    fn apply_withdrawal(&mut self, event: &Event, pool: &mut TransferPool) {
        if self.config.is_stable(&event.instrument) {
            self.adjust_cash(&event.instrument, -event.quantity);
            return;
        }

        let consumed = self.consume_checked(&event.instrument, Direction::Long, event.quantity);
        if !self.config.is_dust(consumed.quantity) {
            pool.enqueue(
                event.instrument.clone(),
                CostFragment {
                    quantity: consumed.quantity,
                    notional_cost: consumed.notional_cost,
                    margin_cost: consumed.margin_cost,
                },
            );
        }
    }

    fn apply_buy(&mut self, event: &Event) {
        if !self.config.is_stable(&event.price_currency) {
            // Receiving leg of a de-facto swap expressed as two rows:
            // quantity moves, cost basis does not.
            match event.direction {
                Direction::Long => {
                    let lot = CostLot::zero_cost(event.time_ms, event.quantity);
                    self.stack_mut(&event.instrument, Direction::Long).open(lot);
                }
                Direction::Short => {
                    self.consume_quantity_only(&event.instrument, Direction::Short, event.quantity);
                }
            }
            return;
        }

        let fee = self.priced_fee(event);
        let trade_value = event.quantity * event.unit_price;

        match event.direction {
            Direction::Long => {
                self.open_position_lot(event, Direction::Long, trade_value, fee);
            }
            Direction::Short => match self.short_mode(&event.instrument) {
                // A BUY opens (or extends) buy-opened short exposure.
                ShortOpenMode::Unset | ShortOpenMode::ViaBuy => {
                    self.set_short_mode(&event.instrument, ShortOpenMode::ViaBuy);
                    self.open_position_lot(event, Direction::Short, trade_value, fee);
                }
                // A BUY closes sell-opened short exposure.
                ShortOpenMode::ViaSell => {
                    let consumed =
                        self.consume_checked(&event.instrument, Direction::Short, event.quantity);
                    if !self.config.is_dust(consumed.quantity) {
                        let buyback_cost = consumed.quantity * event.unit_price + fee;
                        self.add_realized(
                            &event.instrument,
                            Direction::Short,
                            consumed.notional_cost - buyback_cost,
                        );
                    }
                }
            },
        }
    }

    fn apply_sell(&mut self, event: &Event) {
        if !self.config.is_stable(&event.price_currency) {
            // Paying leg of a de-facto swap expressed as two rows.
            match event.direction {
                Direction::Long => {
                    self.consume_quantity_only(&event.instrument, Direction::Long, event.quantity);
                }
                Direction::Short => {
                    let lot = CostLot::zero_cost(event.time_ms, event.quantity);
                    self.stack_mut(&event.instrument, Direction::Short).open(lot);
                }
            }
            return;
        }

        let fee = self.priced_fee(event);
        let trade_value = event.quantity * event.unit_price;

        match event.direction {
            Direction::Long => {
                let consumed =
                    self.consume_checked(&event.instrument, Direction::Long, event.quantity);
                if !self.config.is_dust(consumed.quantity) {
                    let proceeds = consumed.quantity * event.unit_price - fee;
                    self.add_realized(
                        &event.instrument,
                        Direction::Long,
                        proceeds - consumed.notional_cost,
                    );
                }
            }
            Direction::Short => match self.short_mode(&event.instrument) {
                // A SELL opens (or extends) sell-opened short exposure; the
                // lot "cost" is what the sale brought in.
                ShortOpenMode::Unset | ShortOpenMode::ViaSell => {
                    self.set_short_mode(&event.instrument, ShortOpenMode::ViaSell);
                    let lot = CostLot::new(
                        event.time_ms,
                        event.quantity,
                        trade_value - fee,
                        trade_value / event.leverage - fee,
                    );
                    self.stack_mut(&event.instrument, Direction::Short).open(lot);
                }
                // A SELL closes buy-opened short exposure.
                ShortOpenMode::ViaBuy => {
                    let consumed =
                        self.consume_checked(&event.instrument, Direction::Short, event.quantity);
                    if !self.config.is_dust(consumed.quantity) {
                        let proceeds = consumed.quantity * event.unit_price - fee;
                        self.add_realized(
                            &event.instrument,
                            Direction::Short,
                            consumed.notional_cost - proceeds,
                        );
                    }
                }
            },
        }
    }

    /// SWAP: cost basis passes through unchanged in total, re-denominated to
    /// the received instrument.
    fn apply_swap(&mut self, event: &Event) {
        let received = event
            .swap_to
            .clone()
            .unwrap_or_else(|| event.instrument.clone());
        let paid = event
            .swap_from
            .clone()
            .unwrap_or_else(|| event.price_currency.clone());

        let fee = self.priced_fee(event);
        let received_qty = event.quantity;
        let paid_qty = event.quantity * event.unit_price;

        let (notional, margin) = if self.config.is_stable(&paid) {
            (paid_qty + fee, paid_qty + fee)
        } else {
            let consumed = self.consume_checked(&paid, Direction::Long, paid_qty);
            (consumed.notional_cost + fee, consumed.margin_cost + fee)
        };

        let lot = CostLot::new(event.time_ms, received_qty, notional, margin);
        self.stack_mut(&received, Direction::Long).open(lot);
    }

    /// Open a lot from a cash-priced BUY (long) or buy-opened short.
    ///
    /// Notional is the full 1x exposure plus fee; margin is the cash put up:
    /// trade value divided by leverage, plus the fee paid in full.
    fn open_position_lot(
        &mut self,
        event: &Event,
        direction: Direction,
        trade_value: Decimal,
        fee: Decimal,
    ) {
        let lot = CostLot::new(
            event.time_ms,
            event.quantity,
            trade_value + fee,
            trade_value / event.leverage + fee,
        );
        self.stack_mut(&event.instrument, direction).open(lot);
    }

    /// Value the event's fee, collecting a caveat when it cannot be priced.
    fn priced_fee(&mut self, event: &Event) -> Decimal {
        let (fee, caveat) = value_fee(
            event.fee_amount,
            &event.fee_currency,
            &self.stacks,
            self.config,
        );
        if let Some(caveat) = caveat {
            warn!(caveat = %caveat, event_key = %event.event_key, "fee dropped");
            self.caveats.push(caveat);
        }
        fee
    }

    /// Consume under the configured discipline, surfacing over-consumption
    /// as a caveat. The consumption itself silently caps at available.
    fn consume_checked(
        &mut self,
        instrument: &Symbol,
        direction: Direction,
        requested: Decimal,
    ) -> Consumed {
        let epsilon = self.config.dust_epsilon;
        let discipline = self.config.discipline;

        let stack = self.stack_mut(instrument, direction);
        let available = stack.quantity();
        let consumed = stack.consume(requested, discipline, epsilon);

        if requested > available + epsilon {
            let caveat = Caveat::OverConsumption {
                instrument: instrument.clone(),
                direction,
                requested,
                available,
            };
            warn!(caveat = %caveat, "consumption capped");
            self.caveats.push(caveat);
        }
        consumed
    }

    /// Reduce quantity without touching realized P/L (non-cash trade legs).
    fn consume_quantity_only(&mut self, instrument: &Symbol, direction: Direction, quantity: Decimal) {
        self.consume_checked(instrument, direction, quantity);
    }

    fn stack_mut(&mut self, instrument: &Symbol, direction: Direction) -> &mut LotStack {
        self.stacks
            .entry((instrument.clone(), direction))
            .or_default()
    }

    fn short_mode(&self, instrument: &Symbol) -> ShortOpenMode {
        self.stacks
            .get(&(instrument.clone(), Direction::Short))
            .map(|s| s.short_open_mode)
            .unwrap_or_default()
    }

    fn set_short_mode(&mut self, instrument: &Symbol, mode: ShortOpenMode) {
        self.stack_mut(instrument, Direction::Short).short_open_mode = mode;
    }

    fn add_realized(&mut self, instrument: &Symbol, direction: Direction, delta: Decimal) {
        self.stack_mut(instrument, direction).realized_pnl += delta;
    }

    fn adjust_cash(&mut self, currency: &Symbol, delta: Decimal) {
        let balance = self.cash.entry(currency.clone()).or_insert_with(Decimal::zero);
        *balance += delta;
    }

    fn into_report(self, config: &EngineConfig, prices: &dyn PriceSource) -> AccountReport {
        build_report(self.stacks, self.cash, self.caveats, config, prices)
    }
}
