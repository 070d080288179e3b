//! Position aggregation and live valuation.
//!
//! Collapses lot stacks into reportable positions and, when a live price is
//! available, marks them to market. A missing price yields unknown (`None`)
//! unrealized fields, never zero.

use crate::config::EngineConfig;
use crate::domain::{Decimal, Direction, Symbol};
use crate::engine::lots::LotStack;
use crate::engine::PriceSource;
use crate::error::Caveat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A reportable position: derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: Symbol,
    pub direction: Direction,
    /// Total open quantity.
    pub quantity: Decimal,
    /// Cash committed: sum of margin cost across open lots.
    pub invested: Decimal,
    /// Full 1x exposure: sum of notional cost across open lots.
    pub notional_open: Decimal,
    /// Blended margin cost per unit.
    pub avg_cost_margin: Decimal,
    /// Blended notional cost per unit.
    pub avg_cost_notional: Decimal,
    /// P/L locked in by closes on this stack.
    pub realized_pnl: Decimal,
    /// Paper P/L against the live price; `None` when the price is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl: Option<Decimal>,
    /// Invested plus unrealized; `None` when the price is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_live: Option<Decimal>,
    /// Unrealized P/L as a percentage of invested; `None` when the price is
    /// unknown or invested is below the dust floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<Decimal>,
}

/// Everything one computation pass produces for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReport {
    /// Open positions, stables excluded, ordered by (instrument, direction).
    pub positions: Vec<Position>,
    /// Cash ledger: stable deposits minus withdrawals, per currency.
    pub cash: BTreeMap<Symbol, Decimal>,
    /// Account-total realized P/L, including stacks that closed out flat.
    pub realized_pnl: Decimal,
    /// Data-quality conditions observed during the computation.
    pub caveats: Vec<Caveat>,
}

impl AccountReport {
    /// Find a position by instrument and direction.
    pub fn position(&self, instrument: &Symbol, direction: Direction) -> Option<&Position> {
        self.positions
            .iter()
            .find(|p| &p.instrument == instrument && p.direction == direction)
    }

    /// Total cash across stable currencies, at face value.
    pub fn cash_total(&self) -> Decimal {
        self.cash.values().copied().sum()
    }

    /// Total cash committed to open positions.
    pub fn invested_total(&self) -> Decimal {
        self.positions.iter().map(|p| p.invested).sum()
    }

    /// Total unrealized P/L; `None` if any position is unpriced.
    pub fn unrealized_total(&self) -> Option<Decimal> {
        self.positions
            .iter()
            .map(|p| p.unrealized_pnl)
            .try_fold(Decimal::zero(), |acc, u| u.map(|u| acc + u))
    }

    /// Total live value of open positions; `None` if any position is unpriced.
    pub fn value_live_total(&self) -> Option<Decimal> {
        self.positions
            .iter()
            .map(|p| p.value_live)
            .try_fold(Decimal::zero(), |acc, v| v.map(|v| acc + v))
    }
}

/// Build the report from the final fold state.
pub(crate) fn build_report(
    stacks: HashMap<(Symbol, Direction), LotStack>,
    cash: BTreeMap<Symbol, Decimal>,
    caveats: Vec<Caveat>,
    config: &EngineConfig,
    prices: &dyn PriceSource,
) -> AccountReport {
    let realized_pnl = stacks.values().map(|s| s.realized_pnl).sum();

    let mut positions: Vec<Position> = stacks
        .iter()
        .filter(|((instrument, _), stack)| {
            !config.is_stable(instrument) && !stack.is_drained(config.dust_epsilon)
        })
        .map(|((instrument, direction), stack)| {
            aggregate(instrument.clone(), *direction, stack, config, prices)
        })
        .collect();

    positions.sort_by(|a, b| {
        (&a.instrument, a.direction.is_short()).cmp(&(&b.instrument, b.direction.is_short()))
    });

    AccountReport {
        positions,
        cash,
        realized_pnl,
        caveats,
    }
}

/// Collapse one stack into a position and mark it to market.
fn aggregate(
    instrument: Symbol,
    direction: Direction,
    stack: &LotStack,
    config: &EngineConfig,
    prices: &dyn PriceSource,
) -> Position {
    let quantity = stack.quantity();
    let invested = stack.margin_cost();
    let notional_open = stack.notional_cost();

    // quantity is above the dust floor here; division is safe.
    let avg_cost_margin = invested / quantity;
    let avg_cost_notional = notional_open / quantity;

    let unrealized_pnl = prices.price(&instrument).map(|price| {
        let market = quantity * price;
        match direction {
            Direction::Long => market - notional_open,
            Direction::Short => notional_open - market,
        }
    });
    let value_live = unrealized_pnl.map(|u| invested + u);
    let pnl_pct = match unrealized_pnl {
        Some(u) if !config.is_dust(invested) => Some(u / invested * Decimal::hundred()),
        _ => None,
    };

    Position {
        instrument,
        direction,
        quantity,
        invested,
        notional_open,
        avg_cost_margin,
        avg_cost_notional,
        realized_pnl: stack.realized_pnl,
        unrealized_pnl,
        value_live,
        pnl_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeMs;
    use crate::engine::lots::CostLot;
    use crate::engine::NoPrices;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn stacks_from(
        entries: Vec<(&str, Direction, &str, &str, &str)>,
    ) -> HashMap<(Symbol, Direction), LotStack> {
        let mut stacks = HashMap::new();
        for (symbol, direction, qty, notional, margin) in entries {
            let mut stack = LotStack::new();
            stack.open(CostLot::new(TimeMs::new(0), d(qty), d(notional), d(margin)));
            stacks.insert((Symbol::new(symbol), direction), stack);
        }
        stacks
    }

    #[test]
    fn test_aggregation_and_averages() {
        let stacks = stacks_from(vec![("BTC", Direction::Long, "2", "100000", "50000")]);
        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &NoPrices,
        );

        let btc = report.position(&Symbol::new("BTC"), Direction::Long).unwrap();
        assert_eq!(btc.quantity, d("2"));
        assert_eq!(btc.invested, d("50000"));
        assert_eq!(btc.notional_open, d("100000"));
        assert_eq!(btc.avg_cost_margin, d("25000"));
        assert_eq!(btc.avg_cost_notional, d("50000"));
    }

    #[test]
    fn test_missing_price_is_unknown_not_zero() {
        let stacks = stacks_from(vec![("BTC", Direction::Long, "1", "50000", "50000")]);
        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &NoPrices,
        );

        let btc = report.position(&Symbol::new("BTC"), Direction::Long).unwrap();
        assert_eq!(btc.unrealized_pnl, None);
        assert_eq!(btc.value_live, None);
        assert_eq!(btc.pnl_pct, None);
        assert_eq!(report.unrealized_total(), None);
    }

    #[test]
    fn test_long_unrealized_rises_with_price() {
        let stacks = stacks_from(vec![("BTC", Direction::Long, "1", "50000", "50000")]);
        let mut prices = HashMap::new();
        prices.insert(Symbol::new("BTC"), d("60000"));

        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &prices,
        );
        let btc = report.position(&Symbol::new("BTC"), Direction::Long).unwrap();
        assert_eq!(btc.unrealized_pnl, Some(d("10000")));
        assert_eq!(btc.value_live, Some(d("60000")));
        assert_eq!(btc.pnl_pct, Some(d("20")));
    }

    #[test]
    fn test_short_unrealized_rises_when_price_falls() {
        let stacks = stacks_from(vec![("ETH", Direction::Short, "2", "6000", "6000")]);
        let mut prices = HashMap::new();
        prices.insert(Symbol::new("ETH"), d("2500"));

        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &prices,
        );
        let eth = report.position(&Symbol::new("ETH"), Direction::Short).unwrap();
        assert_eq!(eth.unrealized_pnl, Some(d("1000")));
        assert_eq!(eth.value_live, Some(d("7000")));
    }

    #[test]
    fn test_zero_invested_has_no_pct() {
        // Airdropped lot: quantity with no cost.
        let stacks = stacks_from(vec![("ARB", Direction::Long, "200", "0", "0")]);
        let mut prices = HashMap::new();
        prices.insert(Symbol::new("ARB"), d("1.5"));

        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &prices,
        );
        let arb = report.position(&Symbol::new("ARB"), Direction::Long).unwrap();
        assert_eq!(arb.unrealized_pnl, Some(d("300")));
        assert_eq!(arb.pnl_pct, None);
    }

    #[test]
    fn test_stables_and_drained_stacks_are_excluded() {
        let mut stacks = stacks_from(vec![("USDT", Direction::Long, "100", "100", "100")]);
        let mut drained = LotStack::new();
        drained.realized_pnl = d("42");
        stacks.insert((Symbol::new("SOL"), Direction::Long), drained);

        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &NoPrices,
        );
        assert!(report.positions.is_empty());
        // Closed-out realized P/L still reaches the account total.
        assert_eq!(report.realized_pnl, d("42"));
    }

    #[test]
    fn test_positions_sorted_by_instrument_then_direction() {
        let stacks = stacks_from(vec![
            ("ETH", Direction::Short, "1", "3000", "3000"),
            ("ETH", Direction::Long, "1", "3000", "3000"),
            ("BTC", Direction::Long, "1", "50000", "50000"),
        ]);
        let report = build_report(
            stacks,
            BTreeMap::new(),
            Vec::new(),
            &EngineConfig::default(),
            &NoPrices,
        );
        let keys: Vec<_> = report
            .positions
            .iter()
            .map(|p| (p.instrument.as_str().to_string(), p.direction))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("BTC".to_string(), Direction::Long),
                ("ETH".to_string(), Direction::Long),
                ("ETH".to_string(), Direction::Short),
            ]
        );
    }
}
