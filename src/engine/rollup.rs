//! Wallet-tree rollup: child-account reports into a parent/root view.
//!
//! Pure bookkeeping over the engine's output: summed totals, a cash-reserve
//! split at the root, and target-vs-actual allocation percentages per child.
//! Unknown child live values propagate as unknown, never as zero.

use crate::domain::{Decimal, Symbol};
use crate::engine::valuation::AccountReport;
use serde::{Deserialize, Serialize};

/// One child account's contribution to a wallet-tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletChild {
    pub name: String,
    /// Share of the node's allocatable cash this child should receive, in
    /// percent.
    pub target_allocation_pct: Decimal,
    pub invested: Decimal,
    pub value_live: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub cash: Decimal,
}

impl WalletChild {
    /// Build a child entry from an account's computed report.
    pub fn from_report(
        name: impl Into<String>,
        target_allocation_pct: Decimal,
        report: &AccountReport,
    ) -> Self {
        WalletChild {
            name: name.into(),
            target_allocation_pct,
            invested: report.invested_total(),
            value_live: report.value_live_total(),
            unrealized_pnl: report.unrealized_total(),
            realized_pnl: report.realized_pnl,
            cash: report.cash_total(),
        }
    }
}

/// A wallet-tree node: zero or more child accounts plus a cash-reserve rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletNode {
    pub name: String,
    /// Percentage of total cash held back before allocating to children.
    /// Meaningful at the root; interior nodes leave it at zero.
    pub cash_reserve_pct: Decimal,
    pub children: Vec<WalletChild>,
}

/// Per-child allocation figures derived during rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildAllocation {
    pub name: String,
    pub target_pct: Decimal,
    /// Actual share of the node's holdings: (invested + cash) over the sum
    /// across all children, in percent. Zero when the node holds nothing.
    pub actual_pct: Decimal,
    /// This child's share of the allocatable cash by target percentage.
    pub cash_target: Decimal,
}

/// Aggregated view of one wallet-tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub name: String,
    pub total_invested: Decimal,
    pub total_cash: Decimal,
    /// Sum of children's live values; `None` if any child is unpriced.
    pub total_value_live: Option<Decimal>,
    /// Sum of children's unrealized P/L; `None` if any child is unpriced.
    pub pl_unrealized: Option<Decimal>,
    pub pl_realized: Decimal,
    /// Cash held back at this node: total_cash * cash_reserve_pct / 100.
    pub cash_reserve: Decimal,
    /// Cash left to allocate to children after the reserve.
    pub allocatable_cash: Decimal,
    pub allocations: Vec<ChildAllocation>,
}

impl TreeSummary {
    /// Re-wrap this summary as a child of a higher node, so parent views can
    /// be summed upward through the tree.
    pub fn as_child(&self, target_allocation_pct: Decimal) -> WalletChild {
        WalletChild {
            name: self.name.clone(),
            target_allocation_pct,
            invested: self.total_invested,
            value_live: self.total_value_live,
            unrealized_pnl: self.pl_unrealized,
            realized_pnl: self.pl_realized,
            cash: self.total_cash,
        }
    }
}

/// Roll a node's children up into a summary.
///
/// `epsilon` guards the actual-allocation denominator: a node holding
/// nothing reports zero actual percentages instead of dividing by zero.
pub fn rollup_tree(node: &WalletNode, epsilon: Decimal) -> TreeSummary {
    let total_invested: Decimal = node.children.iter().map(|c| c.invested).sum();
    let total_cash: Decimal = node.children.iter().map(|c| c.cash).sum();
    let pl_realized: Decimal = node.children.iter().map(|c| c.realized_pnl).sum();

    let pl_unrealized = sum_known(node.children.iter().map(|c| c.unrealized_pnl));
    let total_value_live = sum_known(node.children.iter().map(|c| c.value_live));

    let cash_reserve = total_cash * node.cash_reserve_pct / Decimal::hundred();
    let allocatable_cash = total_cash - cash_reserve;

    let holdings_denominator: Decimal = node
        .children
        .iter()
        .map(|c| c.invested + c.cash)
        .sum();

    let allocations = node
        .children
        .iter()
        .map(|child| {
            let holdings = child.invested + child.cash;
            let actual_pct = if holdings_denominator.abs() <= epsilon {
                Decimal::zero()
            } else {
                holdings / holdings_denominator * Decimal::hundred()
            };
            ChildAllocation {
                name: child.name.clone(),
                target_pct: child.target_allocation_pct,
                actual_pct,
                cash_target: allocatable_cash * child.target_allocation_pct / Decimal::hundred(),
            }
        })
        .collect();

    TreeSummary {
        name: node.name.clone(),
        total_invested,
        total_cash,
        total_value_live,
        pl_unrealized,
        pl_realized,
        cash_reserve,
        allocatable_cash,
        allocations,
    }
}

/// Sum optional values: `None` as soon as any element is unknown.
fn sum_known<I: Iterator<Item = Option<Decimal>>>(iter: I) -> Option<Decimal> {
    let mut acc = Decimal::zero();
    for value in iter {
        acc += value?;
    }
    Some(acc)
}

/// Convenience: total cash across an account report's stable currencies.
pub fn cash_of(report: &AccountReport, currency: &Symbol) -> Decimal {
    report
        .cash
        .get(currency)
        .copied()
        .unwrap_or_else(Decimal::zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn eps() -> Decimal {
        d("0.000000001")
    }

    fn child(name: &str, target: &str, invested: &str, cash: &str, upnl: Option<&str>) -> WalletChild {
        WalletChild {
            name: name.to_string(),
            target_allocation_pct: d(target),
            invested: d(invested),
            value_live: upnl.map(|u| d(invested) + d(u)),
            unrealized_pnl: upnl.map(d),
            realized_pnl: d("100"),
            cash: d(cash),
        }
    }

    #[test]
    fn test_totals_are_sums_of_children() {
        let node = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: Decimal::zero(),
            children: vec![
                child("a", "60", "1000", "500", Some("50")),
                child("b", "40", "3000", "500", Some("-20")),
            ],
        };
        let summary = rollup_tree(&node, eps());

        assert_eq!(summary.total_invested, d("4000"));
        assert_eq!(summary.total_cash, d("1000"));
        assert_eq!(summary.pl_unrealized, Some(d("30")));
        assert_eq!(summary.pl_realized, d("200"));
        assert_eq!(summary.total_value_live, Some(d("4030")));
    }

    #[test]
    fn test_unknown_child_value_propagates_as_unknown() {
        let node = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: Decimal::zero(),
            children: vec![
                child("a", "50", "1000", "0", Some("50")),
                child("b", "50", "1000", "0", None),
            ],
        };
        let summary = rollup_tree(&node, eps());
        assert_eq!(summary.pl_unrealized, None);
        assert_eq!(summary.total_value_live, None);
        // Known sums are unaffected.
        assert_eq!(summary.total_invested, d("2000"));
    }

    #[test]
    fn test_root_cash_reserve_split() {
        let node = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: d("20"),
            children: vec![
                child("a", "75", "0", "800", Some("0")),
                child("b", "25", "0", "200", Some("0")),
            ],
        };
        let summary = rollup_tree(&node, eps());

        assert_eq!(summary.cash_reserve, d("200"));
        assert_eq!(summary.allocatable_cash, d("800"));
        assert_eq!(summary.allocations[0].cash_target, d("600"));
        assert_eq!(summary.allocations[1].cash_target, d("200"));
    }

    #[test]
    fn test_actual_allocation_percentages() {
        let node = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: Decimal::zero(),
            children: vec![
                child("a", "50", "900", "100", Some("0")),
                child("b", "50", "2900", "100", Some("0")),
            ],
        };
        let summary = rollup_tree(&node, eps());

        assert_eq!(summary.allocations[0].actual_pct, d("25"));
        assert_eq!(summary.allocations[1].actual_pct, d("75"));
    }

    #[test]
    fn test_empty_node_has_zero_actuals() {
        let node = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: d("10"),
            children: vec![child("a", "100", "0", "0", Some("0"))],
        };
        let summary = rollup_tree(&node, eps());
        assert_eq!(summary.allocations[0].actual_pct, Decimal::zero());
        assert_eq!(summary.allocatable_cash, Decimal::zero());
    }

    #[test]
    fn test_summary_feeds_into_parent_rollup() {
        let leaf = WalletNode {
            name: "exchange".to_string(),
            cash_reserve_pct: Decimal::zero(),
            children: vec![child("a", "100", "1000", "500", Some("25"))],
        };
        let leaf_summary = rollup_tree(&leaf, eps());

        let root = WalletNode {
            name: "root".to_string(),
            cash_reserve_pct: Decimal::zero(),
            children: vec![
                leaf_summary.as_child(d("70")),
                child("cold", "30", "2000", "0", Some("0")),
            ],
        };
        let summary = rollup_tree(&root, eps());
        assert_eq!(summary.total_invested, d("3000"));
        assert_eq!(summary.total_cash, d("500"));
        assert_eq!(summary.pl_unrealized, Some(d("25")));
    }
}
