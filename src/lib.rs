//! Cost-basis / lot-accounting engine for a crypto-portfolio ledger.
//!
//! Given an unordered batch of raw financial events for an account, the
//! engine reconstructs the open cost lots per (instrument, direction), the
//! realized P/L locked in so far, and — given a live price snapshot — the
//! unrealized P/L. Lot consumption follows a configurable discipline (LIFO,
//! FIFO, or weighted-average), leverage splits notional exposure from margin
//! cash at risk, and a transfer-cost pool lets cost basis survive moves
//! between custodial accounts.
//!
//! The engine is pure and stateless between invocations: each computation
//! folds the complete event history and derives positions from scratch.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::{Discipline, EngineConfig};
pub use domain::{AccountId, Action, Decimal, Direction, Event, RawEvent, Symbol, TimeMs};
pub use engine::{
    rollup_tree, AccountReport, LotEngine, NoPrices, Position, PriceFn, PriceSource, TransferPool,
    TreeSummary, WalletChild, WalletNode,
};
pub use error::{Caveat, ConfigError};
