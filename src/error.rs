use crate::domain::{Decimal, Direction, Symbol};
use thiserror::Error;

pub use crate::config::ConfigError;

/// Non-fatal data-quality condition observed during a computation.
///
/// Nothing inside a computation aborts the batch; the worst outcome is a
/// position with degraded precision. Caveats are collected into the report so
/// callers can surface them upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Caveat {
    /// A raw event was skipped because it could not be normalized.
    #[error("event {event_key} skipped: {reason}")]
    MalformedEvent { event_key: String, reason: String },

    /// A close or withdrawal requested more quantity than was open; the
    /// consumption was capped at what was available.
    #[error("{direction} {instrument}: requested {requested} but only {available} open")]
    OverConsumption {
        instrument: Symbol,
        direction: Direction,
        requested: Decimal,
        available: Decimal,
    },

    /// A fee could not be priced (not cash, no matching open stack) and was
    /// excluded from cost basis.
    #[error("fee of {amount} {currency} could not be priced; excluded from cost basis")]
    UnpricedFee { currency: Symbol, amount: Decimal },
}
