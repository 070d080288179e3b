//! Domain types and determinism layer for the lot-accounting engine.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, AccountId, Symbol, Direction
//! - Raw and normalized event types with stable event keys
//! - Stable event ordering key helper for deterministic processing

pub mod decimal;
pub mod event;
pub mod ordering;
pub mod primitives;

pub use decimal::Decimal;
pub use event::{Action, Event, RawEvent};
pub use ordering::{sort_events_deterministic, EventOrderingKey};
pub use primitives::{AccountId, Direction, Symbol, TimeMs};
