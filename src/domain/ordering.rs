//! Stable event ordering for deterministic processing.

use crate::domain::{Action, Event};

/// Stable ordering key for events.
///
/// Ordering: time_ms -> action rank -> event_key.
///
/// The action rank places WITHDRAWAL before DEPOSIT before everything else at
/// the same instant, so a withdraw-then-redeposit pair resolves before the
/// deposit tries to inherit cost from a withdrawal that has not happened yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventOrderingKey {
    /// Time in milliseconds (primary sort).
    pub time_ms: i64,
    /// Same-instant rank: withdrawal 0, deposit 1, everything else 2.
    pub action_rank: u8,
    /// Stable event key (fallback sort).
    pub event_key: String,
}

impl EventOrderingKey {
    /// Create an ordering key from an Event.
    pub fn from_event(event: &Event) -> Self {
        EventOrderingKey {
            time_ms: event.time_ms.as_ms(),
            action_rank: action_rank(event.action),
            event_key: event.event_key.clone(),
        }
    }

    /// Compare two events for deterministic ordering.
    ///
    /// Returns true if event_a should come before event_b.
    pub fn should_come_before(event_a: &Event, event_b: &Event) -> bool {
        let key_a = Self::from_event(event_a);
        let key_b = Self::from_event(event_b);
        key_a < key_b
    }
}

fn action_rank(action: Action) -> u8 {
    match action {
        Action::Withdrawal => 0,
        Action::Deposit => 1,
        _ => 2,
    }
}

/// Sort events deterministically.
pub fn sort_events_deterministic(events: &mut [Event]) {
    events.sort_by(|a, b| {
        let key_a = EventOrderingKey::from_event(a);
        let key_b = EventOrderingKey::from_event(b);
        key_a.cmp(&key_b)
    });
}
