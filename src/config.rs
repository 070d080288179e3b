use crate::domain::{Decimal, Symbol};
use std::collections::BTreeSet;
use std::collections::HashMap;
use thiserror::Error;

/// Lot-consumption discipline: which lot(s) are reduced when a position is
/// partially closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    /// Consume from the most recently opened lot backward.
    Lifo,
    /// Consume from the oldest lot forward.
    Fifo,
    /// Treat the whole stack as one pool; consume proportionally.
    #[default]
    Avg,
}

impl Discipline {
    /// Parse a discipline from raw input (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "lifo" => Ok(Discipline::Lifo),
            "fifo" => Ok(Discipline::Fifo),
            "avg" | "average" => Ok(Discipline::Avg),
            other => Err(ConfigError::InvalidValue(
                "LOT_DISCIPLINE".to_string(),
                format!("must be lifo, fifo, or avg, got {}", other),
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Per-account engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lot-consumption discipline.
    pub discipline: Discipline,
    /// Symbols treated as cash-equivalent. Deposits and withdrawals of these
    /// move the cash ledger instead of opening lots, and fees priced in them
    /// are taken at face value.
    pub stable_currencies: BTreeSet<Symbol>,
    /// Floor below which a quantity or cost is treated as zero.
    pub dust_epsilon: Decimal,
}

impl EngineConfig {
    /// Default stable-currency set.
    pub fn default_stables() -> BTreeSet<Symbol> {
        ["USD", "USDT", "USDC", "BUSD", "DAI", "TUSD", "EUR"]
            .iter()
            .map(|s| Symbol::new(*s))
            .collect()
    }

    /// Replace the discipline.
    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Replace the stable-currency set.
    pub fn with_stables<I: IntoIterator<Item = Symbol>>(mut self, stables: I) -> Self {
        self.stable_currencies = stables.into_iter().collect();
        self
    }

    /// Returns true if the symbol is treated as cash-equivalent.
    pub fn is_stable(&self, symbol: &Symbol) -> bool {
        self.stable_currencies.contains(symbol)
    }

    /// Returns true if the quantity or cost is below the dust floor.
    pub fn is_dust(&self, value: Decimal) -> bool {
        value.abs() <= self.dust_epsilon
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    /// Build a configuration from an environment map.
    ///
    /// Recognized variables: `LOT_DISCIPLINE` (lifo|fifo|avg, default avg),
    /// `STABLE_CURRENCIES` (comma-separated symbols), `DUST_EPSILON`
    /// (decimal string).
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let discipline = match env_map.get("LOT_DISCIPLINE") {
            Some(raw) => Discipline::parse(raw)?,
            None => Discipline::default(),
        };

        let stable_currencies = match env_map.get("STABLE_CURRENCIES") {
            Some(raw) => {
                let parsed: BTreeSet<Symbol> = raw
                    .split(',')
                    .map(|s| Symbol::normalized(s))
                    .filter(|s| !s.is_empty())
                    .collect();
                if parsed.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "STABLE_CURRENCIES".to_string(),
                        "must contain at least one symbol".to_string(),
                    ));
                }
                parsed
            }
            None => Self::default_stables(),
        };

        let dust_epsilon = match env_map.get("DUST_EPSILON") {
            Some(raw) => {
                let parsed = Decimal::from_str_canonical(raw.trim()).map_err(|_| {
                    ConfigError::InvalidValue(
                        "DUST_EPSILON".to_string(),
                        "must be a valid decimal".to_string(),
                    )
                })?;
                if parsed.is_negative() {
                    return Err(ConfigError::InvalidValue(
                        "DUST_EPSILON".to_string(),
                        "must be >= 0".to_string(),
                    ));
                }
                parsed
            }
            None => default_epsilon(),
        };

        Ok(EngineConfig {
            discipline,
            stable_currencies,
            dust_epsilon,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            discipline: Discipline::default(),
            stable_currencies: Self::default_stables(),
            dust_epsilon: default_epsilon(),
        }
    }
}

fn default_epsilon() -> Decimal {
    Decimal::from_str_canonical("0.000000001").expect("literal epsilon parses")
}
