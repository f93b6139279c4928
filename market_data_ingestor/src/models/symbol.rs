use serde::{Deserialize, Serialize};

/// Descriptive metadata the upstream publishes for a ticker.
///
/// Only `symbol` is guaranteed; everything else depends on what the
/// provider returns for that instrument.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub instrument_type: Option<String>,
    pub currency: Option<String>,
}

/// Upper-cases and trims a ticker, returning `None` when the result is not a
/// plausible symbol (empty, longer than 16 chars, or with characters outside
/// `A-Z 0-9 . - ^ =`).
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim().to_ascii_uppercase();
    let plausible = !s.is_empty()
        && s.len() <= 16
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    plausible.then_some(s)
}
