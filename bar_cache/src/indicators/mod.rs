//! Indicator evaluator.
//!
//! [`compute`] turns a bar sequence into an [`IndicatorRow`] per bar. The
//! formulas come from the `ta` crate; this module only drives them over the
//! closes and blanks out the warm-up positions, where a window is not yet fully
//! populated. A blanked position is `None`, never zero.
//!
//! Names coming from the CLI are parsed once into [`Indicator`] at the boundary;
//! unknown names fail there with [`UnknownIndicator`].

pub mod signals;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use market_data_ingestor::models::bar::Bar;
use serde::Serialize;
use ta::{
    Next,
    errors::TaError,
    indicators::{
        BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
        RelativeStrengthIndex, SimpleMovingAverage,
    },
};
use thiserror::Error;
use tracing::error;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BB_PERIOD: usize = 20;
const BB_STDDEV: f64 = 2.0;

/// A supported indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Sma20,
    Sma50,
    Sma100,
    Sma200,
    Ema20,
    Rsi14,
    Rsi21,
    /// 12/26/9; fills `macd` and `macd_signal`.
    Macd,
    /// 20 bars, 2 standard deviations; fills the three `bb_*` fields.
    Bollinger,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown indicator: {0:?}")]
pub struct UnknownIndicator(pub String);

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Indicator::Sma20,
        Indicator::Sma50,
        Indicator::Sma100,
        Indicator::Sma200,
        Indicator::Ema20,
        Indicator::Rsi14,
        Indicator::Rsi21,
        Indicator::Macd,
        Indicator::Bollinger,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Indicator::Sma20 => "SMA_20",
            Indicator::Sma50 => "SMA_50",
            Indicator::Sma100 => "SMA_100",
            Indicator::Sma200 => "SMA_200",
            Indicator::Ema20 => "EMA_20",
            Indicator::Rsi14 => "RSI_14",
            Indicator::Rsi21 => "RSI_21",
            Indicator::Macd => "MACD",
            Indicator::Bollinger => "BB",
        }
    }

    /// Index of the first bar with a value.
    pub const fn first_valid_index(self) -> usize {
        match self {
            Indicator::Sma20 | Indicator::Ema20 => 19,
            Indicator::Sma50 => 49,
            Indicator::Sma100 => 99,
            Indicator::Sma200 => 199,
            Indicator::Rsi14 => 14,
            Indicator::Rsi21 => 21,
            Indicator::Macd => MACD_SLOW - 1,
            Indicator::Bollinger => BB_PERIOD - 1,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Indicator {
    type Err = UnknownIndicator;

    /// Case-insensitive; `_`, `-` and spaces are interchangeable or may be omitted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let found = match key.as_str() {
            "BB" | "BOLLINGER" | "BBANDS" | "BOLLINGERBANDS" => Some(Indicator::Bollinger),
            _ => Indicator::ALL
                .into_iter()
                .find(|i| i.name().replace('_', "") == key),
        };
        found.ok_or_else(|| UnknownIndicator(s.trim().to_string()))
    }
}

/// Derived values for one bar. Every field is optional: absent when the
/// indicator was not requested or the window is not yet full.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_100: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub rsi_21: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorRow {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            sma_20: None,
            sma_50: None,
            sma_100: None,
            sma_200: None,
            ema_20: None,
            rsi_14: None,
            rsi_21: None,
            macd: None,
            macd_signal: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
        }
    }

    /// True when no field is populated.
    pub fn is_blank(&self) -> bool {
        *self == Self::empty(self.timestamp)
    }
}

/// Computes the requested indicators over `bars` (oldest first).
///
/// The output has the same length and timestamps as `bars`. Duplicate
/// entries in `requested` are harmless.
pub fn compute(bars: &[Bar], requested: &[Indicator]) -> Vec<IndicatorRow> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut rows: Vec<IndicatorRow> = bars.iter().map(|b| IndicatorRow::empty(b.timestamp)).collect();

    for &indicator in requested {
        let first = indicator.first_valid_index();
        match indicator {
            Indicator::Sma20 | Indicator::Sma50 | Indicator::Sma100 | Indicator::Sma200 => {
                let period = first + 1;
                let col = drive(indicator, SimpleMovingAverage::new(period), &closes);
                let col = masked(col.as_deref(), first, |v| *v);
                for (row, v) in rows.iter_mut().zip(col) {
                    match indicator {
                        Indicator::Sma20 => row.sma_20 = v,
                        Indicator::Sma50 => row.sma_50 = v,
                        Indicator::Sma100 => row.sma_100 = v,
                        _ => row.sma_200 = v,
                    }
                }
            }
            Indicator::Ema20 => {
                let col = drive(indicator, ExponentialMovingAverage::new(20), &closes);
                for (row, v) in rows.iter_mut().zip(masked(col.as_deref(), first, |v| *v)) {
                    row.ema_20 = v;
                }
            }
            Indicator::Rsi14 | Indicator::Rsi21 => {
                let col = drive(indicator, RelativeStrengthIndex::new(first), &closes);
                for (row, v) in rows.iter_mut().zip(masked(col.as_deref(), first, |v| *v)) {
                    if indicator == Indicator::Rsi14 {
                        row.rsi_14 = v;
                    } else {
                        row.rsi_21 = v;
                    }
                }
            }
            Indicator::Macd => {
                let out = drive(
                    indicator,
                    MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL),
                    &closes,
                );
                let line = masked(out.as_deref(), first, |o| o.macd);
                let signal = masked(out.as_deref(), first + MACD_SIGNAL - 1, |o| o.signal);
                for ((row, m), s) in rows.iter_mut().zip(line).zip(signal) {
                    row.macd = m;
                    row.macd_signal = s;
                }
            }
            Indicator::Bollinger => {
                let out = drive(indicator, BollingerBands::new(BB_PERIOD, BB_STDDEV), &closes);
                let upper = masked(out.as_deref(), first, |o| o.upper);
                let middle = masked(out.as_deref(), first, |o| o.average);
                let lower = masked(out.as_deref(), first, |o| o.lower);
                for (((row, u), m), l) in rows.iter_mut().zip(upper).zip(middle).zip(lower) {
                    row.bb_upper = u;
                    row.bb_middle = m;
                    row.bb_lower = l;
                }
            }
        }
    }

    rows
}

/// Feeds every close through `ind`. `None` if the indicator could not be built.
fn drive<T: Next<f64>>(
    indicator: Indicator,
    ind: Result<T, TaError>,
    closes: &[f64],
) -> Option<Vec<T::Output>> {
    match ind {
        Ok(mut ind) => Some(closes.iter().map(|c| ind.next(*c)).collect()),
        Err(e) => {
            error!(%indicator, error = ?e, "indicator construction failed");
            None
        }
    }
}

fn masked<O>(
    outputs: Option<&[O]>,
    first_valid: usize,
    pick: impl Fn(&O) -> f64,
) -> Vec<Option<f64>> {
    let Some(outputs) = outputs else {
        return Vec::new();
    };
    outputs
        .iter()
        .enumerate()
        .map(|(i, o)| {
            let v = pick(o);
            (i >= first_valid && v.is_finite()).then_some(v)
        })
        .collect()
}
