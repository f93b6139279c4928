//! Human-facing readings of the latest indicator values.
//!
//! [`summary`] describes where the last bar sits; [`signals`] compares the last
//! two bars for crossovers. Both only report on indicators that have at least
//! one value in `rows`.

use std::fmt;

use market_data_ingestor::models::bar::Bar;
use serde::Serialize;

use crate::indicators::IndicatorRow;

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn of(rsi: f64) -> Self {
        if rsi > RSI_OVERBOUGHT {
            RsiZone::Overbought
        } else if rsi < RSI_OVERSOLD {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }
}

impl fmt::Display for RsiZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RsiZone::Overbought => "Overbought",
            RsiZone::Oversold => "Oversold",
            RsiZone::Neutral => "Neutral",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    Within,
}

impl BandPosition {
    pub fn of(price: f64, upper: f64, lower: f64) -> Self {
        if price > upper {
            BandPosition::AboveUpper
        } else if price < lower {
            BandPosition::BelowLower
        } else {
            BandPosition::Within
        }
    }
}

impl fmt::Display for BandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BandPosition::AboveUpper => "Above Upper Band",
            BandPosition::BelowLower => "Below Lower Band",
            BandPosition::Within => "Within Bands",
        })
    }
}

/// Latest indicator readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSummary {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_100: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_position: Option<BandPosition>,
}

/// Summarises the last row. `None` when there is nothing to summarise.
pub fn summary(bars: &[Bar], rows: &[IndicatorRow]) -> Option<IndicatorSummary> {
    let latest = rows.last()?;
    let price = bars.last()?.close;

    let mut s = IndicatorSummary {
        sma_20: latest.sma_20,
        sma_50: latest.sma_50,
        sma_100: latest.sma_100,
        sma_200: latest.sma_200,
        ema_20: latest.ema_20,
        rsi_14: latest.rsi_14,
        rsi_zone: latest.rsi_14.map(RsiZone::of),
        ..Default::default()
    };

    if let Some(macd) = latest.macd {
        let signal = latest.macd_signal.unwrap_or(0.0);
        s.macd = Some(macd);
        s.macd_signal = Some(signal);
        s.macd_histogram = Some(macd - signal);
    }

    if let Some(upper) = latest.bb_upper {
        let lower = latest.bb_lower.unwrap_or(0.0);
        s.bb_upper = Some(upper);
        s.bb_middle = Some(latest.bb_middle.unwrap_or(0.0));
        s.bb_lower = Some(lower);
        s.bb_position = Some(BandPosition::of(price, upper, lower));
    }

    Some(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// Crossover readings. A field is `None` when its indicator has no values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradingSignals {
    pub rsi: Option<Signal>,
    pub macd: Option<Signal>,
    pub moving_average: Option<Trend>,
}

impl TradingSignals {
    pub fn rsi_label(&self) -> Option<&'static str> {
        self.rsi.map(|s| match s {
            Signal::Buy => "Buy Signal (Oversold)",
            Signal::Sell => "Sell Signal (Overbought)",
            Signal::Hold => "Hold",
        })
    }

    pub fn macd_label(&self) -> Option<&'static str> {
        self.macd.map(|s| match s {
            Signal::Buy => "Buy Signal (MACD Cross Above)",
            Signal::Sell => "Sell Signal (MACD Cross Below)",
            Signal::Hold => "Hold",
        })
    }

    pub fn moving_average_label(&self) -> Option<&'static str> {
        self.moving_average.map(|t| match t {
            Trend::Bullish => "Bullish (Price Above MAs)",
            Trend::Bearish => "Bearish (Price Below MAs)",
            Trend::Neutral => "Neutral",
        })
    }
}

/// Compares the last two rows. `None` with fewer than two rows or bars.
///
/// Missing values fall back to neutral readings: RSI 50, MACD 0, and the
/// current price for moving averages.
pub fn signals(bars: &[Bar], rows: &[IndicatorRow]) -> Option<TradingSignals> {
    let [.., prev, latest] = rows else {
        return None;
    };
    let price = bars.last()?.close;
    if bars.len() < 2 {
        return None;
    }

    let has = |f: fn(&IndicatorRow) -> Option<f64>| rows.iter().any(|r| f(r).is_some());
    let mut out = TradingSignals::default();

    if has(|r| r.rsi_14) {
        let now = latest.rsi_14.unwrap_or(50.0);
        let before = prev.rsi_14.unwrap_or(50.0);
        out.rsi = Some(if now < RSI_OVERSOLD && before >= RSI_OVERSOLD {
            Signal::Buy
        } else if now > RSI_OVERBOUGHT && before <= RSI_OVERBOUGHT {
            Signal::Sell
        } else {
            Signal::Hold
        });
    }

    if has(|r| r.macd) {
        let (m, s) = (latest.macd.unwrap_or(0.0), latest.macd_signal.unwrap_or(0.0));
        let (pm, ps) = (prev.macd.unwrap_or(0.0), prev.macd_signal.unwrap_or(0.0));
        out.macd = Some(if m > s && pm <= ps {
            Signal::Buy
        } else if m < s && pm >= ps {
            Signal::Sell
        } else {
            Signal::Hold
        });
    }

    if has(|r| r.sma_20) && has(|r| r.ema_20) {
        let sma = latest.sma_20.unwrap_or(price);
        let ema = latest.ema_20.unwrap_or(price);
        out.moving_average = Some(if price > sma && price > ema {
            Trend::Bullish
        } else if price < sma && price < ema {
            Trend::Bearish
        } else {
            Trend::Neutral
        });
    }

    Some(out)
}
