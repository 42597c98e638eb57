//! Single-candle formation detection and a short directional-run descriptor.

use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

const SHADOW_RATIO_MIN: Decimal = dec!(0.6);
const BODY_RATIO_MAX: Decimal = dec!(0.3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandlePattern {
    Hammer,
    ShootingStar,
}

impl fmt::Display for CandlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandlePattern::Hammer => write!(f, "Hammer"),
            CandlePattern::ShootingStar => write!(f, "Shooting Star"),
        }
    }
}

/// Shape of one candle relative to its full range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleShape {
    pub body_ratio: Decimal,
    pub upper_shadow_ratio: Decimal,
    pub lower_shadow_ratio: Decimal,
}

impl CandleShape {
    /// `None` for a zero-range candle, where no ratio is defined.
    pub fn of(candle: &Candle) -> Option<Self> {
        let range = candle.range();
        if range <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            body_ratio: candle.body() / range,
            upper_shadow_ratio: candle.upper_shadow() / range,
            lower_shadow_ratio: candle.lower_shadow() / range,
        })
    }
}

/// Direction of the most recent closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionalRun {
    Rising(usize),
    Falling(usize),
    Mixed,
}

impl fmt::Display for DirectionalRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionalRun::Rising(n) => write!(f, "{} consecutive higher closes", n),
            DirectionalRun::Falling(n) => write!(f, "{} consecutive lower closes", n),
            DirectionalRun::Mixed => write!(f, "no clear direction"),
        }
    }
}

pub struct PatternRecognizer;

impl PatternRecognizer {
    /// Hammer is checked before Shooting Star.
    pub fn classify(candle: &Candle) -> Option<CandlePattern> {
        let shape = CandleShape::of(candle)?;

        if shape.lower_shadow_ratio > SHADOW_RATIO_MIN && shape.body_ratio < BODY_RATIO_MAX {
            Some(CandlePattern::Hammer)
        } else if shape.upper_shadow_ratio > SHADOW_RATIO_MIN && shape.body_ratio < BODY_RATIO_MAX
        {
            Some(CandlePattern::ShootingStar)
        } else {
            None
        }
    }

    /// Length and direction of the run ending at the latest of the last
    /// `lookback` candles. Runs shorter than two steps are `Mixed`.
    pub fn directional_run(candles: &[Candle], lookback: usize) -> DirectionalRun {
        let window = &candles[candles.len().saturating_sub(lookback)..];
        let steps: Vec<Decimal> = window.windows(2).map(|w| w[1].close - w[0].close).collect();

        let rising = steps.iter().rev().take_while(|d| **d > Decimal::ZERO).count();
        let falling = steps.iter().rev().take_while(|d| **d < Decimal::ZERO).count();

        if rising >= 2 {
            DirectionalRun::Rising(rising)
        } else if falling >= 2 {
            DirectionalRun::Falling(falling)
        } else {
            DirectionalRun::Mixed
        }
    }
}
