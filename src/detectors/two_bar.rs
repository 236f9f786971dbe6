//! Two-bar candlestick pattern detectors
//!
//! Patterns: Engulfing, Dark Cloud Cover, Piercing.
//!
//! Every rule compares bar `i` against bar `i - 1` only; bar 0 never matches.

use std::collections::HashMap;

use super::helpers::{self, is_body_long};
use crate::{
    params::{get_flag, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    Direction, Ohlc, OhlcExt, Pattern, PatternDetector, PatternMatch, Ratio, Result,
};

impl_with_defaults!(EngulfingDetector, DarkCloudCoverDetector, PiercingDetector);

/// Which prior-bar level the opening gap of a two-bar reversal is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GapRule {
    /// Open beyond the prior bar's high (Dark Cloud) or low (Piercing).
    #[default]
    Extreme,
    /// Open beyond the prior bar's close.
    Body,
}

impl GapRule {
    fn from_flag(extreme: bool) -> Self {
        if extreme {
            GapRule::Extreme
        } else {
            GapRule::Body
        }
    }
}

// ============================================================
// ENGULFING
// ============================================================

/// Engulfing Pattern (bullish and bearish)
///
/// Bar `i` must be the opposite color of bar `i - 1` and its body must cover the prior
/// body. One edge may coincide with the prior body; that weaker form scores 80.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngulfingDetector {
    /// Reject matches where either body edge coincides with the prior body.
    pub strict: bool,
}

impl PatternDetector for EngulfingDetector {
    fn pattern(&self) -> Pattern {
        Pattern::Engulfing
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let direction = if curr.is_bullish() && prev.is_bearish() {
            Direction::Bullish
        } else if curr.is_bearish() && prev.is_bullish() {
            Direction::Bearish
        } else {
            return None;
        };

        let (curr_low, curr_high) = body_bounds(curr);
        let (prev_low, prev_high) = body_bounds(prev);

        // Cover both edges, with at least one strictly beyond the prior body
        let covers = curr_low <= prev_low && curr_high >= prev_high;
        let strict_low = curr_low < prev_low;
        let strict_high = curr_high > prev_high;
        if !covers || !(strict_low || strict_high) {
            return None;
        }

        let magnitude = if strict_low && strict_high {
            helpers::FULL_SCORE
        } else if self.strict {
            return None;
        } else {
            helpers::PARTIAL_SCORE
        };

        let score = match direction {
            Direction::Bullish => magnitude,
            _ => -magnitude,
        };

        Some(PatternMatch {
            pattern: Pattern::Engulfing,
            direction,
            score,
            start_index: index - 1,
            end_index: index,
        })
    }
}

#[inline]
fn body_bounds<T: Ohlc>(bar: &T) -> (f64, f64) {
    (bar.open().min(bar.close()), bar.open().max(bar.close()))
}

// ============================================================
// PIERCING / DARK CLOUD
// ============================================================

/// Piercing Pattern
///
/// Long bearish bar, then a bullish bar that opens below the prior low (or close, per
/// [`GapRule`]) and closes above the prior body's penetration level but below its open.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PiercingDetector {
    pub penetration: Ratio,
    pub body_long_ratio: Ratio,
    pub gap_rule: GapRule,
}

impl Default for PiercingDetector {
    fn default() -> Self {
        Self {
            penetration: Ratio::new_const(helpers::PENETRATION),
            body_long_ratio: Ratio::new_const(helpers::BODY_LONG_RATIO),
            gap_rule: GapRule::Extreme,
        }
    }
}

impl PatternDetector for PiercingDetector {
    fn pattern(&self) -> Pattern {
        Pattern::Piercing
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        if !prev.is_bearish() || !curr.is_bullish() {
            return None;
        }

        let prev_body = prev.body();
        if !is_body_long(prev_body, prev.range(), self.body_long_ratio.get()) {
            return None;
        }

        let gap_level = match self.gap_rule {
            GapRule::Extreme => prev.low(),
            GapRule::Body => prev.close(),
        };
        if curr.open() >= gap_level {
            return None;
        }

        // Close stays inside the prior body
        if curr.close() >= prev.open() {
            return None;
        }

        if curr.close() <= prev.close() + prev_body * self.penetration.get() {
            return None;
        }

        Some(PatternMatch {
            pattern: Pattern::Piercing,
            direction: Direction::Bullish,
            score: helpers::FULL_SCORE,
            start_index: index - 1,
            end_index: index,
        })
    }
}

/// Dark Cloud Cover
///
/// Long bullish bar, then a bearish bar that opens above the prior high (or close, per
/// [`GapRule`]) and closes below the prior body's penetration level but above its open.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DarkCloudCoverDetector {
    pub penetration: Ratio,
    pub body_long_ratio: Ratio,
    pub gap_rule: GapRule,
}

impl Default for DarkCloudCoverDetector {
    fn default() -> Self {
        Self {
            penetration: Ratio::new_const(helpers::PENETRATION),
            body_long_ratio: Ratio::new_const(helpers::BODY_LONG_RATIO),
            gap_rule: GapRule::Extreme,
        }
    }
}

impl PatternDetector for DarkCloudCoverDetector {
    fn pattern(&self) -> Pattern {
        Pattern::DarkCloudCover
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        if !prev.is_bullish() || !curr.is_bearish() {
            return None;
        }

        let prev_body = prev.body();
        if !is_body_long(prev_body, prev.range(), self.body_long_ratio.get()) {
            return None;
        }

        let gap_level = match self.gap_rule {
            GapRule::Extreme => prev.high(),
            GapRule::Body => prev.close(),
        };
        if curr.open() <= gap_level {
            return None;
        }

        // Close stays inside the prior body
        if curr.close() <= prev.open() {
            return None;
        }

        if curr.close() >= prev.close() - prev_body * self.penetration.get() {
            return None;
        }

        Some(PatternMatch {
            pattern: Pattern::DarkCloudCover,
            direction: Direction::Bearish,
            score: -helpers::FULL_SCORE,
            start_index: index - 1,
            end_index: index,
        })
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static ENGULFING_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "strict",
    param_type: ParamType::Flag,
    default: 0.0,
    range: (0.0, 1.0, 1.0),
    description: "Require both body edges strictly beyond the prior body",
}];

static PIERCE_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "penetration",
        helpers::PENETRATION,
        (0.3, 0.7, 0.1),
        "Fraction of the prior body the close must recover",
    ),
    ParamMeta::ratio(
        "body_long_ratio",
        helpers::BODY_LONG_RATIO,
        (0.4, 0.8, 0.1),
        "Minimum prior body as a fraction of its range",
    ),
    ParamMeta {
        name: "gap_from_extreme",
        param_type: ParamType::Flag,
        default: 1.0,
        range: (0.0, 1.0, 1.0),
        description: "Measure the opening gap from the prior high/low instead of its close",
    },
];

impl ParameterizedDetector for EngulfingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ENGULFING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            strict: get_flag(params, "strict", false),
        })
    }

    fn pattern_id() -> Pattern {
        Pattern::Engulfing
    }
}

impl ParameterizedDetector for PiercingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        PIERCE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            penetration: get_ratio(params, "penetration", helpers::PENETRATION)?,
            body_long_ratio: get_ratio(params, "body_long_ratio", helpers::BODY_LONG_RATIO)?,
            gap_rule: GapRule::from_flag(get_flag(params, "gap_from_extreme", true)),
        })
    }

    fn pattern_id() -> Pattern {
        Pattern::Piercing
    }
}

impl ParameterizedDetector for DarkCloudCoverDetector {
    fn param_meta() -> &'static [ParamMeta] {
        PIERCE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            penetration: get_ratio(params, "penetration", helpers::PENETRATION)?,
            body_long_ratio: get_ratio(params, "body_long_ratio", helpers::BODY_LONG_RATIO)?,
            gap_rule: GapRule::from_flag(get_flag(params, "gap_from_extreme", true)),
        })
    }

    fn pattern_id() -> Pattern {
        Pattern::DarkCloudCover
    }
}
