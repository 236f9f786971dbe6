//! Single-bar candlestick pattern detectors
//!
//! Patterns: Hammer, Hanging Man.
//!
//! Both share one silhouette (short body at the top of the range, long lower shadow,
//! little or no upper shadow) and differ only in the trend context read from the prior bar.

use std::collections::HashMap;

use super::helpers::{self, is_hammer_shape};
use crate::{
    params::{get_factor, get_flag, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    Direction, Ohlc, OhlcExt, Pattern, PatternDetector, PatternMatch, Ratio, Result,
    SignalError,
};

impl_with_defaults!(HammerDetector, HangingManDetector);

fn check_shadow_factor(pattern: Pattern, factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(SignalError::Configuration(format!(
            "{}: shadow_body_factor must be finite and > 0, got {factor}",
            pattern.as_str()
        )));
    }
    Ok(())
}

// ============================================================
// HAMMER FAMILY
// ============================================================

/// Hammer - bullish reversal silhouette
///
/// Fires on shape alone unless `require_downtrend` is set, in which case the body top
/// must sit at or below the prior bar's low (within `near_ratio` of the prior range).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HammerDetector {
    pub body_short_ratio: Ratio,
    pub shadow_body_factor: f64,
    pub upper_shadow_ratio: Ratio,
    pub near_ratio: Ratio,
    pub require_downtrend: bool,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            body_short_ratio: Ratio::new_const(helpers::BODY_SHORT_RATIO),
            shadow_body_factor: helpers::SHADOW_BODY_FACTOR,
            upper_shadow_ratio: Ratio::new_const(helpers::SHADOW_SHORT_RATIO),
            near_ratio: Ratio::new_const(helpers::NEAR_RATIO),
            require_downtrend: false,
        }
    }
}

impl PatternDetector for HammerDetector {
    fn pattern(&self) -> Pattern {
        Pattern::Hammer
    }

    fn min_bars(&self) -> usize {
        if self.require_downtrend {
            2
        } else {
            1
        }
    }

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;

        if !is_hammer_shape(
            bar,
            self.body_short_ratio.get(),
            self.shadow_body_factor,
            self.upper_shadow_ratio.get(),
        ) {
            return None;
        }

        if self.require_downtrend {
            let prev = bars.get(index.checked_sub(1)?)?;
            let body_high = bar.open().max(bar.close());
            let near = helpers::near_threshold(prev.range(), self.near_ratio.get());
            if body_high > prev.low() + near {
                return None;
            }
        }

        Some(PatternMatch {
            pattern: Pattern::Hammer,
            direction: Direction::Bullish,
            score: helpers::FULL_SCORE,
            start_index: index,
            end_index: index,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_shadow_factor(Pattern::Hammer, self.shadow_body_factor)
    }
}

/// Hanging Man - hammer silhouette printed after a rise
///
/// Uptrend context: the body bottom sits at or above the prior bar's high
/// (within `near_ratio` of the prior range). Needs a prior bar.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HangingManDetector {
    pub body_short_ratio: Ratio,
    pub shadow_body_factor: f64,
    pub upper_shadow_ratio: Ratio,
    pub near_ratio: Ratio,
}

impl Default for HangingManDetector {
    fn default() -> Self {
        Self {
            body_short_ratio: Ratio::new_const(helpers::BODY_SHORT_RATIO),
            shadow_body_factor: helpers::SHADOW_BODY_FACTOR,
            upper_shadow_ratio: Ratio::new_const(helpers::SHADOW_SHORT_RATIO),
            near_ratio: Ratio::new_const(helpers::NEAR_RATIO),
        }
    }
}

impl PatternDetector for HangingManDetector {
    fn pattern(&self) -> Pattern {
        Pattern::HangingMan
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let bar = bars.get(index)?;
        let prev = bars.get(index - 1)?;

        if !is_hammer_shape(
            bar,
            self.body_short_ratio.get(),
            self.shadow_body_factor,
            self.upper_shadow_ratio.get(),
        ) {
            return None;
        }

        let body_low = bar.open().min(bar.close());
        let near = helpers::near_threshold(prev.range(), self.near_ratio.get());
        if body_low < prev.high() - near {
            return None;
        }

        Some(PatternMatch {
            pattern: Pattern::HangingMan,
            direction: Direction::Bearish,
            score: -helpers::FULL_SCORE,
            start_index: index,
            end_index: index,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_shadow_factor(Pattern::HangingMan, self.shadow_body_factor)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static HAMMER_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "body_short_ratio",
        helpers::BODY_SHORT_RATIO,
        (0.1, 0.4, 0.05),
        "Maximum body as a fraction of range",
    ),
    ParamMeta::factor(
        "shadow_body_factor",
        helpers::SHADOW_BODY_FACTOR,
        (1.5, 3.0, 0.5),
        "Minimum lower shadow as a multiple of body",
    ),
    ParamMeta::ratio(
        "upper_shadow_ratio",
        helpers::SHADOW_SHORT_RATIO,
        (0.0, 0.2, 0.05),
        "Maximum upper shadow as a fraction of range",
    ),
    ParamMeta::ratio(
        "near_ratio",
        helpers::NEAR_RATIO,
        (0.0, 0.4, 0.1),
        "Trend-context tolerance as a fraction of the prior range",
    ),
    ParamMeta {
        name: "require_downtrend",
        param_type: ParamType::Flag,
        default: 0.0,
        range: (0.0, 1.0, 1.0),
        description: "Require the body to sit at or below the prior low",
    },
];

static HANGINGMAN_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "body_short_ratio",
        helpers::BODY_SHORT_RATIO,
        (0.1, 0.4, 0.05),
        "Maximum body as a fraction of range",
    ),
    ParamMeta::factor(
        "shadow_body_factor",
        helpers::SHADOW_BODY_FACTOR,
        (1.5, 3.0, 0.5),
        "Minimum lower shadow as a multiple of body",
    ),
    ParamMeta::ratio(
        "upper_shadow_ratio",
        helpers::SHADOW_SHORT_RATIO,
        (0.0, 0.2, 0.05),
        "Maximum upper shadow as a fraction of range",
    ),
    ParamMeta::ratio(
        "near_ratio",
        helpers::NEAR_RATIO,
        (0.0, 0.4, 0.1),
        "Trend-context tolerance as a fraction of the prior range",
    ),
];

impl ParameterizedDetector for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            body_short_ratio: get_ratio(params, "body_short_ratio", helpers::BODY_SHORT_RATIO)?,
            shadow_body_factor: get_factor(
                params,
                "shadow_body_factor",
                helpers::SHADOW_BODY_FACTOR,
            )?,
            upper_shadow_ratio: get_ratio(
                params,
                "upper_shadow_ratio",
                helpers::SHADOW_SHORT_RATIO,
            )?,
            near_ratio: get_ratio(params, "near_ratio", helpers::NEAR_RATIO)?,
            require_downtrend: get_flag(params, "require_downtrend", false),
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id() -> Pattern {
        Pattern::Hammer
    }
}

impl ParameterizedDetector for HangingManDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HANGINGMAN_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            body_short_ratio: get_ratio(params, "body_short_ratio", helpers::BODY_SHORT_RATIO)?,
            shadow_body_factor: get_factor(
                params,
                "shadow_body_factor",
                helpers::SHADOW_BODY_FACTOR,
            )?,
            upper_shadow_ratio: get_ratio(
                params,
                "upper_shadow_ratio",
                helpers::SHADOW_SHORT_RATIO,
            )?,
            near_ratio: get_ratio(params, "near_ratio", helpers::NEAR_RATIO)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id() -> Pattern {
        Pattern::HangingMan
    }
}
