//! Common helper functions for candlestick pattern detection
//!
//! Range-relative thresholds and comparison functions shared across the detector modules.
//! Every rule looks at one bar and at most one prior bar, so thresholds are expressed as
//! fractions of a bar's own high-low range rather than trailing averages.

// ============================================================
// POLICY THRESHOLDS
// ============================================================

/// Body is short: body <= range * BODY_SHORT_RATIO
pub const BODY_SHORT_RATIO: f64 = 0.3;
/// Body is long: body >= range * BODY_LONG_RATIO
pub const BODY_LONG_RATIO: f64 = 0.6;
/// Shadow is very short: shadow <= range * SHADOW_SHORT_RATIO
pub const SHADOW_SHORT_RATIO: f64 = 0.1;
/// Shadow is long relative to the body: shadow >= body * SHADOW_BODY_FACTOR
pub const SHADOW_BODY_FACTOR: f64 = 2.0;
/// Near tolerance for trend-context checks, as a fraction of the prior bar's range
pub const NEAR_RATIO: f64 = 0.2;
/// How far into the prior body a two-bar reversal must close (0.5 = midpoint)
pub const PENETRATION: f64 = 0.5;

/// Score reported for a full match
pub const FULL_SCORE: i32 = 100;
/// Score reported for an engulfing that shares one body edge with the prior bar
pub const PARTIAL_SCORE: i32 = 80;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Check if body is short relative to the bar's range.
/// A zero-range bar has no shape and never qualifies.
#[inline]
pub fn is_body_short(body: f64, range: f64, ratio: f64) -> bool {
    range > 0.0 && body <= range * ratio
}

/// Check if body is long relative to the bar's range.
#[inline]
pub fn is_body_long(body: f64, range: f64, ratio: f64) -> bool {
    range > 0.0 && body >= range * ratio
}

/// Check if a shadow is at least `factor` times the body.
/// The shadow must be strictly positive so a flat bar cannot pass on `0 >= 0`.
#[inline]
pub fn is_shadow_long(shadow: f64, body: f64, factor: f64) -> bool {
    shadow > 0.0 && shadow >= body * factor
}

/// Check if a shadow is very short relative to the bar's range.
#[inline]
pub fn is_shadow_very_short(shadow: f64, range: f64, ratio: f64) -> bool {
    range > 0.0 && shadow <= range * ratio
}

/// Tolerance used by trend-context checks against the prior bar.
#[inline]
pub fn near_threshold(prev_range: f64, ratio: f64) -> f64 {
    prev_range * ratio
}

/// Check the shared hammer / hanging man silhouette:
/// short body, long lower shadow, (almost) no upper shadow.
#[inline]
pub fn is_hammer_shape<T: crate::OhlcExt>(
    bar: &T,
    body_short_ratio: f64,
    shadow_body_factor: f64,
    upper_shadow_ratio: f64,
) -> bool {
    let body = bar.body();
    let range = bar.range();
    is_body_short(body, range, body_short_ratio)
        && is_shadow_long(bar.lower_shadow(), body, shadow_body_factor)
        && is_shadow_very_short(bar.upper_shadow(), range, upper_shadow_ratio)
}
