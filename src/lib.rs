//! # cdlfuse - Candlestick signal fusion
//!
//! Turns an ordered sequence of daily OHLC bars into buy/sell flags by combining a
//! fast/slow EMA trend filter, prior-high breakouts and five reversal candlestick patterns.
//!
//! ## Quick Start
//!
//! ```rust
//! use cdlfuse::prelude::*;
//!
//! let bars = vec![
//!     Bar::new(1, 10.0, 11.0, 9.0, 10.5),
//!     Bar::new(2, 10.5, 12.0, 10.4, 11.8),
//! ];
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let frame = engine.run(&bars).unwrap();
//!
//! assert_eq!(frame.len(), 2);
//! assert!(frame.columns().breakout[1]);
//! ```
//!
//! Every call is a pure function of its input: columns are freshly allocated, nothing is
//! cached between runs and the input bars are never modified.

pub mod detectors;
pub mod params;

use std::{borrow::Cow, collections::HashMap};

use params::{get_span, EMA_PARAMS};

use tracing::{debug, warn};

pub mod prelude {
    pub use crate::{
        // Stages
        breakouts,
        candle_directions,
        // Detectors
        detectors::*,
        fuse,
        // Parameters
        params::{get_factor, get_flag, get_ratio, get_span, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        run_parallel,
        validate_bars,
        // Types
        Bar,
        BuiltinDetector,
        CandleDirection,
        Column,
        Direction,
        // Engine
        EngineBuilder,
        EngineConfig,
        MovingAverage,
        // Core traits
        Ohlc,
        OhlcExt,
        Pattern,
        PatternDetector,
        PatternMatch,
        PatternRecognizer,
        PatternScores,
        Ratio,
        Result,
        RunError,
        RunResult,
        SeriesRef,
        SignalColumns,
        SignalEngine,
        // Errors
        SignalError,
        SignalFrame,
        SignalRow,
        Signals,
        Span,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised while configuring the engine or validating its input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    /// A bar with impossible or non-finite prices.
    #[error("Invalid bar at index {index}: {reason}")]
    DataIntegrity { index: usize, reason: &'static str },

    /// The ordering key did not strictly increase.
    #[error("Bar at index {index} is out of order: key {current} does not follow {previous}")]
    Ordering {
        index: usize,
        previous: i64,
        current: i64,
    },

    /// Rejected engine or detector settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Derived series handed to fusion are not aligned with each other.
    #[error("Column {column} has {got} rows, expected {expected}")]
    ShapeMismatch {
        column: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

impl SignalError {
    /// Index of the offending bar for input-validation errors
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            SignalError::DataIntegrity { index, .. } | SignalError::Ordering { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// EMA span (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span(usize);

impl Span {
    /// Create a new Span, rejecting zero with a configuration error
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::Configuration(
                "EMA span must be > 0".to_string(),
            ));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Span {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Span {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Span::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core bar data trait
pub trait Ohlc {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    /// Ordering key. Bars without one are ordered by position.
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for bar data
pub trait OhlcExt: Ohlc {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Bullish iff close > open; an unchanged bar counts as bearish
    #[inline]
    fn direction(&self) -> CandleDirection {
        if self.is_bullish() {
            CandleDirection::Bullish
        } else {
            CandleDirection::Bearish
        }
    }

    /// Validate price geometry. The reported index is 0; callers remap it.
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(SignalError::DataIntegrity {
                index: 0,
                reason: "NaN or infinite price",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(SignalError::DataIntegrity {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.high() < self.low() {
            return Err(SignalError::DataIntegrity {
                index: 0,
                reason: "high < low",
            });
        }
        if self.high() < self.open().max(self.close()) {
            return Err(SignalError::DataIntegrity {
                index: 0,
                reason: "high below open/close",
            });
        }
        if self.low() > self.open().min(self.close()) {
            return Err(SignalError::DataIntegrity {
                index: 0,
                reason: "low above open/close",
            });
        }
        Ok(())
    }
}

impl<T: Ohlc + ?Sized> OhlcExt for T {}

/// Plain daily bar keyed by a timestamp (e.g. seconds or days since epoch)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

impl Ohlc for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Validate the whole sequence up front: geometry of every bar, then strict key order.
///
/// Keyless bars are skipped by the ordering check; each key must exceed the last key seen.
/// Returns the first offending bar. An empty sequence is valid.
pub fn validate_bars<T: Ohlc>(bars: &[T]) -> Result<()> {
    let mut previous: Option<i64> = None;
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            SignalError::DataIntegrity { reason, .. } => {
                SignalError::DataIntegrity { index: i, reason }
            }
            other => other,
        })?;

        let current = bar.timestamp();
        if let (Some(prev), Some(curr)) = (previous, current) {
            if curr <= prev {
                return Err(SignalError::Ordering {
                    index: i,
                    previous: prev,
                    current: curr,
                });
            }
        }
        if current.is_some() {
            previous = current;
        }
    }
    Ok(())
}

// ============================================================
// PATTERN IDENTITY
// ============================================================

/// The reversal patterns scored by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    Hammer,
    HangingMan,
    Engulfing,
    DarkCloudCover,
    Piercing,
}

impl Pattern {
    pub const ALL: [Pattern; 5] = [
        Pattern::Hammer,
        Pattern::HangingMan,
        Pattern::Engulfing,
        Pattern::DarkCloudCover,
        Pattern::Piercing,
    ];

    /// Returns the string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Hammer => "CDL_HAMMER",
            Pattern::HangingMan => "CDL_HANGINGMAN",
            Pattern::Engulfing => "CDL_ENGULFING",
            Pattern::DarkCloudCover => "CDL_DARKCLOUDCOVER",
            Pattern::Piercing => "CDL_PIERCING",
        }
    }

    /// Name of the score column in a [`SignalFrame`]
    pub fn column_name(&self) -> &'static str {
        match self {
            Pattern::Hammer => "hammer",
            Pattern::HangingMan => "hanging_man",
            Pattern::Engulfing => "engulfing",
            Pattern::DarkCloudCover => "dark_cloud_cover",
            Pattern::Piercing => "piercing",
        }
    }

    /// Returns the typical/expected direction of this pattern.
    ///
    /// `None` means the pattern is bidirectional and the score sign carries the direction.
    pub fn typical_direction(&self) -> Option<Direction> {
        match self {
            Pattern::Hammer | Pattern::Piercing => Some(Direction::Bullish),
            Pattern::HangingMan | Pattern::DarkCloudCover => Some(Direction::Bearish),
            Pattern::Engulfing => None,
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.typical_direction().is_none()
    }

    /// Bars the default rule needs up to and including the scored bar
    pub fn min_bars(&self) -> usize {
        match self {
            Pattern::Hammer => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Color of a single candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CandleDirection {
    Bullish,
    Bearish,
}

/// Result of pattern detection - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub pattern: Pattern,
    pub direction: Direction,
    /// Signed score in -100..=100; the sign carries the direction
    pub score: i32,
    pub start_index: usize,
    pub end_index: usize,
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Pattern detector - one independent geometric rule
pub trait PatternDetector: Send + Sync {
    fn pattern(&self) -> Pattern;

    /// Bars needed up to and including the scored bar
    fn min_bars(&self) -> usize;

    fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: Ohlc>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, index)),*
                }
            }

            #[inline]
            pub fn pattern(&self) -> Pattern {
                match self {
                    $(Self::$variant(d) => PatternDetector::pattern(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    Hammer(HammerDetector),
    HangingMan(HangingManDetector),
    Engulfing(EngulfingDetector),
    DarkCloudCover(DarkCloudCoverDetector),
    Piercing(PiercingDetector),
}

// ============================================================
// MOVING AVERAGE
// ============================================================

/// Exponential moving average with alpha = 2 / (span + 1)
///
/// Seeded with the first value (`ema[0] = values[0]`), never with a simple average,
/// so early values lean towards the first close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    span: Span,
}

impl MovingAverage {
    /// Fails with a configuration error for span 0
    pub fn new(span: usize) -> Result<Self> {
        Ok(Self {
            span: Span::new(span)?,
        })
    }

    pub fn from_span(span: Span) -> Self {
        Self { span }
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.span
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        2.0 / (self.span.get() as f64 + 1.0)
    }

    /// Same length as the input; empty in, empty out.
    pub fn compute(&self, values: &[f64]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut result = Vec::with_capacity(values.len());

        let mut iter = values.iter();
        if let Some(&first) = iter.next() {
            let mut prev = first;
            result.push(prev);
            for &v in iter {
                prev = alpha * v + (1.0 - alpha) * prev;
                result.push(prev);
            }
        }

        result
    }

    pub fn compute_closes<T: Ohlc>(&self, bars: &[T]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        self.compute(&closes)
    }
}

// ============================================================
// BREAKOUT / CANDLE DIRECTION
// ============================================================

/// `breakout[i]` iff bar `i` trades and closes above the prior bar's high.
/// Bar 0 has no prior bar and is never a breakout.
pub fn breakouts<T: Ohlc>(bars: &[T]) -> Vec<bool> {
    let mut result = Vec::with_capacity(bars.len());
    if !bars.is_empty() {
        result.push(false);
    }
    result.extend(bars.windows(2).map(|pair| {
        let prev_high = pair[0].high();
        pair[1].high() > prev_high && pair[1].close() > prev_high
    }));
    result
}

pub fn candle_directions<T: Ohlc>(bars: &[T]) -> Vec<CandleDirection> {
    bars.iter().map(|b| b.direction()).collect()
}

// ============================================================
// PATTERN RECOGNIZER
// ============================================================

/// Per-bar signed scores for each pattern; 0 means no match
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PatternScores {
    pub hammer: Vec<i32>,
    pub hanging_man: Vec<i32>,
    pub engulfing: Vec<i32>,
    pub dark_cloud_cover: Vec<i32>,
    pub piercing: Vec<i32>,
}

impl PatternScores {
    fn zeroed(len: usize) -> Self {
        Self {
            hammer: vec![0; len],
            hanging_man: vec![0; len],
            engulfing: vec![0; len],
            dark_cloud_cover: vec![0; len],
            piercing: vec![0; len],
        }
    }

    pub fn get(&self, pattern: Pattern) -> &[i32] {
        match pattern {
            Pattern::Hammer => &self.hammer,
            Pattern::HangingMan => &self.hanging_man,
            Pattern::Engulfing => &self.engulfing,
            Pattern::DarkCloudCover => &self.dark_cloud_cover,
            Pattern::Piercing => &self.piercing,
        }
    }

    fn get_mut(&mut self, pattern: Pattern) -> &mut Vec<i32> {
        match pattern {
            Pattern::Hammer => &mut self.hammer,
            Pattern::HangingMan => &mut self.hanging_man,
            Pattern::Engulfing => &mut self.engulfing,
            Pattern::DarkCloudCover => &mut self.dark_cloud_cover,
            Pattern::Piercing => &mut self.piercing,
        }
    }

    /// Score of `pattern` at `index`, 0 when out of bounds
    pub fn at(&self, pattern: Pattern, index: usize) -> i32 {
        self.get(pattern).get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.hammer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hammer.is_empty()
    }
}

/// The five pattern detectors with their thresholds
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PatternRecognizer {
    pub hammer: HammerDetector,
    pub hanging_man: HangingManDetector,
    pub engulfing: EngulfingDetector,
    pub dark_cloud_cover: DarkCloudCoverDetector,
    pub piercing: PiercingDetector,
}

impl PatternRecognizer {
    pub fn detectors(&self) -> [BuiltinDetector; 5] {
        [
            BuiltinDetector::Hammer(self.hammer),
            BuiltinDetector::HangingMan(self.hanging_man),
            BuiltinDetector::Engulfing(self.engulfing),
            BuiltinDetector::DarkCloudCover(self.dark_cloud_cover),
            BuiltinDetector::Piercing(self.piercing),
        ]
    }

    /// Score every bar with every detector. Rules are independent, so a bar may carry
    /// several non-zero scores.
    pub fn scores<T: Ohlc>(&self, bars: &[T]) -> PatternScores {
        let mut scores = PatternScores::zeroed(bars.len());
        for detector in self.detectors() {
            let min_bars = detector.min_bars();
            let column = scores.get_mut(detector.pattern());
            for (index, slot) in column.iter_mut().enumerate() {
                if index + 1 < min_bars {
                    continue;
                }
                if let Some(m) = detector.detect(bars, index) {
                    *slot = m.score;
                }
            }
        }
        scores
    }

    /// Flat list of all matches, ordered by bar index then pattern
    pub fn scan<T: Ohlc>(&self, bars: &[T]) -> Vec<PatternMatch> {
        let detectors = self.detectors();
        let mut results = Vec::new();
        for index in 0..bars.len() {
            for detector in &detectors {
                if index + 1 >= detector.min_bars() {
                    if let Some(m) = detector.detect(bars, index) {
                        results.push(m);
                    }
                }
            }
        }
        results
    }

    pub fn validate_config(&self) -> Result<()> {
        for d in self.detectors() {
            d.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// SIGNAL FUSION
// ============================================================

/// Final per-bar flags. A bar may be both buy and sell, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signals {
    pub buy: Vec<bool>,
    pub sell: Vec<bool>,
}

/// Combine trend, breakout and pattern evidence:
///
/// - `buy  = (fast > slow && breakout) || hammer > 0 || piercing > 0`
/// - `sell = (fast < slow && breakout) || hanging_man < 0 || dark_cloud_cover < 0 || engulfing < 0`
///
/// Engulfing only ever feeds `sell`; a bullish engulfing score does not raise `buy`.
pub fn fuse(
    ema_fast: &[f64],
    ema_slow: &[f64],
    breakout: &[bool],
    patterns: &PatternScores,
) -> Result<Signals> {
    let len = ema_fast.len();
    let lengths = [
        ("ema_slow", ema_slow.len()),
        ("breakout", breakout.len()),
        ("hammer", patterns.hammer.len()),
        ("hanging_man", patterns.hanging_man.len()),
        ("engulfing", patterns.engulfing.len()),
        ("dark_cloud_cover", patterns.dark_cloud_cover.len()),
        ("piercing", patterns.piercing.len()),
    ];
    if let Some(&(column, got)) = lengths.iter().find(|(_, got)| *got != len) {
        return Err(SignalError::ShapeMismatch {
            column,
            expected: len,
            got,
        });
    }

    let mut signals = Signals {
        buy: Vec::with_capacity(len),
        sell: Vec::with_capacity(len),
    };
    for i in 0..len {
        let up_breakout = ema_fast[i] > ema_slow[i] && breakout[i];
        let down_breakout = ema_fast[i] < ema_slow[i] && breakout[i];

        signals
            .buy
            .push(up_breakout || patterns.hammer[i] > 0 || patterns.piercing[i] > 0);
        signals.sell.push(
            down_breakout
                || patterns.hanging_man[i] < 0
                || patterns.dark_cloud_cover[i] < 0
                || patterns.engulfing[i] < 0,
        );
    }
    Ok(signals)
}

// ============================================================
// SIGNAL FRAME
// ============================================================

/// All derived series for one bar sequence, aligned by bar index
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignalColumns {
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub candle_direction: Vec<CandleDirection>,
    pub breakout: Vec<bool>,
    pub patterns: PatternScores,
    pub buy: Vec<bool>,
    pub sell: Vec<bool>,
}

impl SignalColumns {
    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_fast.is_empty()
    }

    pub fn buy_count(&self) -> usize {
        self.buy.iter().filter(|b| **b).count()
    }

    pub fn sell_count(&self) -> usize {
        self.sell.iter().filter(|s| **s).count()
    }
}

/// Named series of a [`SignalFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    EmaFast,
    EmaSlow,
    CandleDirection,
    Breakout,
    Pattern(Pattern),
    Buy,
    Sell,
}

impl Column {
    /// Every column in display order
    pub fn all() -> Vec<Column> {
        let mut columns = vec![
            Column::Open,
            Column::High,
            Column::Low,
            Column::Close,
            Column::EmaFast,
            Column::EmaSlow,
            Column::CandleDirection,
            Column::Breakout,
        ];
        columns.extend(Pattern::ALL.iter().map(|p| Column::Pattern(*p)));
        columns.push(Column::Buy);
        columns.push(Column::Sell);
        columns
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::EmaFast => "ema_fast",
            Column::EmaSlow => "ema_slow",
            Column::CandleDirection => "candle_direction",
            Column::Breakout => "breakout",
            Column::Pattern(p) => p.column_name(),
            Column::Buy => "buy",
            Column::Sell => "sell",
        }
    }

    /// Look a column up by name; unknown names are an error rather than an empty series
    pub fn from_name(name: &str) -> Result<Self> {
        Column::all()
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| SignalError::UnknownColumn(name.to_string()))
    }
}

/// Typed, read-only view of one column
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesRef<'a> {
    Float(Cow<'a, [f64]>),
    Bool(&'a [bool]),
    Score(&'a [i32]),
    Direction(&'a [CandleDirection]),
}

impl<'a> SeriesRef<'a> {
    pub fn len(&self) -> usize {
        match self {
            SeriesRef::Float(v) => v.len(),
            SeriesRef::Bool(v) => v.len(),
            SeriesRef::Score(v) => v.len(),
            SeriesRef::Direction(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            SeriesRef::Float(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&'a [bool]> {
        match self {
            SeriesRef::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_score(&self) -> Option<&'a [i32]> {
        match self {
            SeriesRef::Score(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_direction(&self) -> Option<&'a [CandleDirection]> {
        match self {
            SeriesRef::Direction(v) => Some(*v),
            _ => None,
        }
    }
}

/// One row of a [`SignalFrame`], ready to hand to a renderer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SignalRow {
    pub index: usize,
    pub timestamp: Option<i64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub candle_direction: CandleDirection,
    pub breakout: bool,
    pub hammer: i32,
    pub hanging_man: i32,
    pub engulfing: i32,
    pub dark_cloud_cover: i32,
    pub piercing: i32,
    pub buy: bool,
    pub sell: bool,
}

/// The input bars plus their derived columns. Rows are bars, columns are named series.
#[derive(Debug, Clone)]
pub struct SignalFrame<'a, T: Ohlc> {
    bars: &'a [T],
    columns: SignalColumns,
}

impl<'a, T: Ohlc> SignalFrame<'a, T> {
    /// Pair bars with columns computed from them; every column must match the bar count
    pub fn new(bars: &'a [T], columns: SignalColumns) -> Result<Self> {
        let expected = bars.len();
        let lengths = [
            ("ema_fast", columns.ema_fast.len()),
            ("ema_slow", columns.ema_slow.len()),
            ("candle_direction", columns.candle_direction.len()),
            ("breakout", columns.breakout.len()),
            ("hammer", columns.patterns.hammer.len()),
            ("hanging_man", columns.patterns.hanging_man.len()),
            ("engulfing", columns.patterns.engulfing.len()),
            ("dark_cloud_cover", columns.patterns.dark_cloud_cover.len()),
            ("piercing", columns.patterns.piercing.len()),
            ("buy", columns.buy.len()),
            ("sell", columns.sell.len()),
        ];
        if let Some(&(column, got)) = lengths.iter().find(|(_, got)| *got != expected) {
            return Err(SignalError::ShapeMismatch {
                column,
                expected,
                got,
            });
        }
        Ok(Self { bars, columns })
    }

    pub fn bars(&self) -> &'a [T] {
        self.bars
    }

    pub fn columns(&self) -> &SignalColumns {
        &self.columns
    }

    pub fn into_columns(self) -> SignalColumns {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, column: Column) -> SeriesRef<'_> {
        match column {
            Column::Open => self.price_column(T::open),
            Column::High => self.price_column(T::high),
            Column::Low => self.price_column(T::low),
            Column::Close => self.price_column(T::close),
            Column::EmaFast => SeriesRef::Float(Cow::Borrowed(&self.columns.ema_fast)),
            Column::EmaSlow => SeriesRef::Float(Cow::Borrowed(&self.columns.ema_slow)),
            Column::CandleDirection => SeriesRef::Direction(&self.columns.candle_direction),
            Column::Breakout => SeriesRef::Bool(&self.columns.breakout),
            Column::Pattern(p) => SeriesRef::Score(self.columns.patterns.get(p)),
            Column::Buy => SeriesRef::Bool(&self.columns.buy),
            Column::Sell => SeriesRef::Bool(&self.columns.sell),
        }
    }

    fn price_column(&self, price: fn(&T) -> f64) -> SeriesRef<'_> {
        SeriesRef::Float(Cow::Owned(self.bars.iter().map(price).collect()))
    }

    pub fn column_by_name(&self, name: &str) -> Result<SeriesRef<'_>> {
        Ok(self.column(Column::from_name(name)?))
    }

    pub fn row(&self, index: usize) -> Option<SignalRow> {
        let bar = self.bars.get(index)?;
        let c = &self.columns;
        Some(SignalRow {
            index,
            timestamp: bar.timestamp(),
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            ema_fast: c.ema_fast[index],
            ema_slow: c.ema_slow[index],
            candle_direction: c.candle_direction[index],
            breakout: c.breakout[index],
            hammer: c.patterns.hammer[index],
            hanging_man: c.patterns.hanging_man[index],
            engulfing: c.patterns.engulfing[index],
            dark_cloud_cover: c.patterns.dark_cloud_cover[index],
            piercing: c.patterns.piercing[index],
            buy: c.buy[index],
            sell: c.sell[index],
        })
    }

    pub fn rows(&self) -> RowIter<'_, 'a, T> {
        RowIter {
            frame: self,
            current: 0,
        }
    }

    pub fn buy_indices(&self) -> Vec<usize> {
        flagged(&self.columns.buy)
    }

    pub fn sell_indices(&self) -> Vec<usize> {
        flagged(&self.columns.sell)
    }
}

fn flagged(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.then_some(i))
        .collect()
}

/// Iterator over the rows of a [`SignalFrame`]
pub struct RowIter<'f, 'a, T: Ohlc> {
    frame: &'f SignalFrame<'a, T>,
    current: usize,
}

impl<'f, 'a, T: Ohlc> Iterator for RowIter<'f, 'a, T> {
    type Item = SignalRow;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.frame.row(self.current)?;
        self.current += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frame.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'f, 'a, T: Ohlc> ExactSizeIterator for RowIter<'f, 'a, T> {}

// ============================================================
// SIGNAL ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fast_span: Span,
    pub slow_span: Span,
    /// Compute independent column groups on the rayon pool
    pub parallel_columns: bool,
    pub patterns: PatternRecognizer,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_span: Span::new_const(9),
            slow_span: Span::new_const(20),
            parallel_columns: false,
            patterns: PatternRecognizer::default(),
        }
    }
}

/// Stateless indicator and signal-fusion engine
#[derive(Debug, Clone)]
pub struct SignalEngine {
    fast: MovingAverage,
    slow: MovingAverage,
    recognizer: PatternRecognizer,
    config: EngineConfig,
}

impl SignalEngine {
    /// Engine with 9/20 spans and default pattern thresholds
    pub fn with_defaults() -> Self {
        let config = EngineConfig::default();
        Self {
            fast: MovingAverage::from_span(config.fast_span),
            slow: MovingAverage::from_span(config.slow_span),
            recognizer: config.patterns.clone(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fast_average(&self) -> &MovingAverage {
        &self.fast
    }

    pub fn slow_average(&self) -> &MovingAverage {
        &self.slow
    }

    pub fn recognizer(&self) -> &PatternRecognizer {
        &self.recognizer
    }

    /// Compute every derived series and pair them with the input bars.
    pub fn run<'a, T: Ohlc + Sync>(&self, bars: &'a [T]) -> Result<SignalFrame<'a, T>> {
        let columns = self.compute(bars)?;
        SignalFrame::new(bars, columns)
    }

    /// Compute every derived series. The whole sequence is validated before any
    /// series is built.
    pub fn compute<T: Ohlc + Sync>(&self, bars: &[T]) -> Result<SignalColumns> {
        if let Err(error) = validate_bars(bars) {
            warn!(%error, bars = bars.len(), "rejected bar sequence");
            return Err(error);
        }

        debug!(
            bars = bars.len(),
            fast_span = self.fast.span().get(),
            slow_span = self.slow.span().get(),
            parallel = self.config.parallel_columns,
            "computing signal columns"
        );

        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();

        let ((ema_fast, ema_slow), (breakout, patterns)) = if self.config.parallel_columns {
            rayon::join(
                || rayon::join(|| self.fast.compute(&closes), || self.slow.compute(&closes)),
                || rayon::join(|| breakouts(bars), || self.recognizer.scores(bars)),
            )
        } else {
            (
                (self.fast.compute(&closes), self.slow.compute(&closes)),
                (breakouts(bars), self.recognizer.scores(bars)),
            )
        };

        let Signals { buy, sell } = fuse(&ema_fast, &ema_slow, &breakout, &patterns)?;

        let columns = SignalColumns {
            ema_fast,
            ema_slow,
            candle_direction: candle_directions(bars),
            breakout,
            patterns,
            buy,
            sell,
        };

        debug!(
            bars = columns.len(),
            buys = columns.buy_count(),
            sells = columns.sell_count(),
            "signal columns computed"
        );

        Ok(columns)
    }
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating SignalEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    fast_span: usize,
    slow_span: usize,
    parallel_columns: bool,
    patterns: PatternRecognizer,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    /// Start from a loaded configuration; every field can still be overridden
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            fast_span: config.fast_span.get(),
            slow_span: config.slow_span.get(),
            parallel_columns: config.parallel_columns,
            patterns: config.patterns,
        }
    }

    pub fn fast_span(mut self, span: usize) -> Self {
        self.fast_span = span;
        self
    }

    pub fn slow_span(mut self, span: usize) -> Self {
        self.slow_span = span;
        self
    }

    /// Override the EMA spans from a key/value map using the keys described by
    /// [`EMA_PARAMS`](params::EMA_PARAMS).
    ///
    /// Missing keys keep the current spans; non-integer or zero values are rejected.
    pub fn with_params(mut self, params: &HashMap<&str, f64>) -> Result<Self> {
        self.fast_span = get_span(params, EMA_PARAMS[0].name, self.fast_span)?.get();
        self.slow_span = get_span(params, EMA_PARAMS[1].name, self.slow_span)?.get();
        Ok(self)
    }

    pub fn parallel_columns(mut self, enable: bool) -> Self {
        self.parallel_columns = enable;
        self
    }

    pub fn hammer(mut self, detector: HammerDetector) -> Self {
        self.patterns.hammer = detector;
        self
    }

    pub fn hanging_man(mut self, detector: HangingManDetector) -> Self {
        self.patterns.hanging_man = detector;
        self
    }

    pub fn engulfing(mut self, detector: EngulfingDetector) -> Self {
        self.patterns.engulfing = detector;
        self
    }

    pub fn dark_cloud_cover(mut self, detector: DarkCloudCoverDetector) -> Self {
        self.patterns.dark_cloud_cover = detector;
        self
    }

    pub fn piercing(mut self, detector: PiercingDetector) -> Self {
        self.patterns.piercing = detector;
        self
    }

    /// Build the engine, rejecting bad spans or detector thresholds
    pub fn build(self) -> Result<SignalEngine> {
        let fast = MovingAverage::new(self.fast_span)
            .map_err(|_| SignalError::Configuration("fast_span must be > 0".to_string()))?;
        let slow = MovingAverage::new(self.slow_span)
            .map_err(|_| SignalError::Configuration("slow_span must be > 0".to_string()))?;
        self.patterns.validate_config()?;

        Ok(SignalEngine {
            fast,
            slow,
            recognizer: self.patterns.clone(),
            config: EngineConfig {
                fast_span: fast.span(),
                slow_span: slow.span(),
                parallel_columns: self.parallel_columns,
                patterns: self.patterns,
            },
        })
    }
}

// ============================================================
// PARALLEL RUNS
// ============================================================

use rayon::prelude::*;

/// Columns computed for a single instrument
#[derive(Debug)]
pub struct RunResult {
    pub symbol: String,
    pub columns: SignalColumns,
}

/// Error from a single instrument
#[derive(Debug)]
pub struct RunError {
    pub symbol: String,
    pub error: SignalError,
}

/// Run one engine over many independent bar sequences in parallel.
/// A failing instrument does not affect the others.
pub fn run_parallel<'a, T, I>(engine: &SignalEngine, instruments: I) -> (Vec<RunResult>, Vec<RunError>)
where
    T: Ohlc + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            debug!(symbol, bars = bars.len(), "running instrument");
            engine
                .compute(bars)
                .map(|columns| RunResult {
                    symbol: symbol.to_string(),
                    columns,
                })
                .map_err(|error| RunError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Test bar without an ordering key
    #[derive(Debug, Clone)]
    struct PlainBar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
    }

    impl PlainBar {
        fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
            Self { o, h, l, c }
        }
    }

    impl Ohlc for PlainBar {
        fn open(&self) -> f64 {
            self.o
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }
    }

    fn make_uptrend_bars() -> Vec<Bar> {
        (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                Bar::new(i, base, base + 2.5, base - 1.0, base + 2.2)
            })
            .collect()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_span_validation() {
        assert!(Span::new(1).is_ok());
        assert!(matches!(Span::new(0), Err(SignalError::Configuration(_))));
    }

    #[test]
    fn test_ohlc_ext() {
        let bar = PlainBar::new(100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.upper_shadow(), 5.0);
        assert_eq!(bar.lower_shadow(), 10.0);
        assert_eq!(bar.body_midpoint(), 102.5);
        assert!(bar.is_bullish());
        assert_eq!(bar.direction(), CandleDirection::Bullish);
    }

    #[test]
    fn test_unchanged_bar_is_bearish() {
        let bar = PlainBar::new(100.0, 101.0, 99.0, 100.0);
        assert_eq!(bar.direction(), CandleDirection::Bearish);
    }

    #[test]
    fn test_moving_average_alpha() {
        assert!((MovingAverage::new(9).unwrap().alpha() - 0.2).abs() < 1e-15);
        assert!((MovingAverage::new(20).unwrap().alpha() - 2.0 / 21.0).abs() < 1e-15);
        assert!(matches!(
            MovingAverage::new(0),
            Err(SignalError::Configuration(_))
        ));
    }

    #[test]
    fn test_moving_average_seeded_with_first_value() {
        let ema = MovingAverage::new(3).unwrap();
        // alpha = 0.5
        let result = ema.compute(&[10.0, 12.0, 14.0]);
        assert_eq!(result, vec![10.0, 11.0, 12.5]);
        assert!(ema.compute(&[]).is_empty());
    }

    #[test]
    fn test_breakouts() {
        let bars = vec![
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
            PlainBar::new(10.5, 12.0, 10.4, 11.8),
            // high above, close not above prior high
            PlainBar::new(11.8, 12.5, 11.0, 11.9),
        ];
        assert_eq!(breakouts(&bars), vec![false, true, false]);
        assert!(breakouts::<PlainBar>(&[]).is_empty());
    }

    #[test]
    fn test_validate_bars_reports_index() {
        let bars = vec![
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
            PlainBar::new(4.0, 3.0, 5.0, 4.0),
        ];
        let err = validate_bars(&bars).unwrap_err();
        assert_eq!(
            err,
            SignalError::DataIntegrity {
                index: 1,
                reason: "high < low"
            }
        );
        assert_eq!(err.bar_index(), Some(1));
    }

    #[test]
    fn test_validate_bars_geometry() {
        let cases = [
            (PlainBar::new(f64::NAN, 11.0, 9.0, 10.0), "NaN or infinite price"),
            (PlainBar::new(0.0, 11.0, 9.0, 10.0), "non-positive price"),
            (PlainBar::new(10.0, 10.5, 9.0, 11.0), "high below open/close"),
            (PlainBar::new(10.0, 11.0, 10.2, 10.5), "low above open/close"),
        ];
        for (bar, reason) in cases {
            assert_eq!(
                validate_bars(&[bar]),
                Err(SignalError::DataIntegrity { index: 0, reason })
            );
        }
    }

    #[test]
    fn test_validate_bars_ordering() {
        let bars = vec![
            Bar::new(1, 10.0, 11.0, 9.0, 10.5),
            Bar::new(2, 10.0, 11.0, 9.0, 10.5),
            Bar::new(2, 10.0, 11.0, 9.0, 10.5),
        ];
        assert_eq!(
            validate_bars(&bars),
            Err(SignalError::Ordering {
                index: 2,
                previous: 2,
                current: 2
            })
        );
    }

    /// Test bar with an optional ordering key
    #[derive(Debug, Clone)]
    struct KeyedBar {
        key: Option<i64>,
    }

    impl Ohlc for KeyedBar {
        fn open(&self) -> f64 {
            10.0
        }

        fn high(&self) -> f64 {
            11.0
        }

        fn low(&self) -> f64 {
            9.0
        }

        fn close(&self) -> f64 {
            10.5
        }

        fn timestamp(&self) -> Option<i64> {
            self.key
        }
    }

    #[test]
    fn test_keyless_bar_does_not_reset_ordering() {
        let keys = |keys: &[Option<i64>]| -> Vec<KeyedBar> {
            keys.iter().map(|&key| KeyedBar { key }).collect()
        };

        assert_eq!(
            validate_bars(&keys(&[Some(5), None, Some(3)])),
            Err(SignalError::Ordering {
                index: 2,
                previous: 5,
                current: 3
            })
        );
        assert!(matches!(
            validate_bars(&keys(&[Some(5), None, None, Some(5)])),
            Err(SignalError::Ordering { index: 3, .. })
        ));
        assert!(validate_bars(&keys(&[None, Some(5), None, Some(6)])).is_ok());
    }

    #[test]
    fn test_invalid_bar_always_rejected() {
        let bars = vec![
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
            PlainBar::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN),
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
        ];
        for parallel in [false, true] {
            let engine = EngineBuilder::new().parallel_columns(parallel).build().unwrap();
            assert_eq!(
                engine.compute(&bars),
                Err(SignalError::DataIntegrity {
                    index: 1,
                    reason: "NaN or infinite price"
                })
            );
        }
    }

    #[test]
    fn test_keyless_bars_are_positional() {
        let bars = vec![
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
            PlainBar::new(10.0, 11.0, 9.0, 10.5),
        ];
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new().build().unwrap();
        assert_eq!(engine.config().fast_span.get(), 9);
        assert_eq!(engine.config().slow_span.get(), 20);
        assert!(!engine.config().parallel_columns);
    }

    #[test]
    fn test_builder_spans_from_params() {
        let mut params = HashMap::new();
        params.insert("fast_span", 12.0);
        let engine = EngineBuilder::new().with_params(&params).unwrap().build().unwrap();
        assert_eq!(engine.fast_average().span().get(), 12);
        assert_eq!(engine.slow_average().span().get(), 20);

        params.insert("slow_span", 0.0);
        assert!(matches!(
            EngineBuilder::new().with_params(&params),
            Err(SignalError::Configuration(_))
        ));

        let mut params = HashMap::new();
        params.insert("slow_span", 20.5);
        assert!(matches!(
            EngineBuilder::new().with_params(&params),
            Err(SignalError::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_rejects_zero_span() {
        assert!(matches!(
            EngineBuilder::new().fast_span(0).build(),
            Err(SignalError::Configuration(_))
        ));
        assert!(matches!(
            EngineBuilder::new().slow_span(0).build(),
            Err(SignalError::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_rejects_bad_detector() {
        let hammer = HammerDetector {
            shadow_body_factor: -1.0,
            ..HammerDetector::default()
        };
        assert!(matches!(
            EngineBuilder::new().hammer(hammer).build(),
            Err(SignalError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_run() {
        let engine = SignalEngine::with_defaults();
        let bars: Vec<Bar> = vec![];
        let frame = engine.run(&bars).unwrap();
        assert!(frame.is_empty());
        assert!(frame.columns().is_empty());
        assert!(frame.columns().patterns.is_empty());
        assert!(frame.columns().buy.is_empty());
        assert!(frame.rows().next().is_none());
    }

    #[test]
    fn test_fuse_shape_mismatch() {
        let scores = PatternScores::zeroed(2);
        let err = fuse(&[1.0, 2.0], &[1.0, 2.0], &[false], &scores).unwrap_err();
        assert_eq!(
            err,
            SignalError::ShapeMismatch {
                column: "breakout",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_fuse_trend_gates_breakout() {
        let scores = PatternScores::zeroed(3);
        let signals = fuse(
            &[2.0, 1.0, 1.0],
            &[1.0, 2.0, 1.0],
            &[true, true, true],
            &scores,
        )
        .unwrap();
        assert_eq!(signals.buy, vec![true, false, false]);
        assert_eq!(signals.sell, vec![false, true, false]);
    }

    #[test]
    fn test_fuse_engulfing_only_feeds_sell() {
        let mut scores = PatternScores::zeroed(2);
        scores.engulfing = vec![100, -100];
        let signals = fuse(&[1.0, 1.0], &[1.0, 1.0], &[false, false], &scores).unwrap();
        assert_eq!(signals.buy, vec![false, false]);
        assert_eq!(signals.sell, vec![false, true]);
    }

    #[test]
    fn test_fuse_buy_and_sell_same_bar() {
        let mut scores = PatternScores::zeroed(1);
        scores.hammer = vec![100];
        scores.hanging_man = vec![-100];
        let signals = fuse(&[1.0], &[1.0], &[false], &scores).unwrap();
        assert!(signals.buy[0]);
        assert!(signals.sell[0]);
    }

    #[test]
    fn test_parallel_columns_match_sequential() {
        let bars = make_uptrend_bars();
        let sequential = EngineBuilder::new().build().unwrap();
        let parallel = EngineBuilder::new().parallel_columns(true).build().unwrap();
        assert_eq!(
            sequential.compute(&bars).unwrap(),
            parallel.compute(&bars).unwrap()
        );
    }

    #[test]
    fn test_uptrend_breakouts_buy() {
        let bars = make_uptrend_bars();
        let engine = SignalEngine::with_defaults();
        let frame = engine.run(&bars).unwrap();
        // Each bar closes above the prior high while the fast EMA leads
        for i in 1..bars.len() {
            assert!(frame.columns().breakout[i]);
            assert!(frame.columns().ema_fast[i] > frame.columns().ema_slow[i]);
            assert!(frame.columns().buy[i]);
        }
        assert!(!frame.columns().buy[0]);
    }

    #[test]
    fn test_column_lookup() {
        assert_eq!(Column::from_name("ema_fast").unwrap(), Column::EmaFast);
        assert_eq!(
            Column::from_name("dark_cloud_cover").unwrap(),
            Column::Pattern(Pattern::DarkCloudCover)
        );
        assert_eq!(
            Column::from_name("EMA9"),
            Err(SignalError::UnknownColumn("EMA9".to_string()))
        );
        assert_eq!(Column::all().len(), 15);
    }

    #[test]
    fn test_frame_columns_and_rows() {
        let bars = make_uptrend_bars();
        let engine = SignalEngine::with_defaults();
        let frame = engine.run(&bars).unwrap();

        let close = frame.column(Column::Close);
        assert_eq!(close.as_float().unwrap()[3], bars[3].close);
        assert_eq!(frame.column(Column::Buy).as_bool().unwrap().len(), bars.len());
        assert!(frame.column(Column::Buy).as_score().is_none());
        assert!(frame.column_by_name("nope").is_err());

        let rows = frame.rows();
        assert_eq!(rows.len(), bars.len());
        let row = frame.row(5).unwrap();
        assert_eq!(row.timestamp, Some(5));
        assert_eq!(row.ema_fast, frame.columns().ema_fast[5]);
        assert!(frame.row(bars.len()).is_none());
        assert_eq!(frame.buy_indices(), (1..bars.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_frame_rejects_misaligned_columns() {
        let bars = make_uptrend_bars();
        let result = SignalFrame::new(&bars, SignalColumns::default());
        assert!(matches!(
            result,
            Err(SignalError::ShapeMismatch {
                column: "ema_fast",
                ..
            })
        ));
    }

    #[test]
    fn test_scan_lists_matches() {
        let bars = vec![
            Bar::new(1, 60.0, 61.0, 59.0, 59.5),
            Bar::new(2, 59.0, 62.0, 58.0, 61.5),
        ];
        let matches = PatternRecognizer::default().scan(&bars);
        let engulfing = matches
            .iter()
            .find(|m| m.pattern == Pattern::Engulfing)
            .unwrap();
        assert_eq!(engulfing.direction, Direction::Bullish);
        assert_eq!(engulfing.score, 100);
        assert_eq!((engulfing.start_index, engulfing.end_index), (0, 1));
    }

    #[test]
    fn test_run_parallel() {
        let engine = SignalEngine::with_defaults();

        let good = make_uptrend_bars();
        let bad = vec![Bar::new(1, 5.0, 3.0, 5.0, 4.0)];

        let instruments: Vec<(&str, &[Bar])> = vec![("AAPL", &good), ("BAD", &bad)];

        let (results, errors) = run_parallel(&engine, instruments);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "AAPL");
        assert_eq!(results[0].columns.len(), good.len());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol, "BAD");
        assert_eq!(errors[0].error.bar_index(), Some(0));
    }

    #[test]
    fn test_pattern_identity() {
        assert_eq!(Pattern::ALL.len(), 5);
        assert_eq!(Pattern::Hammer.as_str(), "CDL_HAMMER");
        assert!(Pattern::Engulfing.is_bidirectional());
        assert_eq!(Pattern::Hammer.min_bars(), 1);
        assert_eq!(Pattern::Piercing.min_bars(), 2);
        assert_eq!(
            Pattern::DarkCloudCover.typical_direction(),
            Some(Direction::Bearish)
        );
    }
}
