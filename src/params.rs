//! Parameter metadata for pattern detectors and the moving-average stage
//!
//! Every threshold the engine uses is a named, documented parameter. This module exposes
//! them for:
//! - Grid search over detector thresholds
//! - Parameter documentation
//! - Building detectors from loosely-typed key/value settings
//!
//! # Example
//!
//! ```rust
//! use cdlfuse::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use cdlfuse::prelude::*;
//!
//! for param in HammerDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{Pattern, Ratio, Result, SignalError, Span};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value in 0.0..=1.0
  Ratio,
  /// Positive multiplier, may exceed 1.0 (e.g. shadow_body_factor: 2.0)
  Factor,
  /// EMA span (positive integer)
  Span,
  /// Boolean switch encoded as 0.0 / 1.0
  Flag,
}

/// Metadata for a single parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "shadow_body_factor")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  pub const fn span(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Span, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    if step <= 0.0 {
      values.push(min);
      return values;
    }
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(SignalError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio | ParamType::Factor => Ok(()),
      ParamType::Span => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(SignalError::InvalidValue("Span must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Flag => {
        if value != 0.0 && value != 1.0 {
          return Err(SignalError::InvalidValue("Flag must be 0 or 1"));
        }
        Ok(())
      },
    }
  }
}

/// Spans of the two moving averages, in `fast_span`, `slow_span` order.
/// Read by `EngineBuilder::with_params`.
pub static EMA_PARAMS: &[ParamMeta] = &[
  ParamMeta::span("fast_span", 9.0, (5.0, 15.0, 1.0), "Span of the fast EMA"),
  ParamMeta::span("slow_span", 20.0, (15.0, 50.0, 5.0), "Span of the slow EMA"),
];

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that expose their thresholds
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// The pattern this detector scores
  fn pattern_id() -> Pattern;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a positive finite multiplier from params with default fallback
pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() || value <= 0.0 {
    return Err(SignalError::Configuration(format!("{key} must be finite and > 0, got {value}")));
  }
  Ok(value)
}

/// Helper to get a Span from params with default fallback
pub fn get_span(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Span> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
    return Err(SignalError::Configuration(format!("{key} must be a positive integer, got {value}")));
  }
  Span::new(value as usize)
}

/// Helper to get a boolean switch (any non-zero value is on)
pub fn get_flag(params: &HashMap<&str, f64>, key: &str, default: bool) -> bool {
  params.get(key).map(|v| *v != 0.0).unwrap_or(default)
}

// ============================================================
// TESTS
// ============================================================
