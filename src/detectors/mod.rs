//! Candlestick pattern detectors
//!
//! Explicit geometric rules for the reversal patterns that feed signal fusion.
//!
//! # Pattern Categories
//!
//! - **Single-bar (2)**: Hammer, Hanging Man (the latter reads trend context from one prior bar)
//! - **Two-bar (3)**: Engulfing, Dark Cloud Cover, Piercing

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod single_bar;
pub mod two_bar;

// Re-export all detectors for convenience
pub use helpers::*;
pub use single_bar::*;
pub use two_bar::*;
