//! Quantization scheme registry
//!
//! A scheme maps full-precision values onto a fixed-point grid of `bits`
//! total bits spanning `[-scale, scale]`. The search only needs the scheme by
//! name; the grid arithmetic below is the deterministic reference used by the
//! snapshot-backed oracle.

use crate::{Error, Result};

/// A named quantization scheme with tensor and in-place variants
pub trait QuantScheme: std::fmt::Debug + Send + Sync {
    /// Registry name of the scheme
    fn name(&self) -> &'static str;

    /// Map one value already divided by the grid step onto an integer level
    fn level(&self, scaled: f32) -> f32;

    /// Quantize `values` in place
    fn quantize_inplace(&self, values: &mut [f32], scale: f32, bits: u32) {
        let Some(grid) = Grid::new(scale, bits) else {
            return;
        };
        for v in values.iter_mut() {
            let level = self.level(v.clamp(-scale, scale) / grid.step);
            *v = level.clamp(grid.min_level, grid.max_level) * grid.step;
        }
    }

    /// Quantize `values` into a new buffer
    fn quantize(&self, values: &[f32], scale: f32, bits: u32) -> Vec<f32> {
        let mut out = values.to_vec();
        self.quantize_inplace(&mut out, scale, bits);
        out
    }
}

/// Symmetric fixed-point grid for a scale and bit-width
#[derive(Debug, Clone, Copy, PartialEq)]
struct Grid {
    step: f32,
    min_level: f32,
    max_level: f32,
}

impl Grid {
    /// `None` when the grid is degenerate and values pass through unchanged
    fn new(scale: f32, bits: u32) -> Option<Self> {
        if bits == 0 || !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        // 2^(bits-1) levels on each side of zero; beyond f32 mantissa the grid
        // is finer than the representation.
        let half_levels = 2f32.powi(bits.min(25) as i32 - 1);
        Some(Self {
            step: scale / half_levels,
            min_level: -half_levels,
            max_level: half_levels - 1.0,
        })
    }
}

/// Truncate toward negative infinity
#[derive(Debug, Clone, Copy, Default)]
pub struct Truncation;

impl QuantScheme for Truncation {
    fn name(&self) -> &'static str {
        "truncation"
    }

    fn level(&self, scaled: f32) -> f32 {
        scaled.floor()
    }
}

/// Round to the nearest level, ties away from zero
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundToNearest;

impl QuantScheme for RoundToNearest {
    fn name(&self) -> &'static str {
        "round_to_nearest"
    }

    fn level(&self, scaled: f32) -> f32 {
        scaled.round()
    }
}

static TRUNCATION: Truncation = Truncation;
static ROUND_TO_NEAREST: RoundToNearest = RoundToNearest;

/// Names accepted by [`lookup_scheme`]
pub const AVAILABLE_SCHEMES: &[&str] = &["truncation", "round_to_nearest"];

/// Resolve a scheme by name
pub fn lookup_scheme(name: &str) -> Result<&'static dyn QuantScheme> {
    match name {
        "truncation" => Ok(&TRUNCATION),
        "round_to_nearest" => Ok(&ROUND_TO_NEAREST),
        other => Err(Error::UnknownScheme(other.to_string())),
    }
}
