//! Quantization schemes
//!
//! The search resolves a scheme by name once at startup; an unknown name is
//! a fatal configuration error.

mod scheme;

pub use scheme::{lookup_scheme, QuantScheme, RoundToNearest, Truncation, AVAILABLE_SCHEMES};
