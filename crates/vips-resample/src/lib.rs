//! Resampling bindings for libvips.
//!
//! Exposes resize, thumbnail, affine and LUT/index mapping as thin
//! call-throughs: each one counts itself, marshals its arguments, invokes
//! the engine and converts a non-zero status into an [`Error`] carrying the
//! engine's diagnostic text.
//!
//! The engine sits behind [`NativeBackend`]. [`ImageBackend`] is always
//! available; the system libvips is exposed as `LibVips` with the `native`
//! feature.

pub mod backend;
pub mod config;
pub mod counters;
pub mod error;
#[cfg(feature = "native")]
pub mod ffi;
pub mod interpolate;
pub mod kernel;
pub mod resample;

// Re-exports for convenience
pub use backend::{ImageBackend, ImageFiles, NativeBackend, NativeCall};
#[cfg(feature = "native")]
pub use backend::{LibVips, VipsHandle};
pub use config::{ConfigError, VipsConfig};
pub use counters::{OpCounters, op_counters};
pub use error::{Error, Result};
pub use interpolate::{Interesting, Interpolate};
pub use kernel::{Kernel, UnknownName};
pub use resample::{AffineMatrix, Resampler};
