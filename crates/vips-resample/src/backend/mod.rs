//! Engine seam.
//!
//! A backend exposes the native calling convention of libvips: every
//! operation returns an integer status (zero on success) plus an optional
//! output handle, and a failure leaves its diagnostic text in a last-error
//! buffer that the caller drains with [`NativeBackend::take_error`].
//!
//! Two engines implement it:
//! - [`ImageBackend`] - the `image`/`imageproc` crates, always available
//! - `LibVips` - the system libvips, behind the `native` feature

use std::ffi::CStr;
use std::path::Path;

use crate::error::Result;

pub mod pure;
#[cfg(feature = "native")]
pub mod native;

pub use self::pure::ImageBackend;
#[cfg(feature = "native")]
pub use self::native::{LibVips, VipsHandle};

/// Raw outcome of a native call: status code and whatever handle was written.
#[derive(Debug)]
pub struct NativeCall<I> {
    pub status: i32,
    pub out: Option<I>,
}

impl<I> NativeCall<I> {
    pub fn ok(out: I) -> Self {
        Self {
            status: 0,
            out: Some(out),
        }
    }

    pub fn failed(status: i32) -> Self {
        Self { status, out: None }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Native entry points used by the resampling call-throughs.
///
/// Arguments arrive already marshaled: kernels and crop strategies as their
/// native integer constants, interpolators as nicknames.
pub trait NativeBackend {
    /// Opaque image handle. Dropping it releases the engine's reference.
    type Image;

    /// Human-readable engine name (e.g. "libvips", "image").
    fn name(&self) -> &str;

    /// `vscale < 0` means "same as `scale`".
    fn resize(
        &self,
        input: &Self::Image,
        scale: f64,
        vscale: f64,
        kernel: i32,
    ) -> NativeCall<Self::Image>;

    fn thumbnail(
        &self,
        input: &Self::Image,
        width: i32,
        height: i32,
        crop: i32,
    ) -> NativeCall<Self::Image>;

    fn mapim(&self, input: &Self::Image, index: &Self::Image) -> NativeCall<Self::Image>;

    fn maplut(&self, input: &Self::Image, lut: &Self::Image) -> NativeCall<Self::Image>;

    fn affine(
        &self,
        input: &Self::Image,
        matrix: [f64; 4],
        interpolate: &CStr,
    ) -> NativeCall<Self::Image>;

    /// Read and clear the last-error buffer.
    fn take_error(&self) -> String;
}

/// File access for backends whose engine also owns the codecs.
pub trait ImageFiles: NativeBackend {
    fn load(&self, path: &Path) -> Result<Self::Image>;

    fn save(&self, image: &Self::Image, path: &Path) -> Result<()>;
}
