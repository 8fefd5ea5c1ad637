//! Resampling call-throughs.
//!
//! Each operation counts itself, marshals its arguments into native form,
//! invokes the backend and turns a non-zero status into [`Error::Native`]
//! carrying the engine's diagnostic text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{NativeBackend, NativeCall};
use crate::counters::{OP_AFFINE, OP_MAPIM, OP_MAPLUT, OP_RESIZE, OP_THUMBNAIL, OpCounters, op_counters};
use crate::error::{Error, Result};
use crate::interpolate::{Interesting, Interpolate};
use crate::kernel::Kernel;

/// Vertical scale passed when only a uniform scale was requested.
pub const UNSET_VSCALE: f64 = -1.0;

/// 2x2 matrix of an affine transform: `x' = a*x + b*y`, `y' = c*x + d*y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy)
    }

    /// Counter-clockwise rotation in a y-down image frame.
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos)
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Resampling front-end over a [`NativeBackend`].
#[derive(Debug)]
pub struct Resampler<B> {
    backend: B,
    counters: Arc<OpCounters>,
}

impl<B: NativeBackend> Resampler<B> {
    /// Resampler reporting into the process-wide counters.
    pub fn new(backend: B) -> Self {
        Self::with_counters(backend, op_counters())
    }

    pub fn with_counters(backend: B, counters: Arc<OpCounters>) -> Self {
        Self { backend, counters }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn counters(&self) -> &Arc<OpCounters> {
        &self.counters
    }

    /// Resize by `scale` in both directions. `Kernel::Auto` means Lanczos3.
    pub fn resize(&self, input: &B::Image, scale: f64, kernel: Kernel) -> Result<B::Image> {
        self.counters.incr(OP_RESIZE);
        finite(OP_RESIZE, "scale", scale)?;
        let kernel = kernel.resolve();

        debug!(backend = self.backend.name(), scale, %kernel, "resize");
        let call = self.backend.resize(input, scale, UNSET_VSCALE, kernel.native());
        self.check(OP_RESIZE, call)
    }

    /// Resize with an independent vertical scale.
    pub fn resize_with_vscale(
        &self,
        input: &B::Image,
        scale: f64,
        vscale: f64,
        kernel: Kernel,
    ) -> Result<B::Image> {
        self.counters.incr(OP_RESIZE);
        finite(OP_RESIZE, "scale", scale)?;
        finite(OP_RESIZE, "vscale", vscale)?;
        let kernel = kernel.resolve();

        debug!(backend = self.backend.name(), scale, vscale, %kernel, "resize");
        let call = self.backend.resize(input, scale, vscale, kernel.native());
        self.check(OP_RESIZE, call)
    }

    /// Shrink into a `width x height` box; a zero height means a square box.
    pub fn thumbnail(
        &self,
        input: &B::Image,
        width: u32,
        height: u32,
        crop: Interesting,
    ) -> Result<B::Image> {
        self.counters.incr(OP_THUMBNAIL);
        if width == 0 {
            return Err(Error::invalid(OP_THUMBNAIL, "width must be at least 1"));
        }
        let height = if height == 0 { width } else { height };
        let width = to_c_int(OP_THUMBNAIL, "width", width)?;
        let height = to_c_int(OP_THUMBNAIL, "height", height)?;

        debug!(backend = self.backend.name(), width, height, %crop, "thumbnail");
        let call = self.backend.thumbnail(input, width, height, crop.native());
        self.check(OP_THUMBNAIL, call)
    }

    /// Resample `input` at the coordinates stored in `index`.
    pub fn mapim(&self, input: &B::Image, index: &B::Image) -> Result<B::Image> {
        self.counters.incr(OP_MAPIM);
        debug!(backend = self.backend.name(), "mapim");
        let call = self.backend.mapim(input, index);
        self.check(OP_MAPIM, call)
    }

    /// Map pixel values through a lookup table image.
    pub fn maplut(&self, input: &B::Image, lut: &B::Image) -> Result<B::Image> {
        self.counters.incr(OP_MAPLUT);
        debug!(backend = self.backend.name(), "maplut");
        let call = self.backend.maplut(input, lut);
        self.check(OP_MAPLUT, call)
    }

    pub fn affine(
        &self,
        input: &B::Image,
        matrix: AffineMatrix,
        interpolate: Interpolate,
    ) -> Result<B::Image> {
        self.counters.incr(OP_AFFINE);
        let coefficients = matrix.to_array();
        for (name, value) in ["a", "b", "c", "d"].into_iter().zip(coefficients) {
            finite(OP_AFFINE, name, value)?;
        }

        debug!(backend = self.backend.name(), ?matrix, %interpolate, "affine");
        let call = self
            .backend
            .affine(input, coefficients, interpolate.nickname());
        self.check(OP_AFFINE, call)
    }

    fn check(&self, operation: &'static str, call: NativeCall<B::Image>) -> Result<B::Image> {
        match call {
            NativeCall {
                status: 0,
                out: Some(out),
            } => Ok(out),
            NativeCall { status: 0, out: None } => {
                warn!(operation, "Native call succeeded without output");
                Err(Error::MissingOutput { operation })
            }
            NativeCall { status, out } => {
                // release any partial output before reporting
                drop(out);
                let message = self.backend.take_error();
                warn!(operation, status, message = %message.trim(), "Native call failed");
                Err(Error::native(operation, status, message))
            }
        }
    }
}

fn finite(operation: &'static str, name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(operation, format!("{name} must be finite, got {value}")))
    }
}

fn to_c_int(operation: &'static str, name: &str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::invalid(operation, format!("{name} {value} does not fit a native int")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ImageBackend;
    use image::{DynamicImage, GrayImage, Luma};
    use std::cell::{Cell, RefCell};
    use std::ffi::CStr;
    use std::rc::Rc;

    /// Image handle that records when it is released.
    #[derive(Debug)]
    struct Token {
        id: u32,
        drops: Rc<Cell<u32>>,
    }

    impl Drop for Token {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    /// Backend returning a preset status and recording marshaled arguments.
    struct Scripted {
        status: i32,
        produce: bool,
        error: RefCell<String>,
        drops: Rc<Cell<u32>>,
        seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn ok() -> Self {
            Self::new(0, true, "")
        }

        fn failing(status: i32, error: &str) -> Self {
            Self::new(status, false, error)
        }

        fn new(status: i32, produce: bool, error: &str) -> Self {
            Self {
                status,
                produce,
                error: RefCell::new(error.to_owned()),
                drops: Rc::new(Cell::new(0)),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn token(&self, id: u32) -> Token {
            Token {
                id,
                drops: Rc::clone(&self.drops),
            }
        }

        fn respond(&self, args: String) -> NativeCall<Token> {
            self.seen.borrow_mut().push(args);
            NativeCall {
                status: self.status,
                out: self.produce.then(|| self.token(99)),
            }
        }

        fn last(&self) -> String {
            self.seen.borrow().last().cloned().unwrap_or_default()
        }
    }

    impl NativeBackend for Scripted {
        type Image = Token;

        fn name(&self) -> &str {
            "scripted"
        }

        fn resize(&self, input: &Token, scale: f64, vscale: f64, kernel: i32) -> NativeCall<Token> {
            self.respond(format!("resize {} {scale} {vscale} {kernel}", input.id))
        }

        fn thumbnail(&self, input: &Token, width: i32, height: i32, crop: i32) -> NativeCall<Token> {
            self.respond(format!("thumbnail {} {width} {height} {crop}", input.id))
        }

        fn mapim(&self, input: &Token, index: &Token) -> NativeCall<Token> {
            self.respond(format!("mapim {} {}", input.id, index.id))
        }

        fn maplut(&self, input: &Token, lut: &Token) -> NativeCall<Token> {
            self.respond(format!("maplut {} {}", input.id, lut.id))
        }

        fn affine(&self, input: &Token, m: [f64; 4], interpolate: &CStr) -> NativeCall<Token> {
            self.respond(format!(
                "affine {} {:?} {}",
                input.id,
                m,
                interpolate.to_str().unwrap()
            ))
        }

        fn take_error(&self) -> String {
            std::mem::take(&mut *self.error.borrow_mut())
        }
    }

    fn resampler(backend: Scripted) -> Resampler<Scripted> {
        Resampler::with_counters(backend, Arc::new(OpCounters::new()))
    }

    /// Run every call-through once against the resampler's backend.
    fn run_all(r: &Resampler<Scripted>) -> Vec<Result<Token>> {
        let input = r.backend().token(1);
        let other = r.backend().token(2);
        vec![
            r.resize(&input, 0.5, Kernel::Auto),
            r.resize_with_vscale(&input, 0.5, 2.0, Kernel::Cubic),
            r.thumbnail(&input, 64, 48, Interesting::Centre),
            r.mapim(&input, &other),
            r.maplut(&input, &other),
            r.affine(&input, AffineMatrix::IDENTITY, Interpolate::Bilinear),
        ]
    }

    #[test]
    fn test_success_returns_backend_handle() {
        let r = resampler(Scripted::ok());
        let out = r.resize(&r.backend().token(1), 0.5, Kernel::Nearest).unwrap();
        assert_eq!(out.id, 99);
    }

    #[test]
    fn test_every_success_yields_output() {
        let r = resampler(Scripted::ok());
        for result in run_all(&r) {
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_every_failure_carries_native_text() {
        for result in run_all(&resampler(Scripted::failing(-1, ""))) {
            assert!(matches!(result, Err(Error::Native { .. })));
        }

        let r = resampler(Scripted::failing(-1, "vips_resize: out of memory\n"));
        let err = r.resize(&r.backend().token(1), 0.5, Kernel::Auto).unwrap_err();
        match err {
            Error::Native {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, OP_RESIZE);
                assert_eq!(status, -1);
                assert_eq!(message, "vips_resize: out of memory");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // error buffer was drained
        assert_eq!(r.backend().error.borrow().as_str(), "");
    }

    #[test]
    fn test_failure_releases_partial_output() {
        let r = resampler(Scripted::new(1, true, "vips_affine: bad"));
        let input = r.backend().token(1);
        let drops = Rc::clone(&r.backend().drops);
        assert!(r.affine(&input, AffineMatrix::IDENTITY, Interpolate::Nearest).is_err());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_zero_status_without_output_is_an_error() {
        let r = resampler(Scripted::new(0, false, ""));
        let err = r.maplut(&r.backend().token(1), &r.backend().token(2)).unwrap_err();
        assert!(matches!(err, Error::MissingOutput { operation: OP_MAPLUT }));
    }

    #[test]
    fn test_counters_increment_once_per_call() {
        for backend in [Scripted::ok(), Scripted::failing(-1, "boom")] {
            let r = resampler(backend);
            run_all(&r);
            let counts = r.counters().snapshot();
            assert_eq!(counts.get(OP_RESIZE), Some(&2));
            assert_eq!(counts.get(OP_THUMBNAIL), Some(&1));
            assert_eq!(counts.get(OP_MAPIM), Some(&1));
            assert_eq!(counts.get(OP_MAPLUT), Some(&1));
            assert_eq!(counts.get(OP_AFFINE), Some(&1));
        }
    }

    #[test]
    fn test_rejected_arguments_are_still_counted() {
        let r = resampler(Scripted::ok());
        let input = r.backend().token(1);
        assert!(matches!(
            r.resize(&input, f64::NAN, Kernel::Auto),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(r.thumbnail(&input, 0, 10, Interesting::None).is_err());
        assert!(r.thumbnail(&input, u32::MAX, 10, Interesting::None).is_err());
        assert!(r
            .affine(&input, AffineMatrix::new(1.0, f64::INFINITY, 0.0, 1.0), Interpolate::Bicubic)
            .is_err());

        assert_eq!(r.counters().get(OP_RESIZE), 1);
        assert_eq!(r.counters().get(OP_THUMBNAIL), 2);
        assert_eq!(r.counters().get(OP_AFFINE), 1);
        assert!(r.backend().seen.borrow().is_empty());
    }

    #[test]
    fn test_auto_kernel_is_resolved_before_marshaling() {
        let r = resampler(Scripted::ok());
        let input = r.backend().token(1);

        r.resize(&input, 0.25, Kernel::Auto).unwrap();
        assert_eq!(r.backend().last(), "resize 1 0.25 -1 5");

        r.resize_with_vscale(&input, 0.5, 0.75, Kernel::Auto).unwrap();
        assert_eq!(r.backend().last(), "resize 1 0.5 0.75 5");

        r.resize(&input, 2.0, Kernel::Mitchell).unwrap();
        assert_eq!(r.backend().last(), "resize 1 2 -1 3");
    }

    #[test]
    fn test_thumbnail_marshaling() {
        let r = resampler(Scripted::ok());
        let input = r.backend().token(1);

        r.thumbnail(&input, 300, 200, Interesting::Attention).unwrap();
        assert_eq!(r.backend().last(), "thumbnail 1 300 200 3");

        r.thumbnail(&input, 128, 0, Interesting::None).unwrap();
        assert_eq!(r.backend().last(), "thumbnail 1 128 128 0");
    }

    #[test]
    fn test_affine_marshaling() {
        let r = resampler(Scripted::ok());
        let input = r.backend().token(1);
        r.affine(&input, AffineMatrix::scale(2.0, 3.0), Interpolate::Nohalo)
            .unwrap();
        assert_eq!(r.backend().last(), "affine 1 [2.0, 0.0, 0.0, 3.0] nohalo");
    }

    #[test]
    fn test_rotate_matrix() {
        let m = AffineMatrix::rotate(90.0);
        assert!((m.a).abs() < 1e-12);
        assert!((m.b - 1.0).abs() < 1e-12);
        assert!((m.c + 1.0).abs() < 1e-12);
        assert_eq!(AffineMatrix::default(), AffineMatrix::IDENTITY);
    }

    #[test]
    fn test_new_uses_global_counters() {
        let r = Resampler::new(Scripted::ok());
        assert!(Arc::ptr_eq(r.counters(), &op_counters()));
    }

    #[test]
    fn test_image_backend_end_to_end() {
        let r = Resampler::with_counters(ImageBackend, Arc::new(OpCounters::new()));
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 600, Luma([128])));

        let out = r.resize(&img, 0.5, Kernel::Auto).unwrap();
        assert_eq!((out.width(), out.height()), (400, 300));

        let thumb = r.thumbnail(&img, 100, 0, Interesting::Centre).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 100));

        let err = r.resize(&img, 0.5, Kernel::Mitchell).unwrap_err();
        assert!(err.to_string().contains("unsupported kernel mitchell"));
        assert_eq!(r.counters().get(OP_RESIZE), 2);
    }
}
