//! libvips engine: startup through `libvips::VipsApp`, operations through
//! the raw entry points in [`crate::ffi`].

use std::ffi::{CStr, CString, c_int};
use std::fmt;
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use libvips::VipsApp;
use tracing::{debug, info};

use super::{ImageFiles, NativeBackend, NativeCall};
use crate::config::VipsConfig;
use crate::error::{Error, Result};
use crate::ffi;

const FAILED: i32 = -1;

static STARTUP: OnceLock<std::result::Result<VipsApp, String>> = OnceLock::new();

/// Owned reference to a `VipsImage`; unreffed on drop.
#[derive(Debug)]
pub struct VipsHandle(NonNull<ffi::VipsImage>);

impl VipsHandle {
    /// Take ownership of one reference to `ptr`. Returns `None` for null.
    ///
    /// # Safety
    /// `ptr` must be null or a live `VipsImage` whose reference the caller owns.
    pub unsafe fn from_raw(ptr: *mut ffi::VipsImage) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut ffi::VipsImage {
        self.0.as_ptr()
    }
}

impl Drop for VipsHandle {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference, released exactly once here.
        unsafe { ffi::g_object_unref(self.0.as_ptr().cast()) }
    }
}

// SAFETY: VipsImage is a reference-counted GObject and libvips permits moving
// images between threads; the handle offers no shared mutation.
unsafe impl Send for VipsHandle {}

/// Read and clear the libvips error buffer.
fn take_error_buffer() -> String {
    // SAFETY: vips_error_buffer returns a NUL-terminated string owned by libvips,
    // valid until the next vips_error_clear, and we copy it before clearing.
    unsafe {
        let ptr = ffi::vips_error_buffer();
        let message = if ptr.is_null() {
            String::new()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        };
        ffi::vips_error_clear();
        message
    }
}

/// Run a libvips operation writing into an output pointer.
fn call(op: impl FnOnce(*mut *mut ffi::VipsImage) -> c_int) -> NativeCall<VipsHandle> {
    let mut out: *mut ffi::VipsImage = ptr::null_mut();
    let status = op(&mut out);
    // SAFETY: libvips either leaves `out` null or transfers one reference to us.
    let out = unsafe { VipsHandle::from_raw(out) };
    NativeCall { status, out }
}

fn start(config: &VipsConfig) -> std::result::Result<VipsApp, String> {
    let app = VipsApp::new(&config.program_name, false).map_err(|e| {
        let detail = take_error_buffer();
        if detail.is_empty() { e.to_string() } else { detail }
    })?;

    if let Some(threads) = config.concurrency {
        app.concurrency_set(c_int::try_from(threads).unwrap_or(c_int::MAX));
    }
    if let Some(ops) = config.cache_max_ops {
        app.cache_set_max(c_int::try_from(ops).unwrap_or(c_int::MAX));
    }
    if let Some(mem) = config.cache_max_mem {
        app.cache_set_max_mem(mem);
    }

    info!(
        program = %config.program_name,
        concurrency = ?config.concurrency,
        "libvips started"
    );
    Ok(app)
}

/// The system libvips. Construct with [`LibVips::startup`].
#[derive(Clone, Copy)]
pub struct LibVips {
    app: &'static VipsApp,
}

impl fmt::Debug for LibVips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibVips").finish_non_exhaustive()
    }
}

impl LibVips {
    /// Initialise libvips once per process. Later calls reuse the first
    /// outcome and ignore their configuration.
    pub fn startup(config: &VipsConfig) -> Result<Self> {
        config.validate()?;
        match STARTUP.get_or_init(|| start(config)) {
            Ok(app) => Ok(Self { app }),
            Err(message) => Err(Error::Startup(message.clone())),
        }
    }
}

impl NativeBackend for LibVips {
    type Image = VipsHandle;

    fn name(&self) -> &str {
        "libvips"
    }

    fn resize(&self, input: &VipsHandle, scale: f64, vscale: f64, kernel: i32) -> NativeCall<VipsHandle> {
        call(|out| unsafe {
            // SAFETY: input is live, option names are static C strings, list is NULL-terminated.
            if vscale < 0.0 {
                ffi::vips_resize(input.as_ptr(), out, scale, c"kernel".as_ptr(), kernel, ffi::END)
            } else {
                ffi::vips_resize(
                    input.as_ptr(),
                    out,
                    scale,
                    c"vscale".as_ptr(),
                    vscale,
                    c"kernel".as_ptr(),
                    kernel,
                    ffi::END,
                )
            }
        })
    }

    fn thumbnail(&self, input: &VipsHandle, width: i32, height: i32, crop: i32) -> NativeCall<VipsHandle> {
        call(|out| unsafe {
            // SAFETY: as for resize.
            ffi::vips_thumbnail_image(
                input.as_ptr(),
                out,
                width,
                c"height".as_ptr(),
                height,
                c"crop".as_ptr(),
                crop,
                ffi::END,
            )
        })
    }

    fn mapim(&self, input: &VipsHandle, index: &VipsHandle) -> NativeCall<VipsHandle> {
        // SAFETY: both images are live for the duration of the call.
        call(|out| unsafe { ffi::vips_mapim(input.as_ptr(), out, index.as_ptr(), ffi::END) })
    }

    fn maplut(&self, input: &VipsHandle, lut: &VipsHandle) -> NativeCall<VipsHandle> {
        // SAFETY: both images are live for the duration of the call.
        call(|out| unsafe { ffi::vips_maplut(input.as_ptr(), out, lut.as_ptr(), ffi::END) })
    }

    fn affine(&self, input: &VipsHandle, [a, b, c, d]: [f64; 4], interpolate: &CStr) -> NativeCall<VipsHandle> {
        // SAFETY: nickname is NUL-terminated; a null result means libvips set an error.
        let interpolator = unsafe { ffi::vips_interpolate_new(interpolate.as_ptr()) };
        if interpolator.is_null() {
            return NativeCall::failed(FAILED);
        }

        let result = call(|out| unsafe {
            // SAFETY: input and interpolator are live; the operation takes its own ref.
            ffi::vips_affine(
                input.as_ptr(),
                out,
                a,
                b,
                c,
                d,
                c"interpolate".as_ptr(),
                interpolator,
                ffi::END,
            )
        });

        // SAFETY: we own the reference returned by vips_interpolate_new.
        unsafe { ffi::g_object_unref(interpolator.cast()) };
        result
    }

    fn take_error(&self) -> String {
        let message = self.app.error_buffer().unwrap_or_default().to_owned();
        self.app.error_clear();
        message
    }
}

fn c_path(operation: &'static str, path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::invalid(operation, format!("non UTF-8 path {}", path.display())))?;
    CString::new(s).map_err(|_| Error::invalid(operation, "path contains NUL"))
}

impl ImageFiles for LibVips {
    fn load(&self, path: &Path) -> Result<VipsHandle> {
        let name = c_path("load", path)?;
        debug!(path = %path.display(), "Loading image");
        // SAFETY: name is NUL-terminated; the returned image (if any) is ours.
        let handle = unsafe { VipsHandle::from_raw(ffi::vips_image_new_from_file(name.as_ptr(), ffi::END)) };
        handle.ok_or_else(|| Error::native("load", FAILED, take_error_buffer()))
    }

    fn save(&self, image: &VipsHandle, path: &Path) -> Result<()> {
        let name = c_path("save", path)?;
        // SAFETY: image is live and name is NUL-terminated.
        let status = unsafe { ffi::vips_image_write_to_file(image.as_ptr(), name.as_ptr(), ffi::END) };
        if status != 0 {
            return Err(Error::native("save", status, take_error_buffer()));
        }
        Ok(())
    }
}
