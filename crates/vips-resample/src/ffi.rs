//! Raw libvips / GObject entry points used by the `native` backend, taken
//! from the `libvips` crate's generated bindings.
//!
//! Optional arguments follow the libvips varargs convention: name/value
//! pairs terminated by a NULL pointer.

use std::ffi::c_char;

pub use libvips::bindings::{
    VipsImage, VipsInterpolate, g_object_unref, vips_affine, vips_error_buffer, vips_error_clear,
    vips_image_new_from_file, vips_image_write_to_file, vips_interpolate_new, vips_mapim,
    vips_maplut, vips_resize, vips_thumbnail_image,
};

/// Varargs list terminator.
pub const END: *const c_char = std::ptr::null();
