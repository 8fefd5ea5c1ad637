//! Pure-Rust engine built on the `image` and `imageproc` crates.
//!
//! It speaks the same convention as libvips (status code plus a thread-local
//! last-error buffer), so the call-through layer cannot tell the two apart.
//! Pixel work is handed to `image::imageops` resizing and
//! `imageproc::geometric_transformations` warping.

use std::cell::RefCell;
use std::ffi::CStr;
use std::fmt::Display;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into, warp_into_with};
use tracing::debug;

use super::{ImageFiles, NativeBackend, NativeCall};
use crate::error::{Error, Result};
use crate::interpolate::{Interesting, Interpolate};
use crate::kernel::Kernel;

/// Largest output side accepted, matching libvips' `VIPS_MAX_COORD`.
const MAX_DIMENSION: u32 = 10_000_000;

/// Largest output area, so oversized requests fail instead of aborting on allocation.
const MAX_PIXELS: u64 = 1 << 28;

const FAILED: i32 = -1;

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

fn push_error(domain: &str, message: impl Display) {
    LAST_ERROR.with(|buf| {
        buf.borrow_mut()
            .push_str(&format!("{domain}: {message}\n"));
    });
}

type Op = std::result::Result<DynamicImage, String>;

fn finish(domain: &str, result: Op) -> NativeCall<DynamicImage> {
    match result {
        Ok(out) => NativeCall::ok(out),
        Err(message) => {
            push_error(domain, message);
            NativeCall::failed(FAILED)
        }
    }
}

/// Apply `$body` to the concrete 8-bit buffer inside a `DynamicImage`,
/// rewrapping the result in the same variant. Other layouts fail the
/// enclosing operation.
macro_rules! map_u8_buffer {
    ($img:expr, $buf:ident => $body:expr) => {
        match $img {
            DynamicImage::ImageLuma8($buf) => DynamicImage::ImageLuma8($body),
            DynamicImage::ImageLumaA8($buf) => DynamicImage::ImageLumaA8($body),
            DynamicImage::ImageRgb8($buf) => DynamicImage::ImageRgb8($body),
            DynamicImage::ImageRgba8($buf) => DynamicImage::ImageRgba8($body),
            other => return Err(unsupported_format("input", other)),
        }
    };
}

/// Engine backed by `image::DynamicImage` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBackend;

impl ImageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl NativeBackend for ImageBackend {
    type Image = DynamicImage;

    fn name(&self) -> &str {
        "image"
    }

    fn resize(&self, input: &DynamicImage, scale: f64, vscale: f64, kernel: i32) -> NativeCall<DynamicImage> {
        finish("vips_resize", resize(input, scale, vscale, kernel))
    }

    fn thumbnail(&self, input: &DynamicImage, width: i32, height: i32, crop: i32) -> NativeCall<DynamicImage> {
        finish("vips_thumbnail", thumbnail(input, width, height, crop))
    }

    fn mapim(&self, input: &DynamicImage, index: &DynamicImage) -> NativeCall<DynamicImage> {
        finish("vips_mapim", mapim(input, index))
    }

    fn maplut(&self, input: &DynamicImage, lut: &DynamicImage) -> NativeCall<DynamicImage> {
        finish("vips_maplut", maplut(input, lut))
    }

    fn affine(&self, input: &DynamicImage, matrix: [f64; 4], interpolate: &CStr) -> NativeCall<DynamicImage> {
        finish("vips_affine", affine(input, matrix, interpolate))
    }

    fn take_error(&self) -> String {
        LAST_ERROR.with(|buf| std::mem::take(&mut *buf.borrow_mut()))
    }
}

impl ImageFiles for ImageBackend {
    fn load(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path)
            .map_err(|e| Error::native("load", FAILED, format!("{}: {e}", path.display())))
    }

    fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        image
            .save(path)
            .map_err(|e| Error::native("save", FAILED, format!("{}: {e}", path.display())))
    }
}

fn scaled(len: u32, factor: f64) -> std::result::Result<u32, String> {
    let v = (f64::from(len) * factor).round();
    if v > f64::from(MAX_DIMENSION) {
        return Err(format!("output dimension {v} exceeds {MAX_DIMENSION}"));
    }
    Ok((v as u32).max(1))
}

fn check_area(width: u32, height: u32) -> std::result::Result<(), String> {
    let area = u64::from(width) * u64::from(height);
    if area > MAX_PIXELS {
        return Err(format!(
            "output of {width}x{height} pixels exceeds {MAX_PIXELS} pixels"
        ));
    }
    Ok(())
}

fn unsupported_format(what: &str, img: &DynamicImage) -> String {
    format!("unsupported {what} format {:?}, expected 8-bit", img.color())
}

fn filter_for(kernel: i32) -> std::result::Result<FilterType, String> {
    match Kernel::from_native(kernel) {
        Some(Kernel::Nearest) => Ok(FilterType::Nearest),
        Some(Kernel::Linear) => Ok(FilterType::Triangle),
        Some(Kernel::Cubic) => Ok(FilterType::CatmullRom),
        Some(Kernel::Lanczos3) => Ok(FilterType::Lanczos3),
        Some(k @ (Kernel::Mitchell | Kernel::Lanczos2 | Kernel::Auto)) => {
            Err(format!("unsupported kernel {k}"))
        }
        None => Err(format!("unknown kernel {kernel}")),
    }
}

fn check_not_empty(input: &DynamicImage) -> std::result::Result<(), String> {
    if input.width() == 0 || input.height() == 0 {
        return Err("input image is empty".into());
    }
    Ok(())
}

fn resize(input: &DynamicImage, scale: f64, vscale: f64, kernel: i32) -> Op {
    check_not_empty(input)?;
    let vscale = if vscale < 0.0 { scale } else { vscale };
    if !(scale.is_finite() && scale > 0.0 && vscale.is_finite() && vscale > 0.0) {
        return Err(format!("parameter scale out of range: {scale} x {vscale}"));
    }
    let filter = filter_for(kernel)?;
    let width = scaled(input.width(), scale)?;
    let height = scaled(input.height(), vscale)?;
    check_area(width, height)?;

    debug!(
        orig_w = input.width(),
        orig_h = input.height(),
        width,
        height,
        ?filter,
        "Resizing image"
    );

    Ok(input.resize_exact(width, height, filter))
}

fn thumbnail(input: &DynamicImage, width: i32, height: i32, crop: i32) -> Op {
    check_not_empty(input)?;
    if width <= 0 {
        return Err(format!("bad width {width}"));
    }
    // unset height means a square bounding box
    let height = if height <= 0 { width } else { height };
    let (box_w, box_h) = (width.unsigned_abs(), height.unsigned_abs());
    let crop = Interesting::from_native(crop).ok_or_else(|| format!("unknown crop strategy {crop}"))?;

    let sx = f64::from(box_w) / f64::from(input.width());
    let sy = f64::from(box_h) / f64::from(input.height());

    match crop {
        Interesting::None | Interesting::All => {
            let s = sx.min(sy);
            let w = scaled(input.width(), s)?.min(box_w);
            let h = scaled(input.height(), s)?.min(box_h);
            check_area(w, h)?;
            debug!(w, h, "Thumbnail shrink to fit");
            Ok(input.resize_exact(w, h, FilterType::Lanczos3))
        }
        Interesting::Centre | Interesting::Low | Interesting::High => {
            let s = sx.max(sy);
            let w = scaled(input.width(), s)?.max(box_w);
            let h = scaled(input.height(), s)?.max(box_h);
            check_area(w, h)?;
            let filled = input.resize_exact(w, h, FilterType::Lanczos3);
            let (x, y) = match crop {
                Interesting::Low => (0, 0),
                Interesting::High => (w - box_w, h - box_h),
                _ => ((w - box_w) / 2, (h - box_h) / 2),
            };
            debug!(w, h, x, y, %crop, "Thumbnail fill and crop");
            Ok(filled.crop_imm(x, y, box_w, box_h))
        }
        Interesting::Entropy | Interesting::Attention => {
            Err(format!("crop strategy {crop} is not supported by this engine"))
        }
    }
}

/// Output takes the index image's size; bands 0 and 1 of each index pixel
/// hold the input coordinate to sample.
fn mapim(input: &DynamicImage, index: &DynamicImage) -> Op {
    let bands = index.color().channel_count();
    if bands < 2 {
        return Err(format!("index image needs at least 2 bands, got {bands}"));
    }
    let coords = match index {
        DynamicImage::ImageLumaA8(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgb8(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgba8(buf) => coordinate_pairs(buf),
        DynamicImage::ImageLumaA16(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgb16(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgba16(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgb32F(buf) => coordinate_pairs(buf),
        DynamicImage::ImageRgba32F(buf) => coordinate_pairs(buf),
        other => return Err(unsupported_format("index", other)),
    };
    let (width, height) = index.dimensions();
    check_area(width, height)?;
    let row = width as usize;
    let lookup = |x: f32, y: f32| coords[y as usize * row + x as usize];

    Ok(map_u8_buffer!(input, buf => {
        let blank = blank_pixel();
        let mut out = ImageBuffer::from_pixel(width, height, blank);
        warp_into_with(buf, lookup, Interpolation::Bilinear, blank, &mut out);
        out
    }))
}

/// Raw values of bands 0 and 1, without any range rescaling.
fn coordinate_pairs<P>(buf: &ImageBuffer<P, Vec<P::Subpixel>>) -> Vec<(f32, f32)>
where
    P: Pixel,
    P::Subpixel: Into<f32>,
{
    buf.pixels()
        .map(|p| {
            let c = p.channels();
            (c[0].into(), c[1].into())
        })
        .collect()
}

fn maplut(input: &DynamicImage, lut: &DynamicImage) -> Op {
    if !is_u8(input) {
        return Err(unsupported_format("input", input));
    }
    if !is_u8(lut) {
        return Err(unsupported_format("lut", lut));
    }
    if lut.width() != 256 || lut.height() != 1 {
        return Err(format!(
            "lut must be 256x1, got {}x{}",
            lut.width(),
            lut.height()
        ));
    }
    let lut_bands = usize::from(lut.color().channel_count());
    let in_bands = usize::from(input.color().channel_count());
    if lut_bands != 1 && lut_bands != in_bands {
        return Err(format!(
            "lut has {lut_bands} bands, input has {in_bands}"
        ));
    }
    let table = lut.as_bytes();

    Ok(map_u8_buffer!(input, buf => apply_lut(buf, table, lut_bands)))
}

fn affine(input: &DynamicImage, [a, b, c, d]: [f64; 4], interpolate: &CStr) -> Op {
    check_not_empty(input)?;
    let interpolation = match Interpolate::from_nickname(interpolate) {
        Some(Interpolate::Nearest) => Interpolation::Nearest,
        Some(Interpolate::Bilinear) => Interpolation::Bilinear,
        Some(Interpolate::Bicubic) => Interpolation::Bicubic,
        Some(Interpolate::Nohalo) | None => {
            return Err(format!(
                "interpolator {} is not supported by this engine",
                interpolate.to_string_lossy()
            ));
        }
    };
    if (a * d - b * c).abs() < f64::EPSILON {
        return Err("singular or near-singular matrix".into());
    }

    // output size spans the pixel edges, the offset maps the first and
    // last pixel indices onto the output grid
    let (w, h) = (f64::from(input.width()), f64::from(input.height()));
    let (min_x, max_x, min_y, max_y) = transformed_bounds([a, b, c, d], w, h);
    let out_w = scaled(1, max_x - min_x)?;
    let out_h = scaled(1, max_y - min_y)?;
    check_area(out_w, out_h)?;
    let (min_x, _, min_y, _) = transformed_bounds([a, b, c, d], w - 1.0, h - 1.0);

    let matrix = Projection::from_matrix([
        a as f32, b as f32, 0.0, c as f32, d as f32, 0.0, 0.0, 0.0, 1.0,
    ])
    .ok_or("matrix is not invertible")?;
    let projection = Projection::translate(-min_x as f32, -min_y as f32) * matrix;

    debug!(out_w, out_h, interpolate = %interpolate.to_string_lossy(), "Affine transform");

    Ok(map_u8_buffer!(input, buf => {
        let blank = blank_pixel();
        let mut out = ImageBuffer::from_pixel(out_w, out_h, blank);
        warp_into(buf, &projection, interpolation, blank, &mut out);
        out
    }))
}

/// Bounds of the rectangle `(0, 0)..(w, h)` under the matrix.
fn transformed_bounds([a, b, c, d]: [f64; 4], w: f64, h: f64) -> (f64, f64, f64, f64) {
    [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
        .map(|(x, y)| (a * x + b * y, c * x + d * y))
        .iter()
        .fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(lx, hx, ly, hy), &(x, y)| (lx.min(x), hx.max(x), ly.min(y), hy.max(y)),
        )
}

fn is_u8(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
    )
}

fn blank_pixel<P: Pixel<Subpixel = u8>>() -> P {
    *P::from_slice(&[0u8; 4][..usize::from(P::CHANNEL_COUNT)])
}

fn apply_lut<P>(src: &ImageBuffer<P, Vec<u8>>, table: &[u8], lut_bands: usize) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out = src.clone();
    for px in out.pixels_mut() {
        for (band, v) in px.channels_mut().iter_mut().enumerate() {
            let column = if lut_bands == 1 { 0 } else { band };
            *v = table[usize::from(*v) * lut_bands + column];
        }
    }
    out
}
