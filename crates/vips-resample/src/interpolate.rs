//! Interpolators for geometric transforms and crop strategies for thumbnails.

use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::kernel::UnknownName;

/// Pixel estimation method used by `affine`.
///
/// libvips builds interpolators from a nickname, so the native side of this
/// enum is a C string rather than an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolate {
    #[default]
    Bicubic,
    Bilinear,
    Nohalo,
    Nearest,
}

impl Interpolate {
    pub const ALL: [Interpolate; 4] = [
        Interpolate::Bicubic,
        Interpolate::Bilinear,
        Interpolate::Nohalo,
        Interpolate::Nearest,
    ];

    /// Nickname understood by `vips_interpolate_new`.
    pub fn nickname(self) -> &'static CStr {
        match self {
            Interpolate::Bicubic => c"bicubic",
            Interpolate::Bilinear => c"bilinear",
            Interpolate::Nohalo => c"nohalo",
            Interpolate::Nearest => c"nearest",
        }
    }

    pub fn from_nickname(nickname: &CStr) -> Option<Interpolate> {
        Interpolate::ALL
            .into_iter()
            .find(|i| i.nickname() == nickname)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interpolate::Bicubic => "bicubic",
            Interpolate::Bilinear => "bilinear",
            Interpolate::Nohalo => "nohalo",
            Interpolate::Nearest => "nearest",
        }
    }
}

impl fmt::Display for Interpolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interpolate {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interpolate::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownName {
                kind: "interpolator",
                name: s.to_owned(),
            })
    }
}

/// Crop strategy for `thumbnail`, mirroring `VipsInteresting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interesting {
    /// Shrink to fit, never crop.
    #[default]
    None,
    Centre,
    Entropy,
    Attention,
    /// Keep the top-left corner.
    Low,
    /// Keep the bottom-right corner.
    High,
    All,
}

impl Interesting {
    pub const ALL: [Interesting; 7] = [
        Interesting::None,
        Interesting::Centre,
        Interesting::Entropy,
        Interesting::Attention,
        Interesting::Low,
        Interesting::High,
        Interesting::All,
    ];

    pub fn native(self) -> i32 {
        match self {
            Interesting::None => 0,
            Interesting::Centre => 1,
            Interesting::Entropy => 2,
            Interesting::Attention => 3,
            Interesting::Low => 4,
            Interesting::High => 5,
            Interesting::All => 6,
        }
    }

    pub fn from_native(value: i32) -> Option<Interesting> {
        Interesting::ALL.into_iter().find(|i| i.native() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interesting::None => "none",
            Interesting::Centre => "centre",
            Interesting::Entropy => "entropy",
            Interesting::Attention => "attention",
            Interesting::Low => "low",
            Interesting::High => "high",
            Interesting::All => "all",
        }
    }
}

impl fmt::Display for Interesting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interesting {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // libvips accepts the American spelling as an alias
        let s = if s.eq_ignore_ascii_case("center") { "centre" } else { s };
        Interesting::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName {
                kind: "crop strategy",
                name: s.to_owned(),
            })
    }
}
