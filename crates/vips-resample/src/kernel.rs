//! Resampling kernels accepted by `resize`.
//!
//! Values mirror libvips' `VipsKernel` enum. [`Kernel::Auto`] is a host-side
//! sentinel that never reaches the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// Let the binding pick; resolves to [`Kernel::Lanczos3`].
    #[default]
    Auto,
    Nearest,
    Linear,
    Cubic,
    Mitchell,
    Lanczos2,
    Lanczos3,
}

/// Native value of the auto sentinel. Only ever seen on the host side.
pub const KERNEL_AUTO: i32 = -1;

impl Kernel {
    /// Every kernel, sentinel included.
    pub const ALL: [Kernel; 7] = [
        Kernel::Auto,
        Kernel::Nearest,
        Kernel::Linear,
        Kernel::Cubic,
        Kernel::Mitchell,
        Kernel::Lanczos2,
        Kernel::Lanczos3,
    ];

    /// Replace [`Kernel::Auto`] with the default libvips recommends.
    pub fn resolve(self) -> Kernel {
        match self {
            Kernel::Auto => Kernel::Lanczos3,
            other => other,
        }
    }

    /// Native `VipsKernel` constant for this kernel after resolving `Auto`.
    pub fn native(self) -> i32 {
        match self.resolve() {
            Kernel::Nearest => 0,
            Kernel::Linear => 1,
            Kernel::Cubic => 2,
            Kernel::Mitchell => 3,
            Kernel::Lanczos2 => 4,
            Kernel::Lanczos3 | Kernel::Auto => 5,
        }
    }

    /// Inverse of [`Kernel::native`], accepting the auto sentinel.
    pub fn from_native(value: i32) -> Option<Kernel> {
        match value {
            KERNEL_AUTO => Some(Kernel::Auto),
            0 => Some(Kernel::Nearest),
            1 => Some(Kernel::Linear),
            2 => Some(Kernel::Cubic),
            3 => Some(Kernel::Mitchell),
            4 => Some(Kernel::Lanczos2),
            5 => Some(Kernel::Lanczos3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kernel::Auto => "auto",
            Kernel::Nearest => "nearest",
            Kernel::Linear => "linear",
            Kernel::Cubic => "cubic",
            Kernel::Mitchell => "mitchell",
            Kernel::Lanczos2 => "lanczos2",
            Kernel::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a symbolic name matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} name: {name:?}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

impl FromStr for Kernel {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kernel::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownName {
                kind: "kernel",
                name: s.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_auto_resolves_to_lanczos3() {
        assert_eq!(Kernel::Auto.resolve(), Kernel::Lanczos3);
        assert_eq!(Kernel::Auto.native(), Kernel::Lanczos3.native());
        assert_eq!(Kernel::default(), Kernel::Auto);
    }

    #[test]
    fn test_concrete_kernels_resolve_to_themselves() {
        for k in Kernel::ALL.into_iter().filter(|k| *k != Kernel::Auto) {
            assert_eq!(k.resolve(), k);
        }
    }

    #[test]
    fn test_native_constants_are_distinct() {
        let concrete: Vec<_> = Kernel::ALL
            .into_iter()
            .filter(|k| *k != Kernel::Auto)
            .collect();
        let codes: HashSet<i32> = concrete.iter().map(|k| k.native()).collect();
        assert_eq!(codes.len(), concrete.len());
        assert_eq!(Kernel::Nearest.native(), 0);
        assert_eq!(Kernel::Lanczos3.native(), 5);
    }

    #[test]
    fn test_from_native_inverts_native() {
        for k in Kernel::ALL.into_iter().filter(|k| *k != Kernel::Auto) {
            assert_eq!(Kernel::from_native(k.native()), Some(k));
        }
        assert_eq!(Kernel::from_native(KERNEL_AUTO), Some(Kernel::Auto));
        assert_eq!(Kernel::from_native(6), None);
    }

    #[test]
    fn test_parses_names_case_insensitively() {
        assert_eq!("Lanczos2".parse::<Kernel>(), Ok(Kernel::Lanczos2));
        assert_eq!(" mitchell ".parse::<Kernel>(), Ok(Kernel::Mitchell));
        let err = "gaussian".parse::<Kernel>().unwrap_err();
        assert_eq!(err.to_string(), "unknown kernel name: \"gaussian\"");
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Kernel::Lanczos3).unwrap();
        assert_eq!(json, "\"lanczos3\"");
        let k: Kernel = serde_json::from_str("\"cubic\"").unwrap();
        assert_eq!(k, Kernel::Cubic);
    }
}
