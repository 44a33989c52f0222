//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers and small enums keep raw integers and booleans out
//! of the store and interpreter signatures.

use serde::Serialize;
use std::fmt;

/// Routine entry point address
///
/// Opaque to findspot: stable for the process lifetime and used only as the
/// store key and for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// What a hook invocation does to its record
///
/// Process-wide selector consulted on every hit. Any state can be reached
/// from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionMode {
    /// Leave collected data untouched
    #[default]
    Off,
    /// Count every tracked hit
    Collect,
    /// Reset the hit count of every tracked routine that fires
    Trim,
}

impl CollectionMode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Collect => 1,
            Self::Trim => 2,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8); unknown values map to `Off`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Collect,
            2 => Self::Trim,
            _ => Self::Off,
        }
    }
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "OFF",
            Self::Collect => "COLLECT",
            Self::Trim => "TRIM",
        };
        f.write_str(name)
    }
}

/// Whether the observed program's threads are currently suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeState {
    #[default]
    Running,
    Frozen,
}

/// Row order used by the report formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most hits first, ties in discovery order
    #[default]
    HitCount,
    /// Discovery order
    Chronological,
}

/// Which module list a filter command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Whitelist,
    Blacklist,
}
