//! Unit codes stored alongside float columns, and conversion between them.
//!
//! A unit code is a bitmask. The low four bits are independent scale
//! families, so a conversion is the product of at most four factors:
//!
//! | Bit | Set | Clear | Factor |
//! |-----|-----|-------|--------|
//! | 0 | degrees | radians | π/180 |
//! | 1 | arcminutes | degrees | 60 |
//! | 2 | arcseconds | arcminutes | 60 |
//! | 3 | years | days | 365.25 |
//!
//! A requested unit of zero means "leave the stored value alone".

use std::fmt;
use std::ops::BitOr;

pub const DEG_TO_RAD: f64 = 1.745329251994329576923691e-2;
pub const RAD_TO_DEG: f64 = 57.29577951308232087679815;
pub const DAYS_PER_JULIAN_YEAR: f64 = 365.25;

const SIXTY: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit(pub u32);

impl Unit {
    /// No conversion requested, or a dimensionless stored value.
    pub const NONE: Unit = Unit(0);
    pub const DEG: Unit = Unit(1);
    pub const ARCMIN: Unit = Unit(1 | 2);
    pub const ARCSEC: Unit = Unit(1 | 2 | 4);
    pub const YEAR: Unit = Unit(8);
    /// Radians, requested explicitly. The marker bit lies outside the four
    /// scale families so it converts like a bare zero source while still
    /// being a non-zero request.
    pub const RAD: Unit = Unit(1 << 16);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    const fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

impl From<u32> for Unit {
    fn from(bits: u32) -> Self {
        Unit(bits)
    }
}

impl BitOr for Unit {
    type Output = Unit;

    fn bitor(self, rhs: Unit) -> Unit {
        Unit(self.0 | rhs.0)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Unit::NONE => write!(f, "-"),
            Unit::DEG => write!(f, "deg"),
            Unit::ARCMIN => write!(f, "arcmin"),
            Unit::ARCSEC => write!(f, "arcsec"),
            Unit::YEAR => write!(f, "yr"),
            Unit::RAD => write!(f, "rad"),
            Unit(bits) => write!(f, "0x{:x}", bits),
        }
    }
}

/// Convert `value` from unit `src` to unit `dst`.
pub fn convert(src: Unit, dst: Unit, value: f64) -> f64 {
    if dst.is_none() || src == dst {
        return value;
    }

    let mut v = value;

    if src.has(1) && !dst.has(1) {
        v *= DEG_TO_RAD;
    }
    if !src.has(1) && dst.has(1) {
        v *= RAD_TO_DEG;
    }

    if src.has(2) && !dst.has(2) {
        v /= SIXTY;
    }
    if !src.has(2) && dst.has(2) {
        v *= SIXTY;
    }

    if src.has(4) && !dst.has(4) {
        v /= SIXTY;
    }
    if !src.has(4) && dst.has(4) {
        v *= SIXTY;
    }

    if src.has(8) && !dst.has(8) {
        v *= DAYS_PER_JULIAN_YEAR;
    }
    if !src.has(8) && dst.has(8) {
        v /= DAYS_PER_JULIAN_YEAR;
    }

    v
}
