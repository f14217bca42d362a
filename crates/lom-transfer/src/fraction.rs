//! Integer parts-per-million fraction representation.
//!
//! # Design invariant
//!
//! Every fraction on the conservation path is an integer count of
//! parts-per-million (`1.0 == 1_000_000 ppm`). Summing withdrawals is exact,
//! so `0.5 + 0.5` is exactly `1.0` and never `1.0000000000000002`.
//!
//! `f64` conversions happen **only** at the wire boundary:
//!
//! | Direction            | Function                 |
//! |----------------------|--------------------------|
//! | JSON body → internal | [`Fraction::from_f64`]   |
//! | internal → JSON body | [`Fraction::to_f64`]     |

/// Scale factor: 1.0 = 1_000_000 ppm.
pub const PPM_PER_UNIT: u32 = 1_000_000;

/// How far (in ppm) a wire value may sit from a whole ppm and still be
/// read as that ppm. Covers `f64` noise such as `0.1 * 1e6`, nothing more.
const PPM_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// FractionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FractionError {
    /// Input was `NaN` or infinite.
    NotFinite,
    /// Input was not in `(0, 1]`.
    OutOfRange { value: f64 },
    /// Input is not a whole number of ppm.
    FinerThanPpm { value: f64 },
}

impl std::fmt::Display for FractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinite => write!(f, "fraction must be a finite number"),
            Self::OutOfRange { value } => {
                write!(f, "fraction must lie in (0, 1], got {value}")
            }
            Self::FinerThanPpm { value } => {
                write!(f, "fraction {value} is finer than 1 ppm")
            }
        }
    }
}

impl std::error::Error for FractionError {}

// ---------------------------------------------------------------------------
// Fraction
// ---------------------------------------------------------------------------

/// A share of one container's content, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fraction(u32);

impl Fraction {
    pub const ZERO: Fraction = Fraction(0);
    pub const ONE: Fraction = Fraction(PPM_PER_UNIT);

    /// `None` when `ppm` exceeds one whole.
    pub fn from_ppm(ppm: u32) -> Option<Self> {
        (ppm <= PPM_PER_UNIT).then_some(Fraction(ppm))
    }

    pub fn ppm(&self) -> u32 {
        self.0
    }

    /// Parse a transfer fraction from the wire. Accepts `(0, 1]` only.
    ///
    /// The value must be a whole number of ppm; anything finer is rejected
    /// rather than rounded, so the conservation check sees the exact amount.
    pub fn from_f64(value: f64) -> Result<Self, FractionError> {
        if !value.is_finite() {
            return Err(FractionError::NotFinite);
        }
        if value <= 0.0 || value > 1.0 {
            return Err(FractionError::OutOfRange { value });
        }
        let scaled = value * PPM_PER_UNIT as f64;
        let whole = scaled.round();
        if (scaled - whole).abs() > PPM_TOLERANCE || whole < 1.0 {
            return Err(FractionError::FinerThanPpm { value });
        }
        Ok(Fraction((whole as u32).min(PPM_PER_UNIT)))
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / PPM_PER_UNIT as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `None` if the sum exceeds one whole.
    pub fn checked_add(self, rhs: Fraction) -> Option<Fraction> {
        self.0.checked_add(rhs.0).and_then(Fraction::from_ppm)
    }

    /// What is left of one whole after `self` has been taken.
    pub fn complement(self) -> Fraction {
        Fraction(PPM_PER_UNIT - self.0)
    }
}

impl std::fmt::Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
