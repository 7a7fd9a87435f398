//! Fixed-point decimal used for every ledger quantity
//!
//! Values are stored as `i64` with 8 implied decimals. Products and quotients
//! are computed in `i128` before rescaling, so two full-width operands never
//! overflow the intermediate.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Basis points in one whole (100%)
pub const MAX_BPS: u32 = 10_000;

/// Signed fixed-point decimal (8 decimals)
///
/// Human-readable formats (JSON) carry an exact decimal string; binary
/// formats carry the raw `i64`. Both round-trip every value.
///
/// ```
/// use options_risk_engine::Fixed;
///
/// let strike = Fixed::from_int(2400);
/// let amount = Fixed::from_f64(1.5);
/// assert_eq!(strike.mul(amount), Fixed::from_int(3600));
/// ```
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

static_assertions::const_assert_eq!(std::mem::size_of::<Fixed>(), 8);

impl Fixed {
    /// Number of implied decimals
    pub const DECIMALS: u32 = 8;

    /// Raw units per whole
    pub const SCALE: i64 = 100_000_000;

    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(Self::SCALE);
    pub const MAX: Fixed = Fixed(i64::MAX);

    /// Build from raw scaled units
    #[inline(always)]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw scaled units
    #[inline(always)]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Build from a whole number
    #[inline]
    pub const fn from_int(value: i64) -> Self {
        Self(value * Self::SCALE)
    }

    /// Build from a float, rounding to the nearest raw unit
    ///
    /// Non-finite input saturates (NaN maps to zero); use [`Fixed::try_from_f64`]
    /// when the input is not trusted.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self((value * Self::SCALE as f64).round() as i64)
    }

    /// Build from a float, rejecting NaN, infinities and out-of-range values
    pub fn try_from_f64(value: f64) -> crate::Result<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return Err(crate::Error::Calculation(format!(
                "value {} does not fit the fixed-point range",
                value
            )));
        }
        Ok(Self(scaled as i64))
    }

    /// Convert to `f64`
    #[inline(always)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline(always)]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// -1, 0 or 1 as a plain integer
    #[inline]
    pub const fn signum(self) -> i64 {
        self.0.signum()
    }

    /// Product, truncated toward zero
    #[inline]
    pub fn mul(self, other: Fixed) -> Fixed {
        Self::narrow((self.0 as i128 * other.0 as i128) / Self::SCALE as i128)
    }

    /// Quotient, truncated toward zero. Division by zero yields zero.
    #[inline]
    pub fn div(self, other: Fixed) -> Fixed {
        if other.0 == 0 {
            return Fixed::ZERO;
        }
        Self::narrow((self.0 as i128 * Self::SCALE as i128) / other.0 as i128)
    }

    /// `self * numerator / denominator` with a single `i128` intermediate
    #[inline]
    pub fn mul_div(self, numerator: Fixed, denominator: Fixed) -> Fixed {
        if denominator.0 == 0 {
            return Fixed::ZERO;
        }
        Self::narrow((self.0 as i128 * numerator.0 as i128) / denominator.0 as i128)
    }

    /// Scale by basis points (`10_000` = 100%)
    #[inline]
    pub fn bps(self, bps: u32) -> Fixed {
        Self::narrow((self.0 as i128 * bps as i128) / MAX_BPS as i128)
    }

    /// Scale by basis points, rounding away from zero
    #[inline]
    pub fn bps_ceil(self, bps: u32) -> Fixed {
        let product = self.0 as i128 * bps as i128;
        let denominator = MAX_BPS as i128;
        let quotient = product / denominator;
        if product % denominator != 0 {
            Self::narrow(quotient + product.signum())
        } else {
            Self::narrow(quotient)
        }
    }

    #[inline]
    pub fn checked_add(self, other: Fixed) -> Option<Fixed> {
        self.0.checked_add(other.0).map(Fixed)
    }

    #[inline]
    pub fn checked_sub(self, other: Fixed) -> Option<Fixed> {
        self.0.checked_sub(other.0).map(Fixed)
    }

    #[inline]
    pub fn saturating_sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(other.0))
    }

    /// Clamp negative values to zero
    #[inline]
    pub fn floor_zero(self) -> Fixed {
        if self.0 < 0 { Fixed::ZERO } else { self }
    }

    #[inline(always)]
    fn narrow(wide: i128) -> Fixed {
        Fixed(wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl SubAssign for Fixed {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 -= rhs.0;
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    #[inline(always)]
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

impl Sum for Fixed {
    fn sum<I: Iterator<Item = Fixed>>(iter: I) -> Fixed {
        iter.fold(Fixed::ZERO, |acc, x| acc + x)
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> f64 {
        value.to_f64()
    }
}

impl TryFrom<f64> for Fixed {
    type Error = crate::Error;

    fn try_from(value: f64) -> crate::Result<Self> {
        Fixed::try_from_f64(value)
    }
}

impl FromStr for Fixed {
    type Err = crate::Error;

    /// Parse an exact decimal such as `-2400.125`; more than 8 decimals is an error
    fn from_str(s: &str) -> crate::Result<Self> {
        let invalid = || crate::Error::Serialization(format!("invalid decimal {:?}", s));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if (whole.is_empty() && frac.is_empty())
            || frac.len() > Self::DECIMALS as usize
            || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let frac_raw: i128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<8}", frac);
            padded.parse().map_err(|_| invalid())?
        };

        let magnitude = whole
            .checked_mul(Self::SCALE as i128)
            .and_then(|w| w.checked_add(frac_raw))
            .ok_or_else(invalid)?;
        let raw = if negative { -magnitude } else { magnitude };
        i64::try_from(raw).map(Fixed).map_err(|_| invalid())
    }
}

impl Serialize for Fixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Fixed;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Fixed, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Fixed, E> {
        v.checked_mul(Fixed::SCALE)
            .map(Fixed)
            .ok_or_else(|| E::custom(format!("{} overflows a decimal", v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Fixed, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(format!("{} overflows a decimal", v)))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Fixed, E> {
        Fixed::try_from_f64(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Fixed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DecimalVisitor)
        } else {
            i64::deserialize(deserializer).map(Fixed)
        }
    }
}

impl PartialEq<i64> for Fixed {
    fn eq(&self, other: &i64) -> bool {
        self.0 as i128 == *other as i128 * Self::SCALE as i128
    }
}

impl PartialOrd<i64> for Fixed {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        (self.0 as i128).partial_cmp(&(*other as i128 * Self::SCALE as i128))
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;

        if let Some(precision) = f.precision() {
            let precision = precision.min(Self::DECIMALS as usize);
            let digits = format!("{:08}", frac);
            if precision == 0 {
                write!(f, "{}{}", sign, whole)
            } else {
                write!(f, "{}{}.{}", sign, whole, &digits[..precision])
            }
        } else if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:08}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_and_fractional_construction() {
        assert_eq!(Fixed::from_int(2400).raw(), 240_000_000_000);
        assert_eq!(Fixed::from_f64(0.5).raw(), 50_000_000);
        assert_eq!(Fixed::from_f64(-1.25), -Fixed::from_f64(1.25));
        assert!(Fixed::from_int(3) == 3);
    }

    #[test]
    fn test_mul_div_use_wide_intermediate() {
        // Both operands near the top of the i64 range in raw units
        let big = Fixed::from_int(50_000_000_000);
        let product = big.mul_div(big, big);
        assert_eq!(product, big);

        let notional = Fixed::from_int(2_500).mul(Fixed::from_int(1_000));
        assert_eq!(notional, Fixed::from_int(2_500_000));

        assert_eq!(Fixed::from_int(10).div(Fixed::from_int(4)), Fixed::from_f64(2.5));
        assert_eq!(Fixed::from_int(10).div(Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_basis_points() {
        let margin = Fixed::from_int(1_000);
        assert_eq!(margin.bps(13_000), Fixed::from_int(1_300));
        assert_eq!(margin.bps(MAX_BPS), margin);

        let odd = Fixed::from_raw(3);
        assert_eq!(odd.bps(5_000), Fixed::from_raw(1));
        assert_eq!(odd.bps_ceil(5_000), Fixed::from_raw(2));
    }

    #[test]
    fn test_try_from_rejects_non_finite() {
        assert!(Fixed::try_from_f64(f64::NAN).is_err());
        assert!(Fixed::try_from_f64(f64::INFINITY).is_err());
        assert!(Fixed::try_from_f64(1e30).is_err());
        assert_eq!(Fixed::try_from_f64(12.5).unwrap(), Fixed::from_f64(12.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Fixed::from_int(2400).to_string(), "2400");
        assert_eq!(Fixed::from_f64(-0.125).to_string(), "-0.125");
        assert_eq!(format!("{:.2}", Fixed::from_f64(3.14159)), "3.14");
    }

    #[test]
    fn test_json_is_exact_decimal_string() {
        let json = serde_json::to_string(&Fixed::from_f64(1.5)).unwrap();
        assert_eq!(json, "\"1.5\"");

        let parsed: Fixed = serde_json::from_str("2400").unwrap();
        assert_eq!(parsed, Fixed::from_int(2400));
        let parsed: Fixed = serde_json::from_str("0.001").unwrap();
        assert_eq!(parsed, Fixed::from_raw(100_000));
    }

    #[test]
    fn test_full_width_values_survive_persistence() {
        for value in [Fixed::from_raw(123_456_789_012_345_679), Fixed::MAX, -Fixed::MAX, Fixed::from_raw(-1)] {
            let json = serde_json::to_string(&value).unwrap();
            assert_eq!(serde_json::from_str::<Fixed>(&json).unwrap(), value);

            let bytes = bincode::serialize(&value).unwrap();
            assert_eq!(bincode::deserialize::<Fixed>(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!("-2400.125".parse::<Fixed>().unwrap(), Fixed::from_f64(-2400.125));
        assert_eq!(".5".parse::<Fixed>().unwrap(), Fixed::from_f64(0.5));
        assert!("1.123456789".parse::<Fixed>().is_err());
        assert!("12a".parse::<Fixed>().is_err());
        assert!("".parse::<Fixed>().is_err());
        assert!("99999999999999999999".parse::<Fixed>().is_err());
    }
}
