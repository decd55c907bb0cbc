//! Numeric value layer
//!
//! Constants in the SSA layer carry a `Num`: an integer bit pattern of a
//! given width and signedness, or a single/double precision float. All the
//! arithmetic the constant folder performs happens here. Operations that
//! have no well-defined result (division by zero, oversized shifts, mixing
//! integer and floating operands) return `None` and are left unfolded.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A typed numeric value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Num {
    /// Integer bit pattern, always masked to `bits`
    Int { bits: u8, signed: bool, value: u64 },
    Float(f32),
    Double(f64),
}

fn mask(bits: u8) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

impl Num {
    pub fn int(bits: u8, signed: bool, value: u64) -> Self {
        debug_assert!(bits > 0 && bits <= 64);
        Num::Int { bits, signed, value: value & mask(bits) }
    }

    pub fn from_i64(bits: u8, signed: bool, value: i64) -> Self {
        Self::int(bits, signed, value as u64)
    }

    /// The 32-bit signed 0/1 produced by comparisons
    pub fn truth(value: bool) -> Self {
        Self::int(32, true, value as u64)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Num::Int { .. })
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Num::Int { value, .. } => value == 0,
            Num::Float(v) => v == 0.0,
            Num::Double(v) => v == 0.0,
        }
    }

    /// Sign-extended (for signed) or zero-extended integer value
    pub fn as_i64(&self) -> i64 {
        match *self {
            Num::Int { bits, signed, value } => {
                if signed && bits < 64 && value & (1u64 << (bits - 1)) != 0 {
                    (value | !mask(bits)) as i64
                } else {
                    value as i64
                }
            }
            Num::Float(v) => v as i64,
            Num::Double(v) => v as i64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            Num::Int { value, .. } => value,
            Num::Float(v) => v as u64,
            Num::Double(v) => v as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Num::Int { signed: true, .. } => self.as_i64() as f64,
            Num::Int { value, .. } => value as f64,
            Num::Float(v) => v as f64,
            Num::Double(v) => v,
        }
    }

    fn int_parts(&self) -> Option<(u8, bool, u64)> {
        match *self {
            Num::Int { bits, signed, value } => Some((bits, signed, value)),
            _ => None,
        }
    }

    fn int_op(&self, rhs: &Num, op: impl FnOnce(u64, u64) -> u64) -> Option<Num> {
        let (bits, signed, l) = self.int_parts()?;
        let (_, _, r) = rhs.int_parts()?;
        Some(Num::int(bits, signed, op(l, r)))
    }

    fn float_op(&self, rhs: &Num, f: impl FnOnce(f32, f32) -> f32, d: impl FnOnce(f64, f64) -> f64) -> Option<Num> {
        match (*self, *rhs) {
            (Num::Float(l), Num::Float(r)) => Some(Num::Float(f(l, r))),
            (Num::Double(l), Num::Double(r)) => Some(Num::Double(d(l, r))),
            _ => None,
        }
    }

    pub fn add(&self, rhs: &Num) -> Option<Num> {
        if self.is_int() {
            return self.int_op(rhs, u64::wrapping_add);
        }
        self.float_op(rhs, |l, r| l + r, |l, r| l + r)
    }

    pub fn sub(&self, rhs: &Num) -> Option<Num> {
        if self.is_int() {
            return self.int_op(rhs, u64::wrapping_sub);
        }
        self.float_op(rhs, |l, r| l - r, |l, r| l - r)
    }

    pub fn mul(&self, rhs: &Num) -> Option<Num> {
        if self.is_int() {
            return self.int_op(rhs, u64::wrapping_mul);
        }
        self.float_op(rhs, |l, r| l * r, |l, r| l * r)
    }

    pub fn div(&self, rhs: &Num) -> Option<Num> {
        match self.int_parts() {
            Some((bits, signed, _)) => {
                rhs.int_parts()?;
                if rhs.is_zero() {
                    return None;
                }
                if signed {
                    let q = self.as_i64().checked_div(rhs.as_i64())?;
                    Some(Num::from_i64(bits, signed, q))
                } else {
                    Some(Num::int(bits, signed, self.as_u64() / rhs.as_u64()))
                }
            }
            None => self.float_op(rhs, |l, r| l / r, |l, r| l / r),
        }
    }

    /// Integer remainder; undefined for floats
    pub fn rem(&self, rhs: &Num) -> Option<Num> {
        let (bits, signed, _) = self.int_parts()?;
        rhs.int_parts()?;
        if rhs.is_zero() {
            return None;
        }
        if signed {
            let r = self.as_i64().checked_rem(rhs.as_i64())?;
            Some(Num::from_i64(bits, signed, r))
        } else {
            Some(Num::int(bits, signed, self.as_u64() % rhs.as_u64()))
        }
    }

    pub fn shl(&self, rhs: &Num) -> Option<Num> {
        let (bits, signed, value) = self.int_parts()?;
        rhs.int_parts()?;
        let amount = rhs.as_u64();
        if amount >= bits as u64 {
            return None;
        }
        Some(Num::int(bits, signed, value << amount))
    }

    /// Arithmetic shift for signed operands, logical otherwise
    pub fn shr(&self, rhs: &Num) -> Option<Num> {
        let (bits, signed, value) = self.int_parts()?;
        rhs.int_parts()?;
        let amount = rhs.as_u64();
        if amount >= bits as u64 {
            return None;
        }
        if signed {
            Some(Num::from_i64(bits, signed, self.as_i64() >> amount))
        } else {
            Some(Num::int(bits, signed, value >> amount))
        }
    }

    pub fn and(&self, rhs: &Num) -> Option<Num> {
        self.int_op(rhs, |l, r| l & r)
    }

    pub fn or(&self, rhs: &Num) -> Option<Num> {
        self.int_op(rhs, |l, r| l | r)
    }

    pub fn xor(&self, rhs: &Num) -> Option<Num> {
        self.int_op(rhs, |l, r| l ^ r)
    }

    /// Ordering under the left operand's signedness; `None` for unordered
    /// floats or mixed integer/floating operands
    pub fn compare(&self, rhs: &Num) -> Option<Ordering> {
        match (*self, *rhs) {
            (Num::Int { signed: true, .. }, Num::Int { .. }) => Some(self.as_i64().cmp(&rhs.as_i64())),
            (Num::Int { .. }, Num::Int { .. }) => Some(self.as_u64().cmp(&rhs.as_u64())),
            (Num::Float(l), Num::Float(r)) => l.partial_cmp(&r),
            (Num::Double(l), Num::Double(r)) => l.partial_cmp(&r),
            _ => None,
        }
    }

    /// Truncate or extend to an integer of the given width
    pub fn convert_to_int(&self, bits: u8, signed: bool) -> Num {
        match *self {
            Num::Int { .. } => Num::int(bits, signed, self.as_i64() as u64),
            Num::Float(v) => Self::float_to_int(v as f64, bits, signed),
            Num::Double(v) => Self::float_to_int(v, bits, signed),
        }
    }

    fn float_to_int(v: f64, bits: u8, signed: bool) -> Num {
        if signed {
            Num::from_i64(bits, signed, v as i64)
        } else {
            Num::int(bits, signed, v as u64)
        }
    }

    pub fn to_float(&self) -> Num {
        Num::Float(self.as_f64() as f32)
    }

    pub fn to_double(&self) -> Num {
        Num::Double(self.as_f64())
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num::Int { signed: true, .. } => write!(f, "{}", self.as_i64()),
            Num::Int { value, .. } => write!(f, "{value}"),
            Num::Float(v) => write!(f, "{v:?}"),
            Num::Double(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn i32(v: i64) -> Num {
        Num::from_i64(32, true, v)
    }

    fn u8(v: u64) -> Num {
        Num::int(8, false, v)
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(i32(2).add(&i32(3)), Some(i32(5)));
        assert_eq!(i32(3).mul(&i32(4)), Some(i32(12)));
        assert_eq!(i32(-7).div(&i32(2)), Some(i32(-3)));
        assert_eq!(i32(-7).rem(&i32(2)), Some(i32(-1)));
        assert_eq!(u8(250).add(&u8(10)), Some(u8(4)));
        assert_eq!(i32(1).div(&i32(0)), None);
        assert_eq!(i32(i32::MIN as i64).div(&i32(-1)), Some(i32(i32::MIN as i64)));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(i32(-8).shr(&i32(1)), Some(i32(-4)));
        assert_eq!(Num::int(32, false, 0xffff_fff8).shr(&i32(1)), Some(Num::int(32, false, 0x7fff_fffc)));
        assert_eq!(i32(1).shl(&i32(4)), Some(i32(16)));
        assert_eq!(i32(1).shl(&i32(32)), None);
    }

    #[test]
    fn test_signed_vs_unsigned_compare() {
        let minus_one = i32(-1);
        assert_eq!(minus_one.compare(&i32(0)), Some(Ordering::Less));
        let big = Num::int(32, false, 0xffff_ffff);
        assert_eq!(big.compare(&Num::int(32, false, 0)), Some(Ordering::Greater));
        assert_eq!(Num::Double(f64::NAN).compare(&Num::Double(1.0)), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(i32(300).convert_to_int(8, false), u8(44));
        assert_eq!(Num::from_i64(8, true, -1).convert_to_int(32, true), i32(-1));
        assert_eq!(Num::Double(3.9).convert_to_int(32, true), i32(3));
        assert_eq!(i32(2).to_double(), Num::Double(2.0));
        assert_eq!(Num::Double(1.5).to_float(), Num::Float(1.5));
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(Num::Double(1.5).add(&Num::Double(2.0)), Some(Num::Double(3.5)));
        assert_eq!(Num::Float(1.0).rem(&Num::Float(2.0)), None);
        assert_eq!(Num::Double(1.0).add(&i32(1)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(i32(-5).to_string(), "-5");
        assert_eq!(Num::int(32, false, 7).to_string(), "7");
        assert_eq!(Num::Double(2.0).to_string(), "2.0");
    }
}
