use derive_more::Constructor;
use num_bigint::BigInt;
use std::fmt;
use std::io::Cursor;

use crate::frame::Serialize;

/// Arbitrary precision decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Constructor, Ord, PartialOrd, Eq, Hash)]
pub struct Decimal {
    pub unscaled: BigInt,
    pub scale: i32,
}

impl Decimal {
    /// Integer part of the value, truncated towards zero.
    pub fn as_plain(&self) -> BigInt {
        if self.scale >= 0 {
            &self.unscaled / BigInt::from(10).pow(self.scale.unsigned_abs())
        } else {
            &self.unscaled * BigInt::from(10).pow(self.scale.unsigned_abs())
        }
    }
}

impl Serialize for Decimal {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.scale.serialize(cursor);
        self.unscaled.to_signed_bytes_be().serialize(cursor);
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.magnitude().to_string();
        let sign = if self.unscaled.sign() == num_bigint::Sign::Minus {
            "-"
        } else {
            ""
        };

        if self.scale <= 0 {
            let zeros = "0".repeat(self.scale.unsigned_abs() as usize);
            return if self.unscaled.magnitude().bits() == 0 {
                f.write_str("0")
            } else {
                write!(f, "{sign}{digits}{zeros}")
            };
        }

        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int}.{frac}")
        } else {
            let zeros = "0".repeat(scale - digits.len());
            write!(f, "{sign}0.{zeros}{digits}")
        }
    }
}

macro_rules! impl_from_for_decimal {
    ($t:ty) => {
        impl From<$t> for Decimal {
            fn from(i: $t) -> Self {
                Decimal {
                    unscaled: i.into(),
                    scale: 0,
                }
            }
        }
    };
}

impl_from_for_decimal!(i8);
impl_from_for_decimal!(i16);
impl_from_for_decimal!(i32);
impl_from_for_decimal!(i64);
impl_from_for_decimal!(u8);
impl_from_for_decimal!(u16);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialize_test() {
        assert_eq!(
            Decimal::new(129.into(), 0).serialize_to_vec(),
            vec![0, 0, 0, 0, 0x00, 0x81]
        );

        assert_eq!(
            Decimal::new((-129).into(), 0).serialize_to_vec(),
            vec![0, 0, 0, 0, 0xFF, 0x7F]
        );

        assert_eq!(
            Decimal::new(12345.into(), 2).serialize_to_vec(),
            vec![0, 0, 0, 2, 0x30, 0x39]
        );
    }

    #[test]
    fn display_test() {
        assert_eq!(Decimal::new(12345.into(), 2).to_string(), "123.45");
        assert_eq!(Decimal::new((-12345).into(), 2).to_string(), "-123.45");
        assert_eq!(Decimal::new(5.into(), 3).to_string(), "0.005");
        assert_eq!(Decimal::new((-5).into(), 1).to_string(), "-0.5");
        assert_eq!(Decimal::new(12.into(), -2).to_string(), "1200");
        assert_eq!(Decimal::new(0.into(), 0).to_string(), "0");
    }

    #[test]
    fn as_plain_test() {
        assert_eq!(Decimal::new(12345.into(), 2).as_plain(), BigInt::from(123));
        assert_eq!(Decimal::new(12.into(), -1).as_plain(), BigInt::from(120));
    }

    #[test]
    fn from_int_test() {
        assert_eq!(Decimal::from(42i32), Decimal::new(42.into(), 0));
    }
}
