//! Fixed-point score amounts.
//!
//! # Invariants
//! - Amounts are non-negative and carry at most two fractional digits.
//! - Arithmetic is exact: a running score always equals the sum of its parts.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::str::FromStr;

const SCALE: i64 = 100;
const FRACTION_DIGITS: usize = 2;
/// Largest single input amount; keeps running sums far away from overflow.
const MAX_CENTS: i64 = 1_000_000_000_000;

/// Non-negative score amount stored as hundredths of a point.
///
/// Serialized as the raw hundredths count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(i64);

/// Rejection reasons for score amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointsError {
    Negative,
    NotFinite,
    TooPrecise,
    TooLarge,
    Malformed(String),
}

impl Display for PointsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negative => write!(f, "amount must not be negative"),
            Self::NotFinite => write!(f, "amount must be a finite number"),
            Self::TooPrecise => write!(
                f,
                "amount must have at most {FRACTION_DIGITS} fractional digits"
            ),
            Self::TooLarge => write!(f, "amount exceeds the supported maximum"),
            Self::Malformed(value) => write!(f, "amount `{value}` is not a decimal number"),
        }
    }
}

impl Error for PointsError {}

impl Points {
    pub const ZERO: Self = Self(0);

    /// Builds an amount from a hundredths count.
    pub fn from_cents(cents: i64) -> Result<Self, PointsError> {
        if cents < 0 {
            return Err(PointsError::Negative);
        }
        Ok(Self(cents))
    }

    /// Builds an amount from whole points.
    pub fn whole(points: u32) -> Self {
        Self(i64::from(points) * SCALE)
    }

    /// Converts a float, rejecting anything finer than hundredths.
    pub fn from_f64(value: f64) -> Result<Self, PointsError> {
        if !value.is_finite() {
            return Err(PointsError::NotFinite);
        }
        if value < 0.0 {
            return Err(PointsError::Negative);
        }
        let scaled = value * SCALE as f64;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(PointsError::TooPrecise);
        }
        if rounded > MAX_CENTS as f64 {
            return Err(PointsError::TooLarge);
        }
        Ok(Self(rounded as i64))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

/// Amounts entering the ledger are capped at `MAX_CENTS`, so a sum of two
/// stays far inside `i64`.
impl Add for Points {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl FromStr for Points {
    type Err = PointsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.starts_with('-') {
            return Err(PointsError::Negative);
        }
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        let malformed = || PointsError::Malformed(trimmed.to_string());
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if digits.ends_with('.') {
            return Err(malformed());
        }
        if fraction.len() > FRACTION_DIGITS {
            return Err(PointsError::TooPrecise);
        }

        let whole: i64 = whole.parse().map_err(|_| PointsError::TooLarge)?;
        let mut fraction_cents: i64 = 0;
        for (index, digit) in fraction.bytes().enumerate() {
            let weight = if index == 0 { 10 } else { 1 };
            fraction_cents += i64::from(digit - b'0') * weight;
        }

        let cents = whole
            .checked_mul(SCALE)
            .and_then(|cents| cents.checked_add(fraction_cents))
            .filter(|cents| *cents <= MAX_CENTS)
            .ok_or(PointsError::TooLarge)?;
        Ok(Self(cents))
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / SCALE, self.0 % SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::{Points, PointsError};

    #[test]
    fn parses_decimal_text() {
        assert_eq!("7".parse::<Points>().unwrap().cents(), 700);
        assert_eq!("0.5".parse::<Points>().unwrap().cents(), 50);
        assert_eq!(" 3.25 ".parse::<Points>().unwrap().cents(), 325);
    }

    #[test]
    fn rejects_bad_text() {
        assert_eq!("-1".parse::<Points>(), Err(PointsError::Negative));
        assert_eq!("0.125".parse::<Points>(), Err(PointsError::TooPrecise));
        assert!(matches!(
            "1.".parse::<Points>(),
            Err(PointsError::Malformed(_))
        ));
        assert!(matches!(
            "abc".parse::<Points>(),
            Err(PointsError::Malformed(_))
        ));
    }

    #[test]
    fn converts_floats_exactly() {
        assert_eq!(Points::from_f64(7.5).unwrap().cents(), 750);
        assert_eq!(Points::from_f64(0.1).unwrap().cents(), 10);
        assert_eq!(Points::from_f64(-0.5), Err(PointsError::Negative));
        assert_eq!(Points::from_f64(f64::NAN), Err(PointsError::NotFinite));
        assert_eq!(Points::from_f64(0.333), Err(PointsError::TooPrecise));
    }

    #[test]
    fn addition_keeps_every_hundredth() {
        let sum = Points::whole(7) + "0.5".parse::<Points>().unwrap();
        assert_eq!(sum.cents(), 750);
        assert_eq!(sum + Points::ZERO, sum);
    }

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Points::from_cents(750).unwrap().to_string(), "7.50");
        assert_eq!(Points::ZERO.to_string(), "0.00");
    }
}
