//! Shared primitive types used across every stage.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// The canonical join key between meters, readings, bills and payments.
pub type MeterNumber = String;

/// Consumer account identifier printed on the bill.
pub type ConsumerId = String;

/// Billing month in `YYYY-MM` form.
pub type BillingMonth = String;

/// A rupee amount held as integer paisa.
///
/// Bill components are rounded to paisa once, and totals are sums of the
/// rounded components, so `total == sum(components)` holds exactly.
/// On disk the value is written as rupees with two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_paisa(paisa: i64) -> Self {
        Self(paisa)
    }

    pub fn from_rupees(rupees: f64) -> Self {
        Self((rupees * 100.0).round() as i64)
    }

    pub fn paisa(self) -> i64 {
        self.0
    }

    pub fn rupees(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `self × rate`, rounded to the nearest paisa.
    pub fn scale(self, rate: f64) -> Self {
        Self((self.0 as f64 * rate).round() as i64)
    }

    pub fn max(self, other: Money) -> Self {
        Self(self.0.max(other.0))
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.rupees())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.rupees())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rupees = f64::deserialize(deserializer)?;
        Ok(Money::from_rupees(rupees))
    }
}

/// Round to `places` decimal digits, the precision values are written with.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
