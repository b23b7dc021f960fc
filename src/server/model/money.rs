//! Amounts in minor units (cents).
//!
//! On the wire an amount is a plain JSON number in major units: whole amounts
//! as integers (`120`), others with their fraction (`12.5`). Menu prices also
//! arrive as numeric strings (`"12.50"`). Anything finer than a cent is refused.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const CENTS_PER_UNIT: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(CENTS_PER_UNIT))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// `self * quantity`, saturating at `u64::MAX` cents.
    pub fn times(self, quantity: u64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    /// Integer average, `None` for an empty set.
    pub fn average(self, count: u64) -> Option<Self> {
        self.0.checked_div(count).map(Self)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (units, cents) = (self.0 / CENTS_PER_UNIT, self.0 % CENTS_PER_UNIT);
        if cents == 0 {
            f.pad(&units.to_string())
        } else {
            f.pad(&format!("{units}.{cents:02}"))
        }
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || format!("invalid amount \"{raw}\"");
        let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let (cents, rest) = fraction.split_at(fraction.len().min(2));
        if rest.bytes().any(|b| b != b'0') {
            return Err(format!("amount \"{raw}\" is finer than a cent"));
        }

        let units: u64 = match whole {
            "" => 0,
            digits => digits.parse().map_err(|_| format!("amount \"{raw}\" is too large"))?,
        };
        let cents: u64 = match cents.len() {
            0 => 0,
            1 => cents.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => cents.parse().map_err(|_| invalid())?,
        };
        units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(cents))
            .map(Money)
            .ok_or_else(|| format!("amount \"{raw}\" is too large"))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % CENTS_PER_UNIT == 0 {
            serializer.serialize_u64(self.0 / CENTS_PER_UNIT)
        } else {
            serializer.serialize_f64(self.0 as f64 / CENTS_PER_UNIT as f64)
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Units(u64),
            Decimal(f64),
            Text(String),
        }

        let parsed = match RawAmount::deserialize(deserializer)? {
            RawAmount::Units(units) => units
                .checked_mul(CENTS_PER_UNIT)
                .map(Money)
                .ok_or_else(|| format!("amount {units} is too large")),
            // shortest round-trip rendering, so 12.5 reads back as "12.5"
            RawAmount::Decimal(value) => value.to_string().parse(),
            RawAmount::Text(text) => text.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
