//! Monetary amounts in minor currency units (e.g. cents).
//!
//! Provider callbacks deliver amounts in whatever shape the provider likes;
//! everything inside this system is an `i64` of minor units.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An amount of money in minor currency units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Parse a major-unit decimal string (e.g. `"79.98"`) into minor units.
    ///
    /// Accepts at most two fractional digits; anything else is a validation
    /// error rather than a silent rounding.
    pub fn from_major_str(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::validation("empty amount"));
        }

        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || frac.len() > 2 {
            return Err(DomainError::validation(format!("malformed amount: {s}")));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| DomainError::validation(format!("malformed amount: {s}")))?;
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            let parsed: i64 = frac
                .parse()
                .map_err(|_| DomainError::validation(format!("malformed amount: {s}")))?;
            if frac.len() == 1 { parsed * 10 } else { parsed }
        };

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .map(|m| Money(sign * m))
            .ok_or_else(|| DomainError::validation(format!("amount out of range: {s}")))
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Subtract, flooring at zero. Used when applying a discount larger than
    /// the order subtotal.
    pub fn saturating_sub_floor_zero(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Whether `other` matches this amount within `tolerance` minor units.
    ///
    /// Captured webhook amounts are accepted within one minor unit of the
    /// order total to absorb provider-side rounding.
    pub fn matches_within(&self, other: Money, tolerance: i64) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let minor = self.0.abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", minor / 100, minor % 100)
    }
}
