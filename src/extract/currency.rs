//! Exact currency amounts parsed from OCR tokens

use crate::error::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A non-negative dollar amount held as whole cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(u64);

impl Currency {
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Half of this amount, truncated to whole dollars as assessed values are
    pub fn halved(self) -> Self {
        Self(self.0 / 200 * 100)
    }
}

/// Parse a currency token such as `$123,456.00`, `123456` or `$ 1,000`.
///
/// Currency symbols, thousands separators and interior whitespace are
/// stripped; what remains must be digits with an optional one- or
/// two-digit fraction.
pub fn parse_currency(token: &str) -> Result<Currency> {
    let malformed = || Error::MalformedCurrency {
        token: token.to_string(),
    };

    let trimmed = token.trim();
    let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let cleaned: String = body
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
        Some(_) => return Err(malformed()),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let dollars: u64 = whole.parse().map_err(|_| malformed())?;
    let cents: u64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().map_err(|_| malformed())? * 10,
        _ => fraction.parse().map_err(|_| malformed())?,
    };

    dollars
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .map(Currency)
        .ok_or_else(malformed)
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_currency(s)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = (self.0 / 100).to_string();
        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, c) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(f, "${}.{:02}", grouped, self.0 % 100)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

struct CurrencyVisitor;

impl<'de> Visitor<'de> for CurrencyVisitor {
    type Value = Currency;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative amount as a number or a string like \"$1,000.00\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Currency, E> {
        v.checked_mul(100)
            .map(Currency)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Currency, E> {
        if v < 0 {
            return Err(E::custom("amount must not be negative"));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Currency, E> {
        if !v.is_finite() || v < 0.0 {
            return Err(E::custom("amount must be a non-negative number"));
        }
        Ok(Currency((v * 100.0).round() as u64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Currency, E> {
        parse_currency(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(CurrencyVisitor)
    }
}
