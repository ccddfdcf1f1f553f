use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};
use sqlx::Type;
use thiserror::Error;

/// Mobile-money amounts are settled in Kenyan shillings.
pub const DEFAULT_CURRENCY_CODE: &str = "KES";

//--------------------------------------       Amount        ---------------------------------------------------------
/// A currency amount in whole units.
///
/// Amounts always serialize as a JSON number. When deserializing, channel adapters and payment gateways are not
/// consistent, so integers, integral floats (`10.0`) and numeric strings (`"10"`, `"10.00"`) are all accepted. A real
/// fraction of a shilling is rejected.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Hash)]
#[sqlx(transparent)]
pub struct Amount(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Amount {}

impl TryFrom<f64> for Amount {
    type Error = AmountConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        // i64::MAX is not exactly representable, so the upper bound is exclusive
        let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
        if !value.is_finite() || !in_range {
            return Err(AmountConversionError(format!("{value} is out of range")));
        }
        if value.fract() != 0.0 {
            return Err(AmountConversionError(format!("{value} is not a whole number of {DEFAULT_CURRENCY_CODE}")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(value as i64))
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let whole = match trimmed.split_once('.') {
            None => trimmed,
            Some((whole, fraction)) if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') => whole,
            Some(_) => {
                return Err(AmountConversionError(format!(
                    "'{trimmed}' is not a whole number of {DEFAULT_CURRENCY_CODE}"
                )))
            },
        };
        whole.parse::<i64>().map(Self).map_err(|e| AmountConversionError(format!("'{trimmed}' ({e})")))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {DEFAULT_CURRENCY_CODE}", self.0)
    }
}

impl Amount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Integer(i64),
            Float(f64),
            Text(String),
        }
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Integer(v) => Ok(Self(v)),
            RawAmount::Float(v) => Self::try_from(v).map_err(de::Error::custom),
            RawAmount::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}
