//! Range-checked input values.
//!
//! Every number a participant types or clicks passes through one of these
//! types before it reaches a store. Constructors reject out-of-range values
//! with `CoreError::Validation`, so nothing downstream re-checks ranges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Upper bound for a participant weight (percent).
pub const MAX_WEIGHT: u8 = 100;

/// Upper bound for a single effort estimate.
pub const MAX_EFFORT: u32 = 500;

/// Inclusive bounds for probability and impact.
pub const RISK_FACTOR_RANGE: std::ops::RangeInclusive<u8> = 1..=4;

/// A participant's influence in weighted averages, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Weight(u8);

impl Weight {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `value` exceeds [`MAX_WEIGHT`].
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if value > MAX_WEIGHT {
            return Err(CoreError::Validation(format!(
                "weight must be between 0 and {MAX_WEIGHT}, got {value}"
            )));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<u8> for Weight {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weight> for u8 {
    fn from(weight: Weight) -> Self {
        weight.0
    }
}

impl FromStr for Weight {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s.trim().parse().map_err(|_| {
            CoreError::Validation(format!("weight must be a number from 0 to {MAX_WEIGHT}"))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant's effort estimate for an epic, in `[0, 500]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct EffortValue(u32);

impl EffortValue {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `value` exceeds [`MAX_EFFORT`].
    pub fn new(value: u32) -> Result<Self, CoreError> {
        if value > MAX_EFFORT {
            return Err(CoreError::Validation(format!(
                "effort must be between 0 and {MAX_EFFORT}, got {value}"
            )));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<u32> for EffortValue {
    type Error = CoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EffortValue> for u32 {
    fn from(value: EffortValue) -> Self {
        value.0
    }
}

impl FromStr for EffortValue {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| {
            CoreError::Validation(format!("effort must be a whole number from 0 to {MAX_EFFORT}"))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for EffortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Probability or impact of a risk, in `[1, 4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RiskFactor(u8);

impl RiskFactor {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `value` is outside [`RISK_FACTOR_RANGE`].
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if !RISK_FACTOR_RANGE.contains(&value) {
            return Err(CoreError::Validation(format!(
                "risk factors must be between 1 and 4, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// All valid factors in ascending order, for building choice menus.
    pub fn all() -> impl Iterator<Item = Self> {
        RISK_FACTOR_RANGE.map(Self)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RiskFactor {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RiskFactor> for u8 {
    fn from(factor: RiskFactor) -> Self {
        factor.0
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
