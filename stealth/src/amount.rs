//! Fixed-width on-chain amounts
//!
//! Every amount that touches a transaction, a record or the relayer is a
//! `Lamports` value. Decimal scaling only happens in `from_ui` / `to_ui`, which
//! the CLI calls at its boundary.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{StealthError, StealthResult};

/// Decimals of native SOL
pub const SOL_DECIMALS: u8 = 9;

/// Smallest deposit the program accepts (0.001 SOL)
pub const MIN_DEPOSIT: Lamports = Lamports(1_000_000);

/// Amount in base units (lamports for SOL, raw units for tokens)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lamports(pub u64);

impl Lamports {
    pub const ZERO: Lamports = Lamports(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Lamports) -> Option<Lamports> {
        self.0.checked_add(other.0).map(Lamports)
    }

    pub fn checked_sub(self, other: Lamports) -> Option<Lamports> {
        self.0.checked_sub(other.0).map(Lamports)
    }

    pub fn saturating_sub(self, other: Lamports) -> Lamports {
        Lamports(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal string such as `"1.25"` into base units.
    ///
    /// No floating point is involved: the integer and fractional parts are
    /// scaled separately and overflow is an error.
    pub fn from_ui(input: &str, decimals: u8) -> StealthResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(StealthError::InvalidAmount("empty amount".into()));
        }
        if trimmed.starts_with('-') {
            return Err(StealthError::InvalidAmount(format!("negative amount: {}", trimmed)));
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(StealthError::InvalidAmount(format!("not a number: {}", trimmed)));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(StealthError::InvalidAmount(format!("not a number: {}", trimmed)));
        }
        if frac.len() > decimals as usize {
            return Err(StealthError::InvalidAmount(format!(
                "too many decimal places: {} (max {})",
                trimmed, decimals
            )));
        }

        let scale = 10u64
            .checked_pow(decimals as u32)
            .ok_or_else(|| StealthError::InvalidAmount(format!("unsupported decimals: {}", decimals)))?;

        let overflow = || StealthError::InvalidAmount(format!("amount too large: {}", trimmed));

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| overflow())?
        };

        let frac_units = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = decimals as usize);
            padded.parse::<u64>().map_err(|_| overflow())?
        };

        whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_units))
            .map(Lamports)
            .ok_or_else(overflow)
    }

    /// Parse a SOL amount
    pub fn from_sol(input: &str) -> StealthResult<Self> {
        Self::from_ui(input, SOL_DECIMALS)
    }

    /// Render with the given decimals, trimming trailing zeros
    pub fn to_ui(self, decimals: u8) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        let scale = 10u64.pow(decimals as u32);
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{:0width$}", frac, width = decimals as usize);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }

    pub fn to_sol_string(self) -> String {
        self.to_ui(SOL_DECIMALS)
    }
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lamports", self.0)
    }
}

impl From<u64> for Lamports {
    fn from(value: u64) -> Self {
        Lamports(value)
    }
}

impl Add for Lamports {
    type Output = Lamports;

    fn add(self, rhs: Lamports) -> Lamports {
        Lamports(self.0 + rhs.0)
    }
}

impl Sub for Lamports {
    type Output = Lamports;

    fn sub(self, rhs: Lamports) -> Lamports {
        Lamports(self.0 - rhs.0)
    }
}
