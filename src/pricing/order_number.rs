//! Order numbering: `{year}-{sequence:05}`, sequence restarting every year.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ValidationError;

pub const MAX_SEQUENCE: u32 = 99_999;

/// Validated order number such as `2025-00001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber {
    year: i32,
    sequence: u32,
}

impl OrderNumber {
    pub fn new(year: i32, sequence: u32) -> Result<Self, ValidationError> {
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::InvalidOrderNumber(format!("{year}-{sequence}")));
        }
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ValidationError::SequenceExhausted { year });
        }
        Ok(Self { year, sequence })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Prefix shared by every number issued in `year`.
    pub fn year_prefix(year: i32) -> String {
        format!("{year}-")
    }

    /// Next number for `year` given the numbers already issued.
    ///
    /// Only numbers starting with `{year}-` count. A suffix that does not
    /// parse counts as sequence 0.
    pub fn next_for_year<'a, I>(year: i32, existing: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let highest = highest_sequence(year, existing);
        let next = highest
            .checked_add(1)
            .ok_or(ValidationError::SequenceExhausted { year })?;
        Self::new(year, next)
    }
}

/// Highest sequence among `existing` numbers issued in `year`.
pub fn highest_sequence<'a, I>(year: i32, existing: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = OrderNumber::year_prefix(year);
    existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix.as_str()))
        .map(|suffix| suffix.parse::<u32>().unwrap_or(0))
        .max()
        .unwrap_or(0)
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:05}", self.year, self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidOrderNumber(s.to_string());
        let (year, sequence) = s.split_once('-').ok_or_else(invalid)?;
        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !all_digits(year, 4) || !all_digits(sequence, 5) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, sequence).map_err(|_| invalid())
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.to_string()
    }
}
