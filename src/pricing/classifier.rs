//! Age classification for child passengers.
//!
//! Pure functions - no database access. Every declared age lands in exactly
//! one of three buckets, decided in this order:
//!
//! 1. exempt, when the service has an exemption bracket containing the age;
//! 2. child rate, when child pricing is enabled and the age is in the child bracket;
//! 3. full rate otherwise.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::models::{AgePolicy, MAX_CHILD_AGE};

/// Bucket a single age falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBucket {
    Exempt,
    ChildRate,
    FullRate,
}

/// Result of classifying a list of declared child ages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeClassification {
    pub exempt: u32,
    pub child: u32,
    pub full: u32,
}

impl AgeClassification {
    pub fn total(&self) -> u32 {
        self.exempt + self.child + self.full
    }

    /// Children that pay something, at either rate.
    pub fn paying(&self) -> u32 {
        self.child + self.full
    }
}

/// Checks that `age` is a valid child age.
pub fn check_age(age: i32) -> Result<(), ValidationError> {
    if (0..=MAX_CHILD_AGE).contains(&age) {
        Ok(())
    } else {
        Err(ValidationError::AgeOutOfRange { age })
    }
}

/// Classify one already-validated age.
pub fn bucket_for(age: i32, policy: &AgePolicy) -> AgeBucket {
    if policy.is_exempt(age) {
        AgeBucket::Exempt
    } else if policy.child_rate_enabled() && policy.in_child_bracket(age) {
        AgeBucket::ChildRate
    } else {
        AgeBucket::FullRate
    }
}

/// Partition `ages` into exempt / child-rate / full-rate counts.
///
/// `declared` is the line's child quantity; the list must have exactly that
/// many entries. Any age outside `0..=17` is rejected.
pub fn classify_ages(
    ages: &[i32],
    declared: u32,
    policy: &AgePolicy,
) -> Result<AgeClassification, ValidationError> {
    if ages.len() != declared as usize {
        return Err(ValidationError::AgeCountMismatch {
            declared,
            provided: ages.len(),
        });
    }

    let mut counts = AgeClassification::default();
    for &age in ages {
        check_age(age)?;
        match bucket_for(age, policy) {
            AgeBucket::Exempt => counts.exempt += 1,
            AgeBucket::ChildRate => counts.child += 1,
            AgeBucket::FullRate => counts.full += 1,
        }
    }
    Ok(counts)
}
