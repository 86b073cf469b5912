//! Advisory "next number" hints for the UI
//!
//! A suggestion combines the counter's next value with the lowest number no
//! assignment record uses yet. It is never written back to the counter; the
//! number actually issued comes from the counter alone and may differ if
//! another caller issues in between.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Smallest positive integer not present in `used`
pub fn next_available(used: &HashSet<i64>) -> i64 {
    let mut candidate = 1;
    while used.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub scope_key: String,
    pub current_sequence_value: i64,
    pub next_available: i64,
    pub suggested: i64,
}

impl Suggestion {
    pub fn new(scope_key: impl Into<String>, current_sequence_value: i64, used: &HashSet<i64>) -> Self {
        let next_available = next_available(used);
        Self {
            scope_key: scope_key.into(),
            current_sequence_value,
            next_available,
            suggested: current_sequence_value.max(next_available),
        }
    }

    /// Hint for a scope nothing is known about
    pub fn empty(scope_key: impl Into<String>) -> Self {
        Self::new(scope_key, 1, &HashSet::new())
    }
}
