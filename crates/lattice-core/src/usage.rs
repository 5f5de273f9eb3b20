//! Token usage accounting for AI operations.
//!
//! Every embedding-generation and inference call reports a [`TokenUsage`].
//! Job definitions fold these into a single job-level total. The type is a
//! commutative monoid under [`TokenUsage::merge`] with [`TokenUsage::zero`]
//! as identity, so partial sums from concurrent sub-jobs may be combined in
//! any order without locking discipline beyond read-combine-write at the
//! join point.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Additive usage counter for AI operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt/input side.
    pub prompt_tokens: u64,
    /// Total tokens billed for the call.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// The identity element: all counters zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Create a usage counter from raw counts.
    pub fn new(prompt_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            total_tokens,
        }
    }

    /// Field-wise addition. Pure, total, commutative, and associative;
    /// never branches on content.
    pub fn merge(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }

    /// Whether any tokens were recorded.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.merge(other)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        *self = self.merge(other);
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Self::merge)
    }
}
