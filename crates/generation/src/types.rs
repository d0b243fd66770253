//! Shared value types for the content generation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (scores are in `[0.0, 10.0]`, costs are
//! finite and non-negative) and participate in routing and accounting
//! computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token and cost types
// ---------------------------------------------------------------------------

/// Number of tokens consumed by, or estimated for, a provider call.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Rough input-token estimate for a prompt: one token per four characters,
    /// rounded up.
    pub fn estimate_for_text(text: &str) -> Self {
        Self((text.chars().count() as u64).div_ceil(4))
    }

    /// Rough output-token estimate for a length limit expressed in words:
    /// four tokens per three words, rounded up.
    pub fn estimate_for_words(words: u32) -> Self {
        Self((u64::from(words) * 4).div_ceil(3))
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

// ---------------------------------------------------------------------------

/// Monetary cost of provider usage, expressed in US dollars.
///
/// Used for per-attempt, per-request, and per-batch accounting as well as for
/// candidate ranking. Callers are responsible for rounding to a suitable
/// display precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCost(f64);

impl TokenCost {
    /// Creates a [`TokenCost`] from a raw float value (USD).
    ///
    /// Returns `None` if `value` is negative, infinite, or NaN.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`TokenCost`] of exactly zero.
    pub fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the underlying `f64` value (USD).
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if this cost is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl std::fmt::Display for TokenCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl std::ops::Add for TokenCost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCost {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for TokenCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, c| acc + c)
    }
}

// ---------------------------------------------------------------------------

/// Per-token pricing of a provider, in USD per token.
///
/// Free or local providers use zero for both rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostPerToken {
    /// Price of one prompt (input) token.
    pub input: f64,
    /// Price of one completion (output) token.
    pub output: f64,
}

impl CostPerToken {
    /// Creates a pricing entry, returning `None` if either rate is negative,
    /// infinite, or NaN.
    #[must_use]
    pub fn new(input: f64, output: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        (valid(input) && valid(output)).then_some(Self { input, output })
    }

    /// Cost of a call that consumed `tokens_in` and produced `tokens_out`.
    pub fn cost_of(self, tokens_in: TokenCount, tokens_out: TokenCount) -> TokenCost {
        let raw = tokens_in.as_u64() as f64 * self.input + tokens_out.as_u64() as f64 * self.output;
        TokenCost::new(raw).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------

/// Maximum spend a caller is willing to accept for one request.
///
/// Candidates whose estimated cost exceeds the budget are excluded from
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CostBudget(f64);

impl CostBudget {
    /// Creates a [`CostBudget`] cap (USD).
    ///
    /// Returns `None` if `limit` is not strictly positive, infinite, or NaN.
    #[must_use]
    pub fn new(limit: f64) -> Option<Self> {
        if limit.is_finite() && limit > 0.0 {
            Some(Self(limit))
        } else {
            None
        }
    }

    /// Returns the budget limit as a `f64` (USD).
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if `cost` is strictly above this budget.
    pub fn is_exceeded_by(self, cost: TokenCost) -> bool {
        cost.as_f64() > self.0
    }
}

impl TryFrom<f64> for CostBudget {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("budget must be a positive finite amount, got {value}"))
    }
}

impl From<CostBudget> for f64 {
    fn from(budget: CostBudget) -> Self {
        budget.0
    }
}

impl std::fmt::Display for CostBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Score types
// ---------------------------------------------------------------------------

macro_rules! ten_point_score {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(try_from = "f64", into = "f64")]
        pub struct $name(f64);

        impl $name {
            /// Lowest possible value.
            pub const MIN: Self = Self(0.0);
            /// Highest possible value.
            pub const MAX: Self = Self(10.0);

            /// Returns `None` if `value` is outside `[0.0, 10.0]` or not finite.
            #[must_use]
            pub fn new(value: f64) -> Option<Self> {
                if value.is_finite() && (0.0..=10.0).contains(&value) {
                    Some(Self(value))
                } else {
                    None
                }
            }

            /// Clamps any finite value into `[0.0, 10.0]`; NaN becomes zero.
            pub fn saturating(value: f64) -> Self {
                if value.is_nan() {
                    Self::MIN
                } else {
                    Self(value.clamp(0.0, 10.0))
                }
            }

            /// Returns the value as an `f64` in `[0.0, 10.0]`.
            pub fn as_f64(self) -> f64 {
                self.0
            }
        }

        impl TryFrom<f64> for $name {
            type Error = String;

            fn try_from(value: f64) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| format!("value must lie in [0, 10], got {value}"))
            }
        }

        impl From<$name> for f64 {
            fn from(score: $name) -> Self {
                score.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.2}", self.0)
            }
        }
    };
}

ten_point_score! {
    /// Score assigned to generated content by a quality validator, in
    /// `[0.0, 10.0]`. Compared against the validator's threshold to decide
    /// whether a quality retry is needed.
    QualityScore
}

ten_point_score! {
    /// Static quality rating of a provider, in `[0.0, 10.0]`.
    ///
    /// Configured by operators; consumed only by the router's ranking.
    QualityRating
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimates_round_up() {
        assert_eq!(TokenCount::estimate_for_text("abcde").as_u64(), 2);
        assert_eq!(TokenCount::estimate_for_text("").as_u64(), 0);
        assert_eq!(TokenCount::estimate_for_words(100).as_u64(), 134);
    }

    #[test]
    fn cost_per_token_multiplies_both_directions() {
        let pricing = CostPerToken::new(0.001, 0.002).unwrap();
        let cost = pricing.cost_of(TokenCount::new(10), TokenCount::new(5));
        assert!((cost.as_f64() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn cost_per_token_rejects_negative_rates() {
        assert!(CostPerToken::new(-0.1, 0.0).is_none());
        assert!(CostPerToken::new(0.0, f64::NAN).is_none());
    }

    #[test]
    fn budget_is_exceeded_only_strictly_above_limit() {
        let budget = CostBudget::new(0.5).unwrap();
        assert!(!budget.is_exceeded_by(TokenCost::new(0.5).unwrap()));
        assert!(budget.is_exceeded_by(TokenCost::new(0.51).unwrap()));
        assert!(CostBudget::new(0.0).is_none());
    }

    #[test]
    fn scores_are_bounded() {
        assert!(QualityScore::new(10.5).is_none());
        assert!(QualityScore::new(-1.0).is_none());
        assert_eq!(QualityScore::saturating(14.0), QualityScore::MAX);
        assert_eq!(QualityScore::saturating(f64::NAN), QualityScore::MIN);
    }

    #[test]
    fn scores_deserialize_with_range_check() {
        assert!(serde_json::from_str::<QualityRating>("7.5").is_ok());
        assert!(serde_json::from_str::<QualityRating>("11").is_err());
    }

    #[test]
    fn token_costs_sum() {
        let total: TokenCost = [0.1, 0.2, 0.3]
            .into_iter()
            .filter_map(TokenCost::new)
            .sum();
        assert!((total.as_f64() - 0.6).abs() < 1e-12);
    }
}
