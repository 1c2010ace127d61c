//! Token accounting.
//!
//! Every completion response may carry a [`Usage`] record. The loops sum
//! these across round-trips so callers see what a whole orchestration
//! call cost.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token counts for one request/response pair, or a running total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt (messages plus tool declarations).
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens produced by the completion.
    #[serde(default)]
    pub completion_tokens: u64,
    /// `prompt_tokens + completion_tokens`, as reported by the server.
    #[serde(default)]
    pub total_tokens: u64,
    /// Breakdown of prompt tokens, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    /// Breakdown of completion tokens, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

/// Prompt token breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    /// Tokens served from the prompt cache.
    #[serde(default)]
    pub cached_tokens: u64,
}

/// Completion token breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    /// Tokens spent on hidden reasoning.
    #[serde(default)]
    pub reasoning_tokens: u64,
}

impl Usage {
    /// Builds a usage record from prompt and completion counts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            ..Self::default()
        }
    }

    /// Cached prompt tokens, or zero.
    pub fn cached_tokens(&self) -> u64 {
        self.prompt_tokens_details.map_or(0, |d| d.cached_tokens)
    }

    /// Reasoning tokens, or zero.
    pub fn reasoning_tokens(&self) -> u64 {
        self.completion_tokens_details
            .map_or(0, |d| d.reasoning_tokens)
    }
}

/// Adds two optional details, treating `None` as zero but keeping `None`
/// when neither side reported anything.
fn add_details<T>(a: Option<T>, b: Option<T>, add: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(add(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl AddAssign<&Usage> for Usage {
    /// Accumulates counts with saturating arithmetic.
    fn add_assign(&mut self, rhs: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
        self.prompt_tokens_details = add_details(
            self.prompt_tokens_details,
            rhs.prompt_tokens_details,
            |x, y| PromptTokensDetails {
                cached_tokens: x.cached_tokens.saturating_add(y.cached_tokens),
            },
        );
        self.completion_tokens_details = add_details(
            self.completion_tokens_details,
            rhs.completion_tokens_details,
            |x, y| CompletionTokensDetails {
                reasoning_tokens: x.reasoning_tokens.saturating_add(y.reasoning_tokens),
            },
        );
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_new_computes_total() {
        let u = Usage::new(100, 50);
        assert_eq!(u.total_tokens, 150);
        assert_eq!(u.cached_tokens(), 0);
    }

    #[test]
    fn test_usage_add_assign_accumulates() {
        let mut total = Usage::default();
        total += &Usage::new(10, 5);
        total += Usage::new(20, 7);
        assert_eq!(total.prompt_tokens, 30);
        assert_eq!(total.completion_tokens, 12);
        assert_eq!(total.total_tokens, 42);
        assert!(total.completion_tokens_details.is_none());
    }

    #[test]
    fn test_usage_details_merge() {
        let a = Usage {
            completion_tokens_details: Some(CompletionTokensDetails {
                reasoning_tokens: 8,
            }),
            ..Usage::new(1, 1)
        };
        let b = Usage {
            prompt_tokens_details: Some(PromptTokensDetails { cached_tokens: 4 }),
            completion_tokens_details: Some(CompletionTokensDetails {
                reasoning_tokens: 2,
            }),
            ..Usage::new(1, 1)
        };
        let sum = a + b;
        assert_eq!(sum.reasoning_tokens(), 10);
        assert_eq!(sum.cached_tokens(), 4);
    }

    #[test]
    fn test_usage_saturates() {
        let mut u = Usage::new(u64::MAX, 0);
        u += Usage::new(1, 0);
        assert_eq!(u.prompt_tokens, u64::MAX);
    }

    #[test]
    fn test_usage_deserialize_partial() {
        let u: Usage = serde_json::from_str(r#"{"prompt_tokens": 3}"#).unwrap();
        assert_eq!(u.prompt_tokens, 3);
        assert_eq!(u.total_tokens, 0);
    }
}
