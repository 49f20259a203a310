//! Retry policy for failed items.
//!
//! A pure decision function over `(attempt_count, item_type)`. Backoff delays
//! are advisory: they are logged and reported to the scheduler, never slept on
//! in-process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ItemType;

/// Outcome of a retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Another automatic attempt is permitted after this advisory delay
    RetryAfter(Duration),

    /// The ceiling is reached; only a manual retry revives the item
    GiveUp,
}

/// Per-type retry ceilings with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum failed attempts for episodes (network-flaky downloads)
    #[serde(default = "default_episode_ceiling")]
    pub episode_ceiling: u32,

    /// Maximum failed attempts for newsletters (local parsing)
    #[serde(default = "default_newsletter_ceiling")]
    pub newsletter_ceiling: u32,

    /// Delay before the first retry in seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Upper bound on the advisory delay in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_episode_ceiling() -> u32 {
    3
}
fn default_newsletter_ceiling() -> u32 {
    2
}
fn default_backoff_base() -> u64 {
    60
}
fn default_max_backoff() -> u64 {
    3600
} // 1 hour

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            episode_ceiling: default_episode_ceiling(),
            newsletter_ceiling: default_newsletter_ceiling(),
            backoff_base_secs: default_backoff_base(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    pub fn ceiling(&self, item_type: ItemType) -> u32 {
        match item_type {
            ItemType::Episode => self.episode_ceiling,
            ItemType::Newsletter => self.newsletter_ceiling,
        }
    }

    /// Delay after the given number of failed attempts (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs);
        Duration::from_secs(delay)
    }

    /// Check if another automatic attempt is permitted
    pub fn should_retry(&self, attempt_count: u32, item_type: ItemType) -> bool {
        attempt_count < self.ceiling(item_type)
    }

    pub fn decide(&self, attempt_count: u32, item_type: ItemType) -> RetryDecision {
        if self.should_retry(attempt_count, item_type) {
            RetryDecision::RetryAfter(self.delay_for_attempt(attempt_count))
        } else {
            RetryDecision::GiveUp
        }
    }
}
