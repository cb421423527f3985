//! Free-usage quota and premium status.
//!
//! The gate is a plain counter/flag holder. It lives for the process and is
//! only mutated by the workflow machine (`record_attempt` after a verified
//! success) and by the user accepting the subscription offer.

use serde::{Deserialize, Serialize};

/// Number of free generations before the premium offer is required.
pub const FREE_LIMIT: u32 = 3;

/// Tracks free usage and premium status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementGate {
    free_attempts_used: u32,
    is_premium: bool,
    free_limit: u32,
}

/// Read-only view of the gate, pushed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    pub free_attempts_used: u32,
    pub free_limit: u32,
    pub is_premium: bool,
    /// Remaining free attempts, `None` for premium users.
    pub remaining: Option<u32>,
}

impl EntitlementGate {
    /// Create a gate with the default free limit.
    pub fn new() -> Self {
        Self::with_free_limit(FREE_LIMIT)
    }

    /// Create a gate with a custom free limit.
    pub fn with_free_limit(free_limit: u32) -> Self {
        Self { free_attempts_used: 0, is_premium: false, free_limit }
    }

    /// Whether a generation attempt may be dispatched.
    pub fn can_attempt(&self) -> bool {
        self.is_premium || self.free_attempts_used < self.free_limit
    }

    /// Count one successful generation against the free quota.
    ///
    /// Premium generations are not free attempts and leave the counter alone.
    pub fn record_attempt(&mut self) {
        if self.is_premium {
            return;
        }
        self.free_attempts_used = self.free_attempts_used.saturating_add(1);
        tracing::debug!(
            used = self.free_attempts_used,
            limit = self.free_limit,
            "Recorded free generation attempt"
        );
    }

    /// Grant premium. Idempotent and irreversible for the session.
    pub fn grant_premium(&mut self) {
        if !self.is_premium {
            tracing::info!("Premium granted");
        }
        self.is_premium = true;
    }

    pub fn free_attempts_used(&self) -> u32 {
        self.free_attempts_used
    }

    pub fn is_premium(&self) -> bool {
        self.is_premium
    }

    pub fn free_limit(&self) -> u32 {
        self.free_limit
    }

    /// Free attempts left, or `None` when premium.
    pub fn remaining_free_attempts(&self) -> Option<u32> {
        if self.is_premium {
            None
        } else {
            Some(self.free_limit.saturating_sub(self.free_attempts_used))
        }
    }

    pub fn snapshot(&self) -> EntitlementSnapshot {
        EntitlementSnapshot {
            free_attempts_used: self.free_attempts_used,
            free_limit: self.free_limit,
            is_premium: self.is_premium,
            remaining: self.remaining_free_attempts(),
        }
    }
}

impl Default for EntitlementGate {
    fn default() -> Self {
        Self::new()
    }
}
