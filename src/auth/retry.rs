// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Finite retry table for authenticated calls.
//!
//! | Failure | Action | Limit per call |
//! |---------|--------|----------------|
//! | `TokenExpired` | refresh session, retry | 1 |
//! | `IdentityConflict` | recover identity, re-exchange, retry | 1 |
//! | anything else | propagate | 0 |
//!
//! Both recoverable kinds together are capped at two retries per call.

use crate::error::SessionError;

/// What the executor does after an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    RefreshAndRetry,
    RecoverAndRetry,
    Propagate,
}

/// Per-kind and combined retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_refreshes: u8,
    pub max_recoveries: u8,
    pub max_total: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_refreshes: 1,
            max_recoveries: 1,
            max_total: 2,
        }
    }
}

impl RetryPolicy {
    /// Never retry; every failure propagates.
    pub fn disabled() -> Self {
        Self {
            max_refreshes: 0,
            max_recoveries: 0,
            max_total: 0,
        }
    }

    pub fn action_for(&self, error: &SessionError) -> RecoveryAction {
        match error {
            SessionError::TokenExpired => RecoveryAction::RefreshAndRetry,
            SessionError::IdentityConflict { .. } => RecoveryAction::RecoverAndRetry,
            _ => RecoveryAction::Propagate,
        }
    }

    /// A fresh budget for one authenticated call.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            policy: *self,
            refreshes: 0,
            recoveries: 0,
        }
    }
}

/// Retries spent so far by one authenticated call.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    policy: RetryPolicy,
    refreshes: u8,
    recoveries: u8,
}

impl RetryBudget {
    /// Record a retry for `action` if the limits allow it.
    pub fn try_spend(&mut self, action: RecoveryAction) -> bool {
        if self.retries() >= self.policy.max_total {
            return false;
        }
        match action {
            RecoveryAction::RefreshAndRetry if self.refreshes < self.policy.max_refreshes => {
                self.refreshes += 1;
                true
            }
            RecoveryAction::RecoverAndRetry if self.recoveries < self.policy.max_recoveries => {
                self.recoveries += 1;
                true
            }
            _ => false,
        }
    }

    pub fn retries(&self) -> u8 {
        self.refreshes + self.recoveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_error_kind() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.action_for(&SessionError::TokenExpired),
            RecoveryAction::RefreshAndRetry
        );
        assert_eq!(
            policy.action_for(&SessionError::IdentityConflict { wallet_id_hint: None }),
            RecoveryAction::RecoverAndRetry
        );
        assert_eq!(
            policy.action_for(&SessionError::Network("reset".into())),
            RecoveryAction::Propagate
        );
        assert_eq!(policy.action_for(&SessionError::TimedOut), RecoveryAction::Propagate);
    }

    #[test]
    fn each_kind_retries_once() {
        let mut budget = RetryPolicy::default().budget();
        assert!(budget.try_spend(RecoveryAction::RefreshAndRetry));
        assert!(!budget.try_spend(RecoveryAction::RefreshAndRetry));
        assert!(budget.try_spend(RecoveryAction::RecoverAndRetry));
        assert!(!budget.try_spend(RecoveryAction::RecoverAndRetry));
        assert_eq!(budget.retries(), 2);
    }

    #[test]
    fn combined_cap_applies_across_kinds() {
        let policy = RetryPolicy {
            max_refreshes: 2,
            max_recoveries: 2,
            max_total: 2,
        };
        let mut budget = policy.budget();
        assert!(budget.try_spend(RecoveryAction::RecoverAndRetry));
        assert!(budget.try_spend(RecoveryAction::RefreshAndRetry));
        assert!(!budget.try_spend(RecoveryAction::RefreshAndRetry));
    }

    #[test]
    fn propagate_never_spends() {
        let mut budget = RetryPolicy::default().budget();
        assert!(!budget.try_spend(RecoveryAction::Propagate));
        assert_eq!(budget.retries(), 0);
    }

    #[test]
    fn disabled_policy_refuses_everything() {
        let mut budget = RetryPolicy::disabled().budget();
        assert!(!budget.try_spend(RecoveryAction::RefreshAndRetry));
    }
}
