//! # Suspicion Policy
//!
//! Heuristic flagging of audit entries that warrant manual review.
//!
//! ## Policy, Not Structure
//! The heuristic is deliberately behind a trait: what counts as suspicious is
//! a policy decision that changes per deployment, while the recorder's
//! interface stays fixed. Swapping the policy never touches the audit
//! pipeline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Suspicion Evaluation                                  │
//! │                                                                         │
//! │  AuditDraft ──► SuspicionPolicy::evaluate ──► Option<String>           │
//! │                                                   │                     │
//! │                        None ──────────────────────┼──► clean entry      │
//! │                        Some(reason) ──────────────┴──► is_suspicious    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Timelike;

use crate::types::{AuditAction, AuditDraft};

/// Decides whether an audit entry should be flagged for manual review.
///
/// Implementations must be pure: same draft, same verdict. State needed by a
/// heuristic (e.g. a failure counter) travels in the draft's `details`.
pub trait SuspicionPolicy: Send + Sync {
    /// Returns a human-readable reason if the entry is suspicious.
    fn evaluate(&self, draft: &AuditDraft) -> Option<String>;
}

/// Default heuristic used when no deployment-specific policy is configured.
///
/// ## What It Flags
/// - Stock adjustments (and write-offs) moving an unusually large quantity
/// - Credit adjustments above a cash threshold
/// - Repeated failed verification attempts reported in the details
/// - Privileged actions performed during off-hours
#[derive(Debug, Clone)]
pub struct DefaultSuspicionPolicy {
    /// Absolute stock delta at or above which an adjustment is flagged.
    pub large_adjustment_units: i64,
    /// Credit movement at or above which an adjustment is flagged, in cents.
    pub large_credit_cents: i64,
    /// Failed verification attempts at or above which the next one is flagged.
    pub repeated_failure_threshold: i64,
    /// Inclusive start of the off-hours window (UTC hour).
    pub off_hours_start: u32,
    /// Exclusive end of the off-hours window (UTC hour).
    pub off_hours_end: u32,
}

impl Default for DefaultSuspicionPolicy {
    fn default() -> Self {
        DefaultSuspicionPolicy {
            large_adjustment_units: 500,
            large_credit_cents: 500_000, // 5,000.00 in major units
            repeated_failure_threshold: 3,
            off_hours_start: 0,
            off_hours_end: 5,
        }
    }
}

impl DefaultSuspicionPolicy {
    fn in_off_hours(&self, hour: u32) -> bool {
        if self.off_hours_start <= self.off_hours_end {
            hour >= self.off_hours_start && hour < self.off_hours_end
        } else {
            // Window wraps midnight, e.g. 23..5
            hour >= self.off_hours_start || hour < self.off_hours_end
        }
    }
}

impl SuspicionPolicy for DefaultSuspicionPolicy {
    fn evaluate(&self, draft: &AuditDraft) -> Option<String> {
        // Large stock movement
        if matches!(
            draft.action,
            AuditAction::StockAdjusted | AuditAction::StockWrittenOff
        ) {
            if let Some(quantity) = draft.details.get("quantity").and_then(|v| v.as_i64()) {
                if quantity.abs() >= self.large_adjustment_units {
                    return Some(format!(
                        "stock adjustment of {} units exceeds review threshold of {}",
                        quantity, self.large_adjustment_units
                    ));
                }
            }
        }

        // Large credit movement
        if draft.action == AuditAction::CreditAdjusted {
            if let Some(amount) = draft.details.get("amount_cents").and_then(|v| v.as_i64()) {
                if amount >= self.large_credit_cents {
                    return Some(format!(
                        "credit adjustment of {} cents exceeds review threshold of {}",
                        amount, self.large_credit_cents
                    ));
                }
            }
        }

        // Repeated failed verifications, reported by the receipt workflow
        if let Some(failures) = draft
            .details
            .get("failed_verifications")
            .and_then(|v| v.as_i64())
        {
            if failures >= self.repeated_failure_threshold {
                return Some(format!(
                    "{} failed verification attempts on the same receipt",
                    failures
                ));
            }
        }

        // Off-hours privileged action
        if draft.action.is_privileged() && self.in_off_hours(draft.occurred_at.hour()) {
            return Some(format!(
                "privileged action {} performed off-hours at {:02}:00 UTC",
                draft.action,
                draft.occurred_at.hour()
            ));
        }

        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
