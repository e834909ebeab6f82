use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Order;

/// Why a lifecycle transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Another driver holds the claim
    AlreadyClaimed,
    /// The order reached its terminal state
    AlreadyDelivered,
    /// Delivery already confirmed by a different driver
    AlreadyDeliveredByOther,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::AlreadyClaimed => "already claimed by another driver",
            RejectReason::AlreadyDelivered => "already delivered",
            RejectReason::AlreadyDeliveredByOther => "already delivered by other driver",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a claim or delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The transition holds. `replay` is set when the order was already in
    /// the requested state for the same driver and nothing was written.
    Accepted { order: Order, replay: bool },
    Rejected { order: Order, reason: RejectReason },
}

impl TransitionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransitionOutcome::Accepted { .. })
    }

    /// Accepted and actually written, as opposed to an idempotent replay
    pub fn is_fresh(&self) -> bool {
        matches!(self, TransitionOutcome::Accepted { replay: false, .. })
    }

    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Accepted { order, .. } | TransitionOutcome::Rejected { order, .. } => {
                order
            }
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            TransitionOutcome::Accepted { .. } => None,
            TransitionOutcome::Rejected { reason, .. } => Some(*reason),
        }
    }
}
