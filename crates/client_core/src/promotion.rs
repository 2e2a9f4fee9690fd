//! Promotion sub-flow. While open, the board takes no gestures until a role is
//! picked or the flow is cancelled.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Coord, PieceCode, PromotionRole, SideCaseMapping},
    protocol::{MoveRequest, PromotionFinalizeRequest},
};

/// How a promotion reaches the service.
///
/// `Atomic` opens the promotion prompt on drop, before the service has ruled
/// on the move. `FollowUp` submits the plain move and opens the prompt only
/// after the service accepts it, without refreshing the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// Ask for the role first, then send one move carrying it.
    #[default]
    Atomic,
    /// Send the plain move, then finalize on the legacy promote endpoint.
    FollowUp,
}

impl FromStr for PromotionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "atomic" => Ok(PromotionMode::Atomic),
            "follow_up" | "followup" | "legacy" => Ok(PromotionMode::FollowUp),
            other => Err(format!("unknown promotion mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingPromotion {
    /// Pawn move held back until the role is known.
    BeforeMove { request: MoveRequest },
    /// Pawn already sits on `target` server-side.
    AfterMove { target: Coord, pawn: PieceCode },
}

impl PendingPromotion {
    pub fn target(&self) -> Coord {
        match self {
            PendingPromotion::BeforeMove { request } => request.target,
            PendingPromotion::AfterMove { target, .. } => *target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionAction {
    SubmitMove(MoveRequest),
    Finalize(PromotionFinalizeRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromotionFlow {
    #[default]
    Closed,
    Open(PendingPromotion),
}

impl PromotionFlow {
    pub fn is_open(&self) -> bool {
        matches!(self, PromotionFlow::Open(_))
    }

    pub fn pending(&self) -> Option<&PendingPromotion> {
        match self {
            PromotionFlow::Open(pending) => Some(pending),
            PromotionFlow::Closed => None,
        }
    }

    pub fn open(&mut self, pending: PendingPromotion) {
        *self = PromotionFlow::Open(pending);
    }

    /// Closes the flow and returns what has to be sent for `role`.
    pub fn choose(
        &mut self,
        role: PromotionRole,
        mapping: &SideCaseMapping,
    ) -> Option<PromotionAction> {
        let PromotionFlow::Open(pending) = std::mem::take(self) else {
            return None;
        };
        Some(match pending {
            PendingPromotion::BeforeMove { request } => {
                PromotionAction::SubmitMove(request.with_promotion(role))
            }
            PendingPromotion::AfterMove { target, pawn } => {
                PromotionAction::Finalize(PromotionFinalizeRequest {
                    target,
                    piece: mapping.code_for(mapping.side_of(pawn), role.role()),
                })
            }
        })
    }

    pub fn cancel(&mut self) -> Option<PendingPromotion> {
        match std::mem::take(self) {
            PromotionFlow::Open(pending) => Some(pending),
            PromotionFlow::Closed => None,
        }
    }
}
