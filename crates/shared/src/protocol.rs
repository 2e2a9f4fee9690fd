use serde::{Deserialize, Serialize};

use crate::domain::{BoardSnapshot, Coord, CurrentPlayer, PieceCode, PromotionRole, Side};

/// `GET /chessboard`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub chessboard: BoardSnapshot,
    pub current_player: CurrentPlayer,
}

/// `POST /move`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub source: Coord,
    pub target: Coord,
    pub piece: PieceCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionRole>,
}

impl MoveRequest {
    pub fn new(source: Coord, target: Coord, piece: PieceCode) -> Self {
        Self {
            source,
            target,
            piece,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, role: PromotionRole) -> Self {
        self.promotion = Some(role);
        self
    }
}

/// `POST /promote`, the legacy follow-up after a pawn already landed on its last rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionFinalizeRequest {
    pub target: Coord,
    pub piece: PieceCode,
}

/// Body shared by move, reset, undo and promote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
        }
    }

    pub fn result(&self) -> MoveResult {
        if self.status == "success" {
            MoveResult::Success
        } else {
            MoveResult::Failure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Success,
    Failure,
}

/// `GET /history`, display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub player: Side,
    pub piece: PieceCode,
    pub source: Coord,
    pub target: Coord,
    #[serde(
        default,
        alias = "captured_piece",
        alias = "capturedPiece",
        skip_serializing_if = "Option::is_none"
    )]
    pub captured: Option<PieceCode>,
}
