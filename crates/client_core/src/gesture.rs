//! Per-gesture drag state machine: pickup captures a piece, drop turns it into a move.

use shared::{
    domain::{Coord, PieceCode},
    protocol::MoveRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Captured { piece: PieceCode, source: Coord },
}

/// Where a drop landed. A drop on a piece counts as a drop on its square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Square(Coord),
    Piece { square: Coord },
}

impl DropTarget {
    pub fn square(self) -> Coord {
        match self {
            DropTarget::Square(coord) | DropTarget::Piece { square: coord } => coord,
        }
    }
}

/// Answer to a drag-over: the platform default must be suppressed for drops to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    SuppressDefault,
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn state(&self) -> DragState {
        self.state
    }

    /// A new pickup replaces any capture left over from an abandoned gesture.
    pub fn pickup(&mut self, piece: PieceCode, source: Coord) {
        self.state = DragState::Captured { piece, source };
    }

    pub fn drag_over(&self) -> DropEffect {
        DropEffect::SuppressDefault
    }

    pub fn drop(&mut self, target: DropTarget) -> Option<MoveRequest> {
        match std::mem::take(&mut self.state) {
            DragState::Captured { piece, source } => {
                Some(MoveRequest::new(source, target.square(), piece))
            }
            DragState::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
