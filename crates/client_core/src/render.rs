//! Board renderer: snapshot + current player + orientation -> full 64-square view.
//!
//! Every call builds a fresh [`BoardView`]; callers replace their previous view
//! wholesale. Coordinates attached to squares are always the service's logical
//! `(row, col)`; orientation only changes the order squares are laid out in.

use shared::domain::{
    BoardSnapshot, Coord, CurrentPlayer, PieceCode, SideCaseMapping, SquareColor, BOARD_SIZE,
};

/// Gesture hooks a square exposes to the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareListeners {
    pub drag_over: bool,
    pub drop: bool,
}

impl SquareListeners {
    const DROP_TARGET: Self = Self {
        drag_over: true,
        drop: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceView {
    pub code: PieceCode,
    /// Also means a pickup listener is attached.
    pub draggable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareView {
    pub coord: Coord,
    pub color: SquareColor,
    pub piece: Option<PieceView>,
    pub listeners: SquareListeners,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    squares: Vec<SquareView>,
    current_player: CurrentPlayer,
    flipped: bool,
}

pub fn render_board(
    snapshot: &BoardSnapshot,
    current_player: CurrentPlayer,
    flipped: bool,
    mapping: &SideCaseMapping,
) -> BoardView {
    let mut squares = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE);
    for row in display_row_order(flipped) {
        for col in 0..BOARD_SIZE {
            let coord = Coord { row, col };
            let piece = snapshot.piece_at(coord).map(|code| PieceView {
                code,
                draggable: mapping.side_of(code) == current_player,
            });
            squares.push(SquareView {
                coord,
                color: coord.color(),
                piece,
                listeners: SquareListeners::DROP_TARGET,
            });
        }
    }

    BoardView {
        squares,
        current_player,
        flipped,
    }
}

/// Logical row indices in the order they are displayed top to bottom.
pub fn display_row_order(flipped: bool) -> Vec<usize> {
    if flipped {
        (0..BOARD_SIZE).rev().collect()
    } else {
        (0..BOARD_SIZE).collect()
    }
}

impl BoardView {
    /// All 64 squares in display order.
    pub fn squares(&self) -> &[SquareView] {
        &self.squares
    }

    pub fn rows(&self) -> impl Iterator<Item = &[SquareView]> {
        self.squares.chunks(BOARD_SIZE)
    }

    pub fn current_player(&self) -> CurrentPlayer {
        self.current_player
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn square(&self, coord: Coord) -> Option<&SquareView> {
        self.squares.iter().find(|square| square.coord == coord)
    }

    pub fn piece_at(&self, coord: Coord) -> Option<PieceView> {
        self.square(coord).and_then(|square| square.piece)
    }

    pub fn is_draggable(&self, coord: Coord, code: PieceCode) -> bool {
        matches!(
            self.piece_at(coord),
            Some(PieceView { code: shown, draggable: true }) if shown == code
        )
    }

    pub fn display_rows(&self) -> Vec<usize> {
        self.rows().map(|row| row[0].coord.row).collect()
    }

    /// Plain-text board for terminals. Draggable pieces are followed by `*`.
    pub fn to_text(&self) -> String {
        let mut out = String::from("    0  1  2  3  4  5  6  7\n");
        for row in self.rows() {
            out.push_str(&format!("{}  ", row[0].coord.row));
            for square in row {
                match square.piece {
                    Some(piece) if piece.draggable => out.push_str(&format!(" {}*", piece.code)),
                    Some(piece) => out.push_str(&format!(" {} ", piece.code)),
                    None if square.color == SquareColor::Light => out.push_str(" . "),
                    None => out.push_str(" : "),
                }
            }
            out.push('\n');
        }
        out.push_str(&format!("to move: {}", self.current_player));
        out
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
