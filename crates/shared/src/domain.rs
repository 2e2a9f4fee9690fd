use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const BOARD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => f.write_str("white"),
            Side::Black => f.write_str("black"),
        }
    }
}

/// The side whose turn it is, as reported by the service on every poll.
pub type CurrentPlayer = Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
    Pawn,
}

impl Role {
    fn letter(self) -> char {
        match self {
            Role::Rook => 'r',
            Role::Knight => 'n',
            Role::Bishop => 'b',
            Role::Queen => 'q',
            Role::King => 'k',
            Role::Pawn => 'p',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionRole {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionRole {
    pub const ALL: [PromotionRole; 4] = [
        PromotionRole::Queen,
        PromotionRole::Rook,
        PromotionRole::Bishop,
        PromotionRole::Knight,
    ];

    pub fn role(self) -> Role {
        match self {
            PromotionRole::Queen => Role::Queen,
            PromotionRole::Rook => Role::Rook,
            PromotionRole::Bishop => Role::Bishop,
            PromotionRole::Knight => Role::Knight,
        }
    }
}

impl fmt::Display for PromotionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromotionRole::Queen => "queen",
            PromotionRole::Rook => "rook",
            PromotionRole::Bishop => "bishop",
            PromotionRole::Knight => "knight",
        })
    }
}

impl std::str::FromStr for PromotionRole {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "q" | "queen" => Ok(PromotionRole::Queen),
            "r" | "rook" => Ok(PromotionRole::Rook),
            "b" | "bishop" => Ok(PromotionRole::Bishop),
            "n" | "knight" => Ok(PromotionRole::Knight),
            other => Err(ParsePieceError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePieceError {
    #[error("unknown piece code {0:?}")]
    UnknownCode(String),
    #[error("unknown promotion role {0:?}")]
    UnknownRole(String),
}

/// One of the twelve single-letter piece tags. Case encodes side, letter encodes role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceCode(char);

impl PieceCode {
    pub fn new(c: char) -> Result<Self, ParsePieceError> {
        match c {
            'R' | 'N' | 'B' | 'Q' | 'K' | 'P' | 'r' | 'n' | 'b' | 'q' | 'k' | 'p' => Ok(Self(c)),
            other => Err(ParsePieceError::UnknownCode(other.to_string())),
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    pub fn is_uppercase(self) -> bool {
        self.0.is_ascii_uppercase()
    }

    pub fn role(self) -> Role {
        match self.0.to_ascii_lowercase() {
            'r' => Role::Rook,
            'n' => Role::Knight,
            'b' => Role::Bishop,
            'q' => Role::Queen,
            'k' => Role::King,
            _ => Role::Pawn,
        }
    }
}

impl fmt::Display for PieceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PieceCode {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(ParsePieceError::UnknownCode(s.to_string())),
        }
    }
}

impl Serialize for PieceCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = [0u8; 4];
        serializer.serialize_str(self.0.encode_utf8(&mut buf))
    }
}

impl<'de> Deserialize<'de> for PieceCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Which side owns the uppercase codes. The service fixes this; the client only mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideCaseMapping {
    pub uppercase: Side,
}

impl Default for SideCaseMapping {
    fn default() -> Self {
        Self {
            uppercase: Side::Black,
        }
    }
}

impl SideCaseMapping {
    pub fn side_of(&self, code: PieceCode) -> Side {
        if code.is_uppercase() {
            self.uppercase
        } else {
            self.uppercase.opponent()
        }
    }

    pub fn code_for(&self, side: Side, role: Role) -> PieceCode {
        let letter = role.letter();
        if side == self.uppercase {
            PieceCode(letter.to_ascii_uppercase())
        } else {
            PieceCode(letter)
        }
    }

    /// Lowercase pawns start on row 6 and advance toward row 0; uppercase pawns the reverse.
    pub fn promotion_row(&self, side: Side) -> usize {
        if side == self.uppercase {
            BOARD_SIZE - 1
        } else {
            0
        }
    }

    pub fn is_promotion_move(&self, piece: PieceCode, target: Coord) -> bool {
        piece.role() == Role::Pawn && target.row == self.promotion_row(self.side_of(piece))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some(Self { row, col })
    }

    pub fn color(self) -> SquareColor {
        if (self.row + self.col) % 2 == 0 {
            SquareColor::Light
        } else {
            SquareColor::Dark
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareColor {
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotShapeError {
    #[error("expected 8 rows, got {0}")]
    RowCount(usize),
    #[error("row {row} has {len} columns, expected 8")]
    ColumnCount { row: usize, len: usize },
}

/// Full 8x8 board as last reported by the service. Always replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardSnapshot {
    squares: [[Option<PieceCode>; BOARD_SIZE]; BOARD_SIZE],
}

impl BoardSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Vec<Option<PieceCode>>>) -> Result<Self, SnapshotShapeError> {
        if rows.len() != BOARD_SIZE {
            return Err(SnapshotShapeError::RowCount(rows.len()));
        }
        let mut squares = [[None; BOARD_SIZE]; BOARD_SIZE];
        for (row, cells) in rows.into_iter().enumerate() {
            if cells.len() != BOARD_SIZE {
                return Err(SnapshotShapeError::ColumnCount {
                    row,
                    len: cells.len(),
                });
            }
            for (col, cell) in cells.into_iter().enumerate() {
                squares[row][col] = cell;
            }
        }
        Ok(Self { squares })
    }

    pub fn with_piece(mut self, coord: Coord, piece: PieceCode) -> Self {
        self.squares[coord.row][coord.col] = Some(piece);
        self
    }

    pub fn piece_at(&self, coord: Coord) -> Option<PieceCode> {
        self.squares[coord.row][coord.col]
    }

    pub fn rows(&self) -> &[[Option<PieceCode>; BOARD_SIZE]; BOARD_SIZE] {
        &self.squares
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Coord, PieceCode)> + '_ {
        self.squares.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter_map(move |(col, cell)| cell.map(|piece| (Coord { row, col }, piece)))
        })
    }
}

impl Serialize for BoardSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.squares.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BoardSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<Vec<Option<PieceCode>>>::deserialize(deserializer)?;
        Self::from_rows(rows).map_err(de::Error::custom)
    }
}
