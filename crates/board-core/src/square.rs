//! Square names, zero-based coordinates and the coordinate-notation move.

use std::fmt;
use std::str::FromStr;

use shakmaty::{CastlingMode, Move, Square};

use crate::error::CodecError;

const FILES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// Zero-based (file, rank) pair. (0, 0) is a1. Both are always below 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    file: u8,
    rank: u8,
}

impl Coord {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    pub fn file(&self) -> u8 {
        self.file
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Coordinates of a rules-engine square.
    pub fn from_square(sq: Square) -> Self {
        Self {
            file: sq.file() as u8,
            rank: sq.rank() as u8,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", FILES[self.file as usize], self.rank + 1)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Coord {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        square_coords(s)
    }
}

/// Find the zero-based (file, rank) of an algebraic square such as "b3".
pub fn square_coords(square: &str) -> Result<Coord, CodecError> {
    let mut chars = square.chars();
    let (Some(file_char), Some(rank_char), None) = (chars.next(), chars.next(), chars.next())
    else {
        return Err(CodecError::InvalidSquare(square.to_string()));
    };

    let file = FILES
        .iter()
        .position(|&f| f == file_char)
        .ok_or(CodecError::InvalidFile(file_char))?;
    let rank = match rank_char.to_digit(10) {
        Some(d @ 1..=8) => d - 1,
        _ => return Err(CodecError::InvalidRank(rank_char)),
    };

    Ok(Coord {
        file: file as u8,
        rank: rank as u8,
    })
}

/// Square name for zero-based coordinates, the inverse of [`square_coords`].
pub fn coord_square(file: u8, rank: u8) -> Result<String, CodecError> {
    Coord::new(file, rank)
        .map(|c| c.name())
        .ok_or_else(|| CodecError::InvalidSquare(format!("({file}, {rank})")))
}

/// A move in coordinate notation: origin, destination and optional
/// promotion piece. This is what crosses the board and server boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardMove {
    pub from: Coord,
    pub to: Coord,
    pub promotion: Option<char>,
}

impl BoardMove {
    /// Parse "e2e4" or "e7e8q".
    pub fn parse(uci: &str) -> Result<Self, CodecError> {
        if !uci.is_ascii() || !(4..=5).contains(&uci.len()) {
            return Err(CodecError::InvalidSquare(uci.to_string()));
        }
        let from = square_coords(&uci[..2])?;
        let to = square_coords(&uci[2..4])?;
        let promotion = match uci[4..].chars().next() {
            None => None,
            Some(p @ ('q' | 'r' | 'b' | 'n')) => Some(p),
            Some(_) => return Err(CodecError::InvalidSquare(uci.to_string())),
        };
        Ok(Self { from, to, promotion })
    }

    /// Coordinate notation of a legal move. Castling is written king-to-target
    /// in standard mode and king-to-rook in Chess960 mode.
    pub fn from_move(mv: &Move, mode: CastlingMode) -> Result<Self, CodecError> {
        Self::parse(&mv.to_uci(mode).to_string())
    }

    pub fn touches(&self, coord: Coord) -> bool {
        self.from == coord || self.to == coord
    }
}

impl fmt::Display for BoardMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl FromStr for BoardMove {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
