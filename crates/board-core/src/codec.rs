//! Chessnut board protocol: raw snapshot bytes to a piece-placement string and back.
//!
//! A snapshot is 32 bytes, two squares per byte. The device scans H8, G8, ... A8,
//! then rank 7 and so on down to A1. Within each byte the low nibble is the first
//! square in that scan order and the high nibble the second, so each 4-byte rank
//! chunk read back to front yields files a..h.
//!
//! The 32 bytes for the normal starting position are:
//! `58 23 31 85 44 44 44 44 00 .. 00 77 77 77 77 A6 C9 9B 6A`

use std::fmt;

use shakmaty::{Board, Color, Piece, Role, Square};

use crate::error::CodecError;

/// Report header the board sends in front of a snapshot.
pub const SNAPSHOT_HEADER: [u8; 2] = [0x01, 0x24];

pub const SNAPSHOT_LEN: usize = 32;

/// Piece alphabet indexed by nibble value. 0 is an empty square.
const PIECE_CODES: [Option<char>; 13] = [
    None,
    Some('q'),
    Some('k'),
    Some('b'),
    Some('p'),
    Some('n'),
    Some('R'),
    Some('P'),
    Some('r'),
    Some('B'),
    Some('N'),
    Some('Q'),
    Some('K'),
];

/// One instant of physical piece placement as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardSnapshot([u8; SNAPSHOT_LEN]);

impl BoardSnapshot {
    pub const EMPTY: Self = Self([0; SNAPSHOT_LEN]);

    /// Accept either a bare 32-byte block or a device report that starts
    /// with [`SNAPSHOT_HEADER`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let body = if bytes.len() == SNAPSHOT_LEN {
            bytes
        } else if bytes.len() >= SNAPSHOT_LEN + 2 && bytes[..2] == SNAPSHOT_HEADER {
            &bytes[2..SNAPSHOT_LEN + 2]
        } else {
            return Err(CodecError::SnapshotLength(bytes.len()));
        };

        let mut raw = [0u8; SNAPSHOT_LEN];
        raw.copy_from_slice(body);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; SNAPSHOT_LEN] {
        &self.0
    }

    /// Nibble for a square, `rank_from_top` 0 being rank 8 and `file` 0 file a.
    fn nibble(&self, rank_from_top: usize, file: usize) -> u8 {
        let byte = self.0[rank_from_top * 4 + 3 - file / 2];
        if file % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }
}

/// Board field of a FEN: 64 squares, rank 8 first, '/' between ranks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placement(String);

impl Placement {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placement of a rules-engine board.
    pub fn of(board: &Board) -> Self {
        Self(board.to_string())
    }

    pub fn to_board(&self) -> Result<Board, CodecError> {
        self.0
            .parse()
            .map_err(|_| CodecError::InvalidPlacement(self.0.clone()))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a snapshot into a placement string.
pub fn decode_position(snapshot: &BoardSnapshot) -> Result<Placement, CodecError> {
    let mut fen = String::with_capacity(72);

    for rank in 0..8 {
        let mut empty = 0;
        for file in 0..8 {
            let code = snapshot.nibble(rank, file);
            match PIECE_CODES.get(code as usize) {
                Some(None) => empty += 1,
                Some(Some(piece)) => {
                    if empty > 0 {
                        fen.push(char::from(b'0' + empty));
                        empty = 0;
                    }
                    fen.push(*piece);
                }
                None => return Err(CodecError::UnknownPiece(code)),
            }
        }
        if empty > 0 {
            fen.push(char::from(b'0' + empty));
        }
        if rank != 7 {
            fen.push('/');
        }
    }

    Ok(Placement(fen))
}

/// Encode a board the way the device would report it.
pub fn encode_placement(board: &Board) -> BoardSnapshot {
    let mut raw = [0u8; SNAPSHOT_LEN];

    for rank_from_top in 0..8u32 {
        for file in 0..8u32 {
            let sq = Square::from_coords(
                shakmaty::File::new(file),
                shakmaty::Rank::new(7 - rank_from_top),
            );
            let code = board.piece_at(sq).map(piece_code).unwrap_or(0);
            let idx = rank_from_top as usize * 4 + 3 - file as usize / 2;
            if file % 2 == 0 {
                raw[idx] |= code << 4;
            } else {
                raw[idx] |= code;
            }
        }
    }

    BoardSnapshot(raw)
}

fn piece_code(piece: Piece) -> u8 {
    // Pawns and rooks appear in both halves of the alphabet; the color picks the slot.
    match (piece.color, piece.role) {
        (Color::White, Role::Pawn) => 7,
        (Color::White, Role::Rook) => 6,
        (Color::Black, Role::Pawn) => 4,
        (Color::Black, Role::Rook) => 8,
        _ => PIECE_CODES
            .iter()
            .position(|c| *c == Some(piece.char()))
            .unwrap_or(0) as u8,
    }
}
