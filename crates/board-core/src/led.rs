//! LED frames for the board's 8x8 light array.
//!
//! The device takes two control bytes and eight row bytes, `0A 08 <R8> .. <R1>`,
//! rank 8 (the far side) first. Within a row byte the value of a lit square is
//! 128 for file a down to 1 for file h. E2-E4 is `0A 08 00 00 00 00 08 00 08 00`.

use std::fmt;

use crate::square::{BoardMove, Coord};

pub const LED_HEADER: [u8; 2] = [0x0A, 0x08];

/// Which LEDs are lit, one bit per square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LedFrame {
    /// Indexed by zero-based rank; bit 7 is file a.
    rows: [u8; 8],
}

impl LedFrame {
    pub const EMPTY: Self = Self { rows: [0; 8] };
    pub const FULL: Self = Self { rows: [0xFF; 8] };

    /// Build from eight rows of '0'/'1', rank 1 first, file a leftmost.
    /// Other characters count as off.
    pub const fn from_rows(rows: [&str; 8]) -> Self {
        let mut out = [0u8; 8];
        let mut rank = 0;
        while rank < 8 {
            let bytes = rows[rank].as_bytes();
            let mut file = 0;
            while file < 8 && file < bytes.len() {
                if bytes[file] == b'1' {
                    out[rank] |= 0x80 >> file;
                }
                file += 1;
            }
            rank += 1;
        }
        Self { rows: out }
    }

    /// Light the origin and destination of a move. When both share a rank the
    /// two file bits land in the same row byte.
    pub fn for_move(mv: &BoardMove) -> Self {
        let mut frame = Self::EMPTY;
        frame.set(mv.from, true);
        frame.set(mv.to, true);
        frame
    }

    pub fn from_squares<I: IntoIterator<Item = Coord>>(squares: I) -> Self {
        let mut frame = Self::EMPTY;
        for sq in squares {
            frame.set(sq, true);
        }
        frame
    }

    pub fn set(&mut self, sq: Coord, on: bool) {
        let mask = 0x80 >> sq.file();
        let row = &mut self.rows[sq.rank() as usize];
        if on {
            *row |= mask;
        } else {
            *row &= !mask;
        }
    }

    pub fn is_lit(&self, sq: Coord) -> bool {
        self.rows[sq.rank() as usize] & (0x80 >> sq.file()) != 0
    }

    pub fn lit_count(&self) -> u32 {
        self.rows.iter().map(|r| r.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == [0; 8]
    }

    /// Squares lit in `self` but not in `other`.
    pub fn without(&self, other: &LedFrame) -> Self {
        let mut rows = self.rows;
        for (row, mask) in rows.iter_mut().zip(other.rows) {
            *row &= !mask;
        }
        Self { rows }
    }

    /// Row bitmasks in device order, rank 8 first.
    pub fn device_rows(&self) -> [u8; 8] {
        let mut rows = self.rows;
        rows.reverse();
        rows
    }

    /// Bytes for a device write: header then one byte per rank, far rank first.
    pub fn encode(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..2].copy_from_slice(&LED_HEADER);
        out[2..].copy_from_slice(&self.device_rows());
        out
    }
}

/// Rendered rank 8 on top, one '0'/'1' row per line.
impl fmt::Display for LedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.device_rows().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{row:08b}")?;
        }
        Ok(())
    }
}

/// Decorative bitmaps used to signal status to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Ring = 1,
    BlackHalf = 2,
    WhiteHalf = 3,
    CenterLines = 4,
    CenterCross = 5,
    Scatter = 6,
}

impl Signal {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Signal::Ring),
            2 => Some(Signal::BlackHalf),
            3 => Some(Signal::WhiteHalf),
            4 => Some(Signal::CenterLines),
            5 => Some(Signal::CenterCross),
            6 => Some(Signal::Scatter),
            _ => None,
        }
    }

    pub fn frame(self) -> LedFrame {
        match self {
            Signal::Ring => RING,
            Signal::BlackHalf => BLACK_HALF,
            Signal::WhiteHalf => WHITE_HALF,
            Signal::CenterLines => CENTER_LINES,
            Signal::CenterCross => CENTER_CROSS,
            Signal::Scatter => SCATTER,
        }
    }
}

const RING: LedFrame = LedFrame::from_rows([
    "11111111", "10000001", "10111101", "10100101", "10100101", "10111101", "10000001",
    "11111111",
]);

const BLACK_HALF: LedFrame = LedFrame::from_rows([
    "00000000", "00000000", "00000000", "00000000", "11111111", "11111111", "11111111",
    "11111111",
]);

const WHITE_HALF: LedFrame = LedFrame::from_rows([
    "11111111", "11111111", "11111111", "11111111", "00000000", "00000000", "00000000",
    "00000000",
]);

const CENTER_LINES: LedFrame = LedFrame::from_rows([
    "11111111", "00000000", "00000000", "11111111", "11111111", "00000000", "00000000",
    "11111111",
]);

const CENTER_CROSS: LedFrame = LedFrame::from_rows([
    "00011000", "01011010", "00011000", "11111111", "11111111", "00011000", "01011010",
    "00011000",
]);

const SCATTER: LedFrame = LedFrame::from_rows([
    "11000011", "11011011", "00011000", "01100110", "01100110", "00011000", "11011011",
    "11000011",
]);
