//! Board protocol codec, move inference and move-list replay for an
//! electronic chessboard that mirrors a remote game.

pub use shakmaty;

pub mod codec;
pub mod error;
pub mod inference;
pub mod led;
pub mod replay;
pub mod square;

pub use codec::{decode_position, encode_placement, BoardSnapshot, Placement};
pub use error::{CodecError, InferenceError, ReplayError};
pub use inference::{board_diff, infer_move};
pub use led::{LedFrame, Signal};
pub use replay::{classify, replay, GameEnd, Replay, Termination};
pub use square::{coord_square, square_coords, BoardMove, Coord};
