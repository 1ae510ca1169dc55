//! Types shared between the combat server and its clients: the voxel
//! primitives pieces are made of, and the line-delimited JSON protocol.

pub mod cell;
pub mod content_array;
pub mod piece;
pub mod protocol;
pub mod rotation;
pub mod unit;
pub mod vector;

pub use cell::Cell;
pub use content_array::ContentArray;
pub use piece::Piece;
pub use protocol::{CombatSummary, Notification, PlayerSummary, Request};
pub use rotation::{EulerAngles, Rotation};
pub use unit::Unit;
pub use vector::{Vector, DIRECTIONS};
