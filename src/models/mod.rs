pub mod direction;
pub mod outcome;

pub use direction::Direction;
pub use outcome::*;
