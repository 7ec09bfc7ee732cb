pub mod levels;
pub mod outcome;
