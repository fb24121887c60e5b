pub mod board;
pub mod catalog;
pub mod events;
pub mod log;
pub mod prompt;
