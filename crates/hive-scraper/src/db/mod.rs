pub mod actions;
pub mod matches;
pub mod players;
pub mod pool;
