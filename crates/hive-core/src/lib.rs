//! Platform-independent Hive match model, replay extraction and UHP export.

pub mod action;
pub mod game_data;
pub mod replay;
pub mod uhp;

pub use action::{Action, ActionKind};
pub use game_data::{ExpansionFlags, MatchData, MatchRecord, Outcome};
