use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Which optional pieces a match was played with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpansionFlags {
    pub mosquito: bool,
    pub ladybug: bool,
    pub pillbug: bool,
}

impl ExpansionFlags {
    pub const ALL: ExpansionFlags = ExpansionFlags {
        mosquito: true,
        ladybug: true,
        pillbug: true,
    };

    pub const fn new(mosquito: bool, ladybug: bool, pillbug: bool) -> Self {
        Self {
            mosquito,
            ladybug,
            pillbug,
        }
    }

    /// Parse a variant string such as `"lmp"` or `"MP"` (order and case don't matter).
    pub fn from_variant(variant: &str) -> Self {
        let v = variant.to_ascii_lowercase();
        Self {
            mosquito: v.contains('m'),
            ladybug: v.contains('l'),
            pillbug: v.contains('p'),
        }
    }

    pub fn any(&self) -> bool {
        self.mosquito || self.ladybug || self.pillbug
    }

    /// Active pieces as UHP expansion letters, always in `M`, `L`, `P` order.
    pub fn letters(&self) -> String {
        let mut s = String::with_capacity(3);
        if self.mosquito {
            s.push('M');
        }
        if self.ladybug {
            s.push('L');
        }
        if self.pillbug {
            s.push('P');
        }
        s
    }
}

/// How a match ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No queen was surrounded (agreed draw or abandoned position). Code 0.
    Draw,
    /// Both queens were surrounded on the same move. Code 1.
    Tie,
    /// Id of the winning player, as reported by the surround event.
    Winner(String),
    /// Free-text result reported by a source that doesn't use player ids,
    /// e.g. `"white wins"`.
    Reported(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Draw => f.write_str("0"),
            Outcome::Tie => f.write_str("1"),
            Outcome::Winner(id) => f.write_str(id),
            Outcome::Reported(text) => f.write_str(text),
        }
    }
}

/// One persisted match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub table_id: i64,
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
    pub expansions: ExpansionFlags,
}

/// A match as produced by a source scraper, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchData {
    pub record: MatchRecord,
    pub actions: Vec<Action>,
}
