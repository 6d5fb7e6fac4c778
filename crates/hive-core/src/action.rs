use serde::{Deserialize, Serialize};

/// Kind of a single event inside a match, named after the wire `type` strings
/// BoardGameArena uses in its replay logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// `tokenPlayed`: a piece was placed or moved.
    PiecePlaced,
    /// `queenSurr`: a queen got surrounded, ending the game.
    SurroundEnded,
    /// `offerDraw`
    DrawOffered,
    /// `acceptDraw`
    DrawAccepted,
    /// `message`: chat line or a forced pass.
    Pass,
}

impl ActionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActionKind::PiecePlaced => "tokenPlayed",
            ActionKind::SurroundEnded => "queenSurr",
            ActionKind::DrawOffered => "offerDraw",
            ActionKind::DrawAccepted => "acceptDraw",
            ActionKind::Pass => "message",
        }
    }

    /// Map a wire/storage type string to a kind. Anything else is an event
    /// we don't keep.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tokenPlayed" => Some(ActionKind::PiecePlaced),
            "queenSurr" => Some(ActionKind::SurroundEnded),
            "offerDraw" => Some(ActionKind::DrawOffered),
            "acceptDraw" => Some(ActionKind::DrawAccepted),
            "message" => Some(ActionKind::Pass),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized event of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// 1-based move group index as reported by the source.
    pub move_number: i64,
    pub kind: ActionKind,
    /// Move notation; only set for `PiecePlaced`.
    pub notation: Option<String>,
    /// Piece type a mosquito copied for this move, if any.
    pub type_copied: Option<String>,
    pub log: String,
}

impl Action {
    pub fn placed(move_number: i64, notation: impl Into<String>) -> Self {
        Self {
            move_number,
            kind: ActionKind::PiecePlaced,
            notation: Some(notation.into()),
            type_copied: None,
            log: String::new(),
        }
    }

    pub fn marker(move_number: i64, kind: ActionKind) -> Self {
        Self {
            move_number,
            kind,
            notation: None,
            type_copied: None,
            log: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_wire_name() {
        for kind in [
            ActionKind::PiecePlaced,
            ActionKind::SurroundEnded,
            ActionKind::DrawOffered,
            ActionKind::DrawAccepted,
            ActionKind::Pass,
        ] {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        assert_eq!(ActionKind::parse("updateReflexionTime"), None);
        assert_eq!(ActionKind::parse(""), None);
    }
}
