//! Replay log extraction.
//!
//! Turns the `data` section of a BoardGameArena replay log into an ordered
//! list of [`Action`]s and derives the match [`Outcome`]. The layout is:
//!
//! ```text
//! data
//!   players[]      { id, color }
//!   logs[]         { move_id, data[] }
//!     data[]       { type, log, args { notation, type_copied?, winner? } }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::action::{Action, ActionKind};
use crate::game_data::Outcome;

const WHITE_COLOR: &str = "ffffff";
const BLACK_COLOR: &str = "000000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("missing '{0}' section")]
    MissingField(&'static str),

    #[error("replay has no players")]
    NoPlayers,

    #[error("no {0} player in replay")]
    MissingColor(&'static str),

    #[error("malformed move group at position {0}")]
    MalformedMoveGroup(usize),

    #[error("move {move_number}: {reason}")]
    MalformedEvent {
        move_number: i64,
        reason: &'static str,
    },
}

/// Everything a replay tells us about one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMatch {
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
    pub actions: Vec<Action>,
}

/// Parse a replay's `data` section.
pub fn extract(data: &Value) -> Result<ExtractedMatch, ExtractionError> {
    let players = data
        .get("players")
        .and_then(Value::as_array)
        .ok_or(ExtractionError::MissingField("players"))?;
    if players.is_empty() {
        return Err(ExtractionError::NoPlayers);
    }

    let white = player_with_color(players, WHITE_COLOR).ok_or(ExtractionError::MissingColor("white"))?;
    let black = player_with_color(players, BLACK_COLOR).ok_or(ExtractionError::MissingColor("black"))?;

    let logs = data
        .get("logs")
        .and_then(Value::as_array)
        .ok_or(ExtractionError::MissingField("logs"))?;

    let mut actions = Vec::new();
    let mut surround_winners: Vec<String> = Vec::new();

    for (idx, group) in logs.iter().enumerate() {
        let move_number = group
            .get("move_id")
            .and_then(int_value)
            .ok_or(ExtractionError::MalformedMoveGroup(idx))?;
        let events = group
            .get("data")
            .and_then(Value::as_array)
            .ok_or(ExtractionError::MalformedMoveGroup(idx))?;

        for event in events {
            let malformed = |reason| ExtractionError::MalformedEvent { move_number, reason };

            let type_str = event
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("event without a type"))?;
            let Some(kind) = ActionKind::parse(type_str) else {
                continue;
            };

            let log = event
                .get("log")
                .map(log_text)
                .ok_or_else(|| malformed("event without a log line"))?;

            let mut action = Action {
                move_number,
                kind,
                notation: None,
                type_copied: None,
                log,
            };

            match kind {
                ActionKind::PiecePlaced => {
                    let args = event.get("args").ok_or_else(|| malformed("tokenPlayed without args"))?;
                    let notation = args
                        .get("notation")
                        .and_then(Value::as_str)
                        .ok_or_else(|| malformed("tokenPlayed without notation"))?;
                    action.notation = Some(notation.to_string());
                    action.type_copied = args
                        .get("type_copied")
                        .and_then(id_string)
                        .filter(|s| !s.is_empty());
                }
                ActionKind::SurroundEnded => {
                    let winner = event
                        .get("args")
                        .and_then(|args| args.get("winner"))
                        .and_then(id_string)
                        .ok_or_else(|| malformed("queenSurr without winner"))?;
                    surround_winners.push(winner);
                }
                ActionKind::DrawOffered | ActionKind::DrawAccepted | ActionKind::Pass => {}
            }

            actions.push(action);
        }
    }

    Ok(ExtractedMatch {
        white,
        black,
        outcome: derive_outcome(&surround_winners),
        actions,
    })
}

/// The number of surround events decides the result, not any single event:
/// none is a draw, two or more is a tie.
pub fn derive_outcome(surround_winners: &[String]) -> Outcome {
    match surround_winners {
        [] => Outcome::Draw,
        [winner] => Outcome::Winner(winner.clone()),
        _ => Outcome::Tie,
    }
}

fn player_with_color(players: &[Value], color: &str) -> Option<String> {
    players
        .iter()
        .find(|p| {
            p.get("color")
                .and_then(Value::as_str)
                .map(|c| c.trim_start_matches('#').eq_ignore_ascii_case(color))
                .unwrap_or(false)
        })
        .and_then(|p| p.get("id"))
        .and_then(id_string)
}

/// BGA sends ids as strings or numbers depending on the endpoint.
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn int_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn log_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
