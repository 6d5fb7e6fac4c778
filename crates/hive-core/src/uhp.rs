//! Universal Hive Protocol game strings.
//!
//! A game string is `GameType;GameState;Turn;move1;move2;...`, e.g.
//! `Base+MLP;WhiteWins;Black[12];wS1;bG1 -wS1;...`.

use thiserror::Error;

use crate::action::{Action, ActionKind};
use crate::game_data::{ExpansionFlags, MatchRecord, Outcome};

pub const BASE_GAME: &str = "Base";
pub const PASS_MOVE: &str = "pass";

// Bare notation markers some sources store in place of a move.
const ACCEPT_DRAW: &str = "accept-draw";
const OFFER_DRAW: &str = "offer-draw";
const DECLINE_DRAW: &str = "decline-draw";
const RESIGN: &str = "resign";

// Free-text results reported by sources without player ids.
const REPORTED_WHITE_WINS: &str = "white wins";
const REPORTED_BLACK_WINS: &str = "black wins";
const REPORTED_DRAW: &str = "draw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Draw,
    WhiteWins,
    BlackWins,
}

impl GameState {
    pub const fn as_str(self) -> &'static str {
        match self {
            GameState::Draw => "Draw",
            GameState::WhiteWins => "WhiteWins",
            GameState::BlackWins => "BlackWins",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalizeError {
    #[error("can't find a winner from ({winner}) for table {table_id}")]
    UnresolvableWinner { table_id: i64, winner: String },

    #[error("no actions found for table {0}")]
    NoActions(i64),
}

/// `Base`, or `Base+` followed by the active expansion letters.
pub fn game_type(flags: ExpansionFlags) -> String {
    if flags.any() {
        format!("{BASE_GAME}+{}", flags.letters())
    } else {
        BASE_GAME.to_string()
    }
}

/// Resolve the recorded outcome to a game state before looking at the moves.
/// `Ok(None)` means the outcome text is unknown; a later accept-draw may
/// still settle it.
pub fn resolve_state(record: &MatchRecord) -> Result<Option<GameState>, CanonicalizeError> {
    match &record.outcome {
        Outcome::Draw | Outcome::Tie => Ok(Some(GameState::Draw)),
        Outcome::Winner(id) if *id == record.white => Ok(Some(GameState::WhiteWins)),
        Outcome::Winner(id) if *id == record.black => Ok(Some(GameState::BlackWins)),
        Outcome::Winner(id) => Err(CanonicalizeError::UnresolvableWinner {
            table_id: record.table_id,
            winner: id.clone(),
        }),
        Outcome::Reported(text) => Ok(match text.trim().to_ascii_lowercase().as_str() {
            REPORTED_WHITE_WINS => Some(GameState::WhiteWins),
            REPORTED_BLACK_WINS => Some(GameState::BlackWins),
            REPORTED_DRAW => Some(GameState::Draw),
            _ => None,
        }),
    }
}

/// `White[n]` or `Black[n]` for the position after `num_moves` moves.
pub fn turn_token(num_moves: usize) -> String {
    let turn = num_moves / 2 + 1;
    let side = if num_moves % 2 == 0 { "White" } else { "Black" };
    format!("{side}[{turn}]")
}

/// Build the game string for one match from its actions in stored order.
pub fn canonicalize(record: &MatchRecord, actions: &[Action]) -> Result<String, CanonicalizeError> {
    let mut state = resolve_state(record)?;

    if actions.is_empty() {
        return Err(CanonicalizeError::NoActions(record.table_id));
    }

    let mut moves: Vec<String> = Vec::with_capacity(actions.len());

    for action in actions {
        match action.notation.as_deref() {
            None | Some("") => match action.kind {
                ActionKind::DrawAccepted => state = Some(GameState::Draw),
                ActionKind::Pass => moves.push(PASS_MOVE.to_string()),
                ActionKind::DrawOffered | ActionKind::SurroundEnded => {}
                ActionKind::PiecePlaced => tracing::warn!(
                    table_id = record.table_id,
                    move_number = action.move_number,
                    "Expected move notation"
                ),
            },
            Some(ACCEPT_DRAW) => state = Some(GameState::Draw),
            Some(OFFER_DRAW | DECLINE_DRAW | RESIGN) => {}
            Some(notation) => {
                moves.push(notation.trim_matches(|c| c == '[' || c == ']').trim().to_string());
            }
        }
    }

    let state = state.ok_or_else(|| CanonicalizeError::UnresolvableWinner {
        table_id: record.table_id,
        winner: record.outcome.to_string(),
    })?;

    Ok(format!(
        "{};{};{};{}",
        game_type(record.expansions),
        state.as_str(),
        turn_token(moves.len()),
        moves.join(";")
    ))
}
