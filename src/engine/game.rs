use hashbrown::{HashMap, HashSet};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    clock::Clock,
    error::{CoreError, CoreResult},
    model::Seat,
    store::{Store, rows},
    txn::{self, Gate},
    types::{CourtId, POSITIONS_PER_COURT, PersonId, Position, is_valid_position},
};

use super::allocation::{make_player_play, make_player_wait, seats};

/// Requested change to one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEdit {
    /// Seat index.
    pub position: Position,
    /// Occupant the caller last saw; must still match.
    pub expected: Option<PersonId>,
    /// Occupant wanted; `None` vacates.
    pub desired: Option<PersonId>,
}

/// Batch of position edits for one court.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameUpdate {
    /// Court being edited.
    pub court: CourtId,
    /// Edits, at most one per position.
    pub edits: Vec<PositionEdit>,
}

/// Applies `update` with optimistic checks against the current occupants.
///
/// Changed positions are vacated first, sending their occupants to the
/// queue; newly named occupants must then be waiting and are seated.
pub fn update_game(conn: &Connection, clock: &dyn Clock, update: &GameUpdate) -> CoreResult<Vec<Seat>> {
    rows::require_court(conn, update.court)?;
    validate_edits(update)?;

    let mut current: HashMap<Position, PersonId> = HashMap::new();
    for assignment in rows::assignments_for_court(conn, update.court)? {
        current.insert(assignment.position, assignment.person);
    }

    let mut changed = Vec::new();
    for edit in &update.edits {
        let occupant = current.get(&edit.position).copied();
        if occupant != edit.expected {
            return Err(CoreError::BadRequest(format!(
                "the player at position [{}] has changed: expected {:?}, found {:?}",
                edit.position, edit.expected, occupant
            )));
        }
        if occupant == edit.desired {
            debug!(position = edit.position, "position unchanged");
            continue;
        }
        if let Some(person) = occupant {
            make_player_wait(conn, clock, person)?;
        }
        changed.push(*edit);
    }

    let waiting: HashSet<PersonId> = rows::list_waiters(conn)?
        .into_iter()
        .map(|entry| entry.person)
        .collect();

    for edit in changed {
        let Some(person) = edit.desired else {
            continue;
        };
        if !waiting.contains(&person) {
            return Err(CoreError::BadRequest(format!(
                "cannot make player [{person}] play as the player is not waiting"
            )));
        }
        make_player_play(conn, person, update.court, edit.position)?;
    }

    seats(conn, update.court)
}

fn validate_edits(update: &GameUpdate) -> CoreResult<()> {
    if update.edits.len() > POSITIONS_PER_COURT as usize {
        return Err(CoreError::BadRequest(format!(
            "unexpected number of game positions: {}",
            update.edits.len()
        )));
    }

    let mut positions = HashSet::new();
    let mut desired = HashSet::new();
    for edit in &update.edits {
        if !is_valid_position(edit.position) {
            return Err(CoreError::BadRequest(format!(
                "unexpected position: {}",
                edit.position
            )));
        }
        if !positions.insert(edit.position) {
            return Err(CoreError::BadRequest(format!(
                "position [{}] edited twice",
                edit.position
            )));
        }
        if let Some(person) = edit.desired {
            if !desired.insert(person) {
                return Err(CoreError::BadRequest(format!(
                    "person [{person}] requested in two positions"
                )));
            }
        }
    }
    Ok(())
}

impl Store {
    /// Applies a batch of position edits in one audited transaction.
    pub fn update_game(&mut self, update: &GameUpdate) -> CoreResult<Vec<Seat>> {
        txn::run(self, Gate::Audited, "update_game", |conn, clock| {
            update_game(conn, clock, update)
        })
    }
}
