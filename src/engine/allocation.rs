//! Allocation primitives.
//!
//! The free functions here run against an already-open transaction and do no
//! auditing of their own; maintenance tooling may call them directly through
//! [`crate::txn::run`] with whichever [`crate::txn::Gate`] it needs. The
//! [`Store`] methods wrap each one in a single audited transaction.

use hashbrown::HashMap;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::{
    clock::Clock,
    error::{CoreError, CoreResult},
    model::{Court, CourtOccupancy, Occupant, Seat},
    store::{Store, rows},
    txn::{self, Gate},
    types::{CourtId, POSITIONS_PER_COURT, PersonId, Position, Status, is_valid_position},
};

/// Full occupancy of `court`, one seat per position.
pub fn seats(conn: &Connection, court: CourtId) -> CoreResult<Vec<Seat>> {
    let mut by_position: HashMap<Position, PersonId> = HashMap::new();
    for assignment in rows::assignments_for_court(conn, court)? {
        by_position.insert(assignment.position, assignment.person);
    }

    let mut out = Vec::with_capacity(POSITIONS_PER_COURT as usize);
    for position in 0..POSITIONS_PER_COURT {
        let occupant = match by_position.get(&position) {
            Some(person_id) => {
                let person = rows::require_person(conn, *person_id)?;
                Some(Occupant {
                    person_id: person.id,
                    knownas: person.knownas,
                })
            }
            None => None,
        };
        out.push(Seat { position, occupant });
    }
    Ok(out)
}

/// Court row joined with its occupancy.
pub fn occupancy(conn: &Connection, court: &Court) -> CoreResult<CourtOccupancy> {
    Ok(CourtOccupancy {
        id: court.id,
        name: court.name.clone(),
        seats: seats(conn, court.id)?,
    })
}

/// Seats the longest-waiting people in every free position of `court`.
///
/// Stops quietly when the queue runs dry; occupied positions are untouched.
/// Returns the resulting occupancy for every position.
pub fn fill_court(conn: &Connection, court: CourtId) -> CoreResult<Vec<Seat>> {
    rows::require_court(conn, court)?;

    let mut occupied: HashMap<Position, PersonId> = HashMap::new();
    for assignment in rows::assignments_for_court(conn, court)? {
        occupied.insert(assignment.position, assignment.person);
    }

    let mut seated = 0usize;
    for position in 0..POSITIONS_PER_COURT {
        if occupied.contains_key(&position) {
            continue;
        }
        let Some(next) = rows::first_waiter(conn)? else {
            debug!(court_id = court, position, "no more waiters");
            break;
        };
        rows::delete_waiters_for_person(conn, next.person)?;
        rows::insert_assignment(conn, court, next.person, position)?;
        debug!(court_id = court, position, person_id = next.person, "seated");
        seated += 1;
    }

    info!(court_id = court, seated, "court filled");
    seats(conn, court)
}

/// Vacates every position on `court`.
///
/// Vacated people still in player status rejoin the back of the queue;
/// anyone else is simply dropped. Returns the vacated people in position
/// order.
pub fn clear_court(conn: &Connection, clock: &dyn Clock, court: CourtId) -> CoreResult<Vec<PersonId>> {
    rows::require_court(conn, court)?;

    let assignments = rows::assignments_for_court(conn, court)?;
    rows::delete_assignments_for_court(conn, court)?;

    let mut vacated = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let person = rows::require_person(conn, assignment.person)?;
        if person.status == Status::Player {
            rows::insert_waiter(conn, person.id, clock.now_ms())?;
            debug!(court_id = court, person_id = person.id, "requeued");
        } else {
            debug!(court_id = court, person_id = person.id, status = %person.status, "dropped");
        }
        vacated.push(person.id);
    }

    info!(court_id = court, vacated = vacated.len(), "court cleared");
    Ok(vacated)
}

/// Moves a player to the back of the queue, wherever they are now.
pub fn make_player_wait(conn: &Connection, clock: &dyn Clock, person: PersonId) -> CoreResult<()> {
    let found = rows::require_person(conn, person)?;
    if found.status != Status::Player {
        return Err(CoreError::BadRequest(format!(
            "person [{person}] is not a player: status: {}",
            found.status
        )));
    }

    rows::delete_assignments_for_person(conn, person)?;
    rows::delete_waiters_for_person(conn, person)?;
    rows::insert_waiter(conn, person, clock.now_ms())?;
    debug!(person_id = person, "player waiting");
    Ok(())
}

/// Seats a player at (`court`, `position`), removing any current row first.
///
/// An occupied target position surfaces as a store constraint error.
pub fn make_player_play(
    conn: &Connection,
    person: PersonId,
    court: CourtId,
    position: Position,
) -> CoreResult<()> {
    let found = rows::require_person(conn, person)?;
    if found.status != Status::Player {
        return Err(CoreError::BadRequest(format!(
            "person [{person}] is not a player: status: {}",
            found.status
        )));
    }
    rows::require_court(conn, court)?;
    if !is_valid_position(position) {
        return Err(CoreError::BadRequest(format!(
            "unexpected position: {position}"
        )));
    }

    rows::delete_assignments_for_person(conn, person)?;
    rows::delete_waiters_for_person(conn, person)?;
    rows::insert_assignment(conn, court, person, position)?;
    debug!(person_id = person, court_id = court, position, "player playing");
    Ok(())
}

impl Store {
    /// Fills `court` from the waiting queue in one audited transaction.
    pub fn fill_court(&mut self, court: CourtId) -> CoreResult<Vec<Seat>> {
        txn::run(self, Gate::Audited, "fill_court", |conn, _| fill_court(conn, court))
    }

    /// Clears `court`, requeueing its players, in one audited transaction.
    pub fn clear_court(&mut self, court: CourtId) -> CoreResult<Vec<PersonId>> {
        txn::run(self, Gate::Audited, "clear_court", |conn, clock| {
            clear_court(conn, clock, court)
        })
    }

    /// Sends a player to the back of the queue in one audited transaction.
    pub fn make_player_wait(&mut self, person: PersonId) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "make_player_wait", |conn, clock| {
            make_player_wait(conn, clock, person)
        })
    }

    /// Seats a player in one audited transaction.
    pub fn make_player_play(
        &mut self,
        person: PersonId,
        court: CourtId,
        position: Position,
    ) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "make_player_play", |conn, _| {
            make_player_play(conn, person, court, position)
        })
    }

    /// Current occupancy of one court.
    pub fn court_occupancy(&self, court: CourtId) -> CoreResult<CourtOccupancy> {
        txn::read(self, |conn| {
            let found = rows::require_court(conn, court)?;
            occupancy(conn, &found)
        })
    }

    /// Waiting queue in FIFO order.
    pub fn waiting_queue(&self) -> CoreResult<Vec<PersonId>> {
        txn::read(self, |conn| {
            Ok(rows::list_waiters(conn)?
                .into_iter()
                .map(|entry| entry.person)
                .collect())
        })
    }
}
