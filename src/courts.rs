//! Court administration.

use rusqlite::Connection;
use tracing::info;

use crate::{
    clock::Clock,
    engine::allocation::{clear_court, occupancy},
    error::{CoreError, CoreResult},
    model::CourtOccupancy,
    store::{Store, rows},
    txn::{self, Gate},
    types::CourtId,
};

fn check_name(name: &str) -> CoreResult<()> {
    let len = name.chars().count();
    if !(3..=20).contains(&len) {
        return Err(CoreError::BadRequest(
            "court name must be between 3 and 20 characters".to_string(),
        ));
    }
    Ok(())
}

/// Creates a court and returns its id.
pub fn create_court(conn: &Connection, name: &str) -> CoreResult<CourtId> {
    check_name(name)?;
    let id = rows::insert_court(conn, name)?;
    info!(court_id = id, name, "court created");
    Ok(id)
}

/// Renames a court.
pub fn rename_court(conn: &Connection, id: CourtId, name: &str) -> CoreResult<()> {
    check_name(name)?;
    rows::rename_court(conn, id, name)
}

/// Deletes a court after sending its players back to the queue.
pub fn delete_court(conn: &Connection, clock: &dyn Clock, id: CourtId) -> CoreResult<()> {
    let vacated = clear_court(conn, clock, id)?;
    rows::delete_court_row(conn, id)?;
    info!(court_id = id, vacated = vacated.len(), "court deleted");
    Ok(())
}

/// Every court with its occupancy, ordered by name.
pub fn list_courts(conn: &Connection) -> CoreResult<Vec<CourtOccupancy>> {
    rows::list_courts(conn)?
        .iter()
        .map(|court| occupancy(conn, court))
        .collect()
}

impl Store {
    /// Creates a court.
    pub fn create_court(&mut self, name: &str) -> CoreResult<CourtId> {
        txn::run(self, Gate::Audited, "create_court", |conn, _| {
            create_court(conn, name)
        })
    }

    /// Renames a court.
    pub fn rename_court(&mut self, id: CourtId, name: &str) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "rename_court", |conn, _| {
            rename_court(conn, id, name)
        })
    }

    /// Deletes a court, requeueing its players.
    pub fn delete_court(&mut self, id: CourtId) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "delete_court", |conn, clock| {
            delete_court(conn, clock, id)
        })
    }

    /// Every court with its occupancy.
    pub fn courts(&self) -> CoreResult<Vec<CourtOccupancy>> {
        txn::read(self, list_courts)
    }
}
