//! Every statement is parameterized; no caller value is ever spliced into SQL.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    error::{CoreError, CoreResult},
    model::{Assignment, Court, NewPerson, Person, WaitingEntry},
    types::{CourtId, PersonId, Position, Status},
};

const PERSON_COLUMNS: &str = "id, firstname, lastname, knownas, email, phone, hash, status";

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    let status_text: String = row.get(7)?;
    let status = status_text.parse::<Status>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(err)),
        )
    })?;
    Ok(Person {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        knownas: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        hash: row.get(6)?,
        status,
    })
}

fn waiter_from_row(row: &Row<'_>) -> rusqlite::Result<WaitingEntry> {
    Ok(WaitingEntry {
        seq: row.get(0)?,
        person: row.get(1)?,
        enqueued_at_ms: row.get(2)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        court: row.get(0)?,
        person: row.get(1)?,
        position: row.get(2)?,
    })
}

// ---- person ----

/// Inserts a person and returns the generated id.
pub fn insert_person(conn: &Connection, person: &NewPerson) -> CoreResult<PersonId> {
    conn.execute(
        "INSERT INTO person (firstname, lastname, knownas, email, phone, hash, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            person.first_name,
            person.last_name,
            person.knownas,
            person.email,
            person.phone,
            person.hash,
            person.status.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Loads a person by id.
pub fn load_person(conn: &Connection, id: PersonId) -> CoreResult<Option<Person>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM person WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], person_from_row).optional()?)
}

/// Loads a person by id, or fails with `NotFound`.
pub fn require_person(conn: &Connection, id: PersonId) -> CoreResult<Person> {
    load_person(conn, id)?.ok_or_else(|| CoreError::NotFound(format!("person [{id}] not found")))
}

/// Loads a person by sign-in email.
pub fn find_person_by_email(conn: &Connection, email: &str) -> CoreResult<Option<Person>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM person WHERE email = ?1");
    Ok(conn.query_row(&sql, params![email], person_from_row).optional()?)
}

/// Lists people, optionally restricted to one status, in id order.
pub fn list_people(conn: &Connection, status: Option<Status>) -> CoreResult<Vec<Person>> {
    let mut sql = format!("SELECT {PERSON_COLUMNS} FROM person");
    if status.is_some() {
        sql.push_str(" WHERE status = ?1");
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let people = match status {
        Some(status) => stmt
            .query_map(params![status.as_str()], person_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], person_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(people)
}

/// Overwrites every mutable column of `person`.
pub fn update_person(conn: &Connection, person: &Person) -> CoreResult<()> {
    let changed = conn.execute(
        "UPDATE person
         SET firstname = ?1, lastname = ?2, knownas = ?3, email = ?4, phone = ?5, hash = ?6, status = ?7
         WHERE id = ?8",
        params![
            person.first_name,
            person.last_name,
            person.knownas,
            person.email,
            person.phone,
            person.hash,
            person.status.as_str(),
            person.id,
        ],
    )?;
    if changed == 0 {
        return Err(CoreError::NotFound(format!("person [{}] not found", person.id)));
    }
    Ok(())
}

/// Sets only the status column.
pub fn set_status(conn: &Connection, id: PersonId, status: Status) -> CoreResult<()> {
    conn.execute(
        "UPDATE person SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Deletes the person row only; dependents must already be gone.
pub fn delete_person_row(conn: &Connection, id: PersonId) -> CoreResult<usize> {
    Ok(conn.execute("DELETE FROM person WHERE id = ?1", params![id])?)
}

// ---- court ----

/// Inserts a court and returns the generated id.
pub fn insert_court(conn: &Connection, name: &str) -> CoreResult<CourtId> {
    conn.execute("INSERT INTO court (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Loads a court by id.
pub fn load_court(conn: &Connection, id: CourtId) -> CoreResult<Option<Court>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM court WHERE id = ?1",
            params![id],
            |row| {
                Ok(Court {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}

/// Loads a court by id, or fails with `NotFound`.
pub fn require_court(conn: &Connection, id: CourtId) -> CoreResult<Court> {
    load_court(conn, id)?.ok_or_else(|| CoreError::NotFound(format!("court [{id}] not found")))
}

/// Lists courts ordered by name, then id.
pub fn list_courts(conn: &Connection) -> CoreResult<Vec<Court>> {
    let mut stmt = conn.prepare("SELECT id, name FROM court ORDER BY name, id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Court {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Renames a court.
pub fn rename_court(conn: &Connection, id: CourtId, name: &str) -> CoreResult<()> {
    let changed = conn.execute(
        "UPDATE court SET name = ?1 WHERE id = ?2",
        params![name, id],
    )?;
    if changed == 0 {
        return Err(CoreError::NotFound(format!("court [{id}] not found")));
    }
    Ok(())
}

/// Deletes the court row only; assignments must already be gone.
pub fn delete_court_row(conn: &Connection, id: CourtId) -> CoreResult<usize> {
    Ok(conn.execute("DELETE FROM court WHERE id = ?1", params![id])?)
}

// ---- waiting ----

/// Appends a waiting entry stamped `start_ms`.
pub fn insert_waiter(conn: &Connection, person: PersonId, start_ms: u64) -> CoreResult<()> {
    let start_ms = i64::try_from(start_ms)
        .map_err(|_| CoreError::Internal(format!("queue timestamp {start_ms} out of range")))?;
    conn.execute(
        "INSERT INTO waiting (person, start_ms) VALUES (?1, ?2)",
        params![person, start_ms],
    )?;
    Ok(())
}

/// Removes every waiting entry for `person`.
pub fn delete_waiters_for_person(conn: &Connection, person: PersonId) -> CoreResult<usize> {
    Ok(conn.execute("DELETE FROM waiting WHERE person = ?1", params![person])?)
}

/// Earliest waiting entry, ties broken by insertion order.
pub fn first_waiter(conn: &Connection) -> CoreResult<Option<WaitingEntry>> {
    Ok(conn
        .query_row(
            "SELECT seq, person, start_ms FROM waiting ORDER BY start_ms, seq LIMIT 1",
            [],
            waiter_from_row,
        )
        .optional()?)
}

/// Whole queue in FIFO order.
pub fn list_waiters(conn: &Connection) -> CoreResult<Vec<WaitingEntry>> {
    let mut stmt = conn.prepare("SELECT seq, person, start_ms FROM waiting ORDER BY start_ms, seq")?;
    let mut out = Vec::new();
    for row in stmt.query_map([], waiter_from_row)? {
        out.push(row?);
    }
    Ok(out)
}

/// Number of waiting entries held by `person`.
pub fn count_waiters_for_person(conn: &Connection, person: PersonId) -> CoreResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM waiting WHERE person = ?1",
        params![person],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ---- playing ----

/// Seats `person` at (`court`, `position`).
pub fn insert_assignment(
    conn: &Connection,
    court: CourtId,
    person: PersonId,
    position: Position,
) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO playing (court, person, position) VALUES (?1, ?2, ?3)",
        params![court, person, position],
    )?;
    Ok(())
}

/// Removes every assignment held by `person`.
pub fn delete_assignments_for_person(conn: &Connection, person: PersonId) -> CoreResult<usize> {
    Ok(conn.execute("DELETE FROM playing WHERE person = ?1", params![person])?)
}

/// Removes every assignment on `court`.
pub fn delete_assignments_for_court(conn: &Connection, court: CourtId) -> CoreResult<usize> {
    Ok(conn.execute("DELETE FROM playing WHERE court = ?1", params![court])?)
}

/// Assignments on `court` in position order.
pub fn assignments_for_court(conn: &Connection, court: CourtId) -> CoreResult<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT court, person, position FROM playing WHERE court = ?1 ORDER BY position",
    )?;
    let mut out = Vec::new();
    for row in stmt.query_map(params![court], assignment_from_row)? {
        out.push(row?);
    }
    Ok(out)
}

/// Every assignment, ordered by court then position.
pub fn list_assignments(conn: &Connection) -> CoreResult<Vec<Assignment>> {
    let mut stmt =
        conn.prepare("SELECT court, person, position FROM playing ORDER BY court, position")?;
    let mut out = Vec::new();
    for row in stmt.query_map([], assignment_from_row)? {
        out.push(row?);
    }
    Ok(out)
}

/// Number of assignments held by `person`.
pub fn count_assignments_for_person(conn: &Connection, person: PersonId) -> CoreResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM playing WHERE person = ?1",
        params![person],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ---- maintenance ----

/// Removes all assignments, waiting entries and courts, and every non-admin person.
pub fn delete_all_records(conn: &Connection) -> CoreResult<()> {
    conn.execute("DELETE FROM playing", [])?;
    conn.execute("DELETE FROM waiting", [])?;
    conn.execute("DELETE FROM court", [])?;
    conn.execute(
        "DELETE FROM person WHERE status != ?1",
        params![Status::Admin.as_str()],
    )?;
    Ok(())
}
