//! Person lifecycle: registration, profile edits and status transitions.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audit,
    clock::Clock,
    error::{CoreError, CoreResult},
    model::{NewPerson, Person, PersonPatch, PublicPerson},
    store::{Store, rows},
    txn::{self, Gate},
    types::{PersonId, Status},
};

/// Sign-up payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Given name, 3 to 20 characters.
    pub first_name: String,
    /// Family name, 3 to 20 characters.
    pub last_name: String,
    /// Display name, 2 to 20 characters.
    pub knownas: String,
    /// Sign-in email.
    pub email: String,
    /// Contact phone, at most 20 characters.
    pub phone: String,
    /// Plain password, 8 to 30 characters.
    pub password: String,
}

impl Registration {
    /// Checks every field, reporting the first failure as `BadRequest`.
    pub fn validate(&self) -> CoreResult<()> {
        check_len("first_name", &self.first_name, 3, 20)?;
        check_len("last_name", &self.last_name, 3, 20)?;
        check_len("knownas", &self.knownas, 2, 20)?;
        check_email(&self.email)?;
        check_len("phone", &self.phone, 0, 20)?;
        check_len("password", &self.password, 8, 30)?;
        Ok(())
    }

    fn into_new_person(self, status: Status, cost: u32) -> CoreResult<NewPerson> {
        Ok(NewPerson {
            hash: hash_password(&self.password, cost)?,
            first_name: self.first_name,
            last_name: self.last_name,
            knownas: self.knownas,
            email: self.email,
            phone: self.phone,
            status,
        })
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> CoreResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(CoreError::BadRequest(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> CoreResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::BadRequest(format!(
            "email must be a valid email address: {email}"
        )));
    }
    Ok(())
}

/// Work factor used when no other cost is configured.
pub const DEFAULT_HASH_COST: u32 = 10;

/// Smallest work factor bcrypt accepts.
pub const MIN_HASH_COST: u32 = 4;

/// bcrypt hash of `password` in modular crypt format.
pub fn hash_password(password: &str, cost: u32) -> CoreResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|err| CoreError::Internal(format!("password hashing failed: {err}")))
}

/// Checks `password` against a hash produced by [`hash_password`].
///
/// Malformed stored hashes never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

fn duplicate_email(email: &str) -> String {
    format!("a person with email {email} is already registered")
}

/// Registers a new person in `suspended` status.
pub fn register(conn: &Connection, registration: Registration, cost: u32) -> CoreResult<PersonId> {
    registration.validate()?;
    if rows::find_person_by_email(conn, &registration.email)?.is_some() {
        return Err(CoreError::BadRequest(duplicate_email(&registration.email)));
    }
    let email = registration.email.clone();
    let id = rows::insert_person(conn, &registration.into_new_person(Status::Suspended, cost)?)
        .map_err(|err| err.on_unique_violation(duplicate_email(&email)))?;
    info!(person_id = id, "person registered");
    Ok(id)
}

/// Inserts a person with any status; a seeded player joins the queue.
pub fn seed_person(
    conn: &Connection,
    clock: &dyn Clock,
    registration: Registration,
    status: Status,
    cost: u32,
) -> CoreResult<PersonId> {
    registration.validate()?;
    let email = registration.email.clone();
    let id = rows::insert_person(conn, &registration.into_new_person(status, cost)?)
        .map_err(|err| err.on_unique_violation(duplicate_email(&email)))?;
    if status == Status::Player {
        rows::insert_waiter(conn, id, clock.now_ms())?;
    }
    info!(person_id = id, %status, "person seeded");
    Ok(id)
}

/// Verifies sign-in credentials.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> CoreResult<Person> {
    let denied = || CoreError::Forbidden("invalid email or password".to_string());
    let person = rows::find_person_by_email(conn, email)?.ok_or_else(denied)?;
    if !verify_password(&person.hash, password) {
        return Err(denied());
    }
    if person.status == Status::Suspended {
        return Err(CoreError::Forbidden(format!(
            "person [{}] is suspended",
            person.id
        )));
    }
    Ok(person)
}

/// Applies a sparse profile patch.
///
/// A status change reconciles the person's queue rows before returning.
pub fn update_person(
    conn: &Connection,
    clock: &dyn Clock,
    id: PersonId,
    patch: &PersonPatch,
    cost: u32,
) -> CoreResult<PublicPerson> {
    let mut person = rows::require_person(conn, id)?;
    if patch.is_empty() {
        return Ok(person.to_public());
    }

    if let Some(v) = &patch.first_name {
        check_len("first_name", v, 3, 20)?;
        person.first_name = v.clone();
    }
    if let Some(v) = &patch.last_name {
        check_len("last_name", v, 3, 20)?;
        person.last_name = v.clone();
    }
    if let Some(v) = &patch.knownas {
        check_len("knownas", v, 2, 20)?;
        person.knownas = v.clone();
    }
    if let Some(v) = &patch.email {
        check_email(v)?;
        person.email = v.clone();
    }
    if let Some(v) = &patch.phone {
        check_len("phone", v, 0, 20)?;
        person.phone = v.clone();
    }
    if let Some(v) = &patch.password {
        check_len("password", v, 8, 30)?;
        person.hash = hash_password(v, cost)?;
    }
    let status_changed = patch.status.is_some_and(|s| s != person.status);
    if let Some(v) = patch.status {
        person.status = v;
    }

    let email = person.email.clone();
    rows::update_person(conn, &person)
        .map_err(|err| err.on_unique_violation(duplicate_email(&email)))?;
    if status_changed {
        audit::check_person(conn, clock, &person, true)?;
    }
    info!(person_id = id, status_changed, "person updated");
    Ok(person.to_public())
}

/// Promotes an inactive person to player and enqueues them.
///
/// Already-player people are left where they are.
pub fn make_person_player(conn: &Connection, clock: &dyn Clock, id: PersonId) -> CoreResult<()> {
    let person = rows::require_person(conn, id)?;
    let waiting = rows::count_waiters_for_person(conn, id)?;
    let playing = rows::count_assignments_for_person(conn, id)?;
    if waiting + playing > 1 {
        return Err(CoreError::Internal(format!(
            "inconsistent person [{id}]: {waiting} waiting, {playing} playing"
        )));
    }

    match person.status {
        Status::Player => Ok(()),
        Status::Inactive => {
            rows::set_status(conn, id, Status::Player)?;
            rows::delete_assignments_for_person(conn, id)?;
            if waiting == 0 {
                rows::insert_waiter(conn, id, clock.now_ms())?;
            }
            info!(person_id = id, "person is now a player");
            Ok(())
        }
        other => Err(CoreError::BadRequest(format!(
            "cannot change person [{id}] from {other} to {}",
            Status::Player
        ))),
    }
}

/// Moves a non-admin person to `inactive`, removing any queue or court rows.
pub fn make_person_inactive(conn: &Connection, id: PersonId) -> CoreResult<()> {
    let person = rows::require_person(conn, id)?;
    if person.status == Status::Admin {
        return Err(CoreError::BadRequest(format!(
            "person [{id}] is an admin and cannot be made inactive"
        )));
    }
    rows::delete_assignments_for_person(conn, id)?;
    rows::delete_waiters_for_person(conn, id)?;
    rows::set_status(conn, id, Status::Inactive)?;
    info!(person_id = id, "person is now inactive");
    Ok(())
}

/// Deletes a non-admin person together with their queue and court rows.
pub fn delete_person(conn: &Connection, id: PersonId) -> CoreResult<()> {
    let person = rows::require_person(conn, id)?;
    if person.status == Status::Admin {
        return Err(CoreError::BadRequest(format!(
            "person [{id}] is an admin and cannot be deleted"
        )));
    }
    rows::delete_waiters_for_person(conn, id)?;
    rows::delete_assignments_for_person(conn, id)?;
    rows::delete_person_row(conn, id)?;
    info!(person_id = id, "person deleted");
    Ok(())
}

impl Store {
    /// Registers a new suspended person.
    pub fn register(&mut self, registration: Registration) -> CoreResult<PersonId> {
        let cost = self.config().hash_cost;
        txn::run(self, Gate::Audited, "register", |conn, _| {
            register(conn, registration, cost)
        })
    }

    /// Seeds a person with an explicit status.
    pub fn seed_person(&mut self, registration: Registration, status: Status) -> CoreResult<PersonId> {
        let cost = self.config().hash_cost;
        txn::run(self, Gate::Audited, "seed_person", |conn, clock| {
            seed_person(conn, clock, registration, status, cost)
        })
    }

    /// Verifies sign-in credentials.
    pub fn authenticate(&self, email: &str, password: &str) -> CoreResult<PublicPerson> {
        txn::read(self, |conn| Ok(authenticate(conn, email, password)?.to_public()))
    }

    /// Applies a profile patch.
    pub fn update_person(&mut self, id: PersonId, patch: &PersonPatch) -> CoreResult<PublicPerson> {
        let cost = self.config().hash_cost;
        txn::run(self, Gate::Audited, "update_person", |conn, clock| {
            update_person(conn, clock, id, patch, cost)
        })
    }

    /// Promotes an inactive person to player.
    pub fn make_person_player(&mut self, id: PersonId) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "make_person_player", |conn, clock| {
            make_person_player(conn, clock, id)
        })
    }

    /// Moves a non-admin person to inactive.
    pub fn make_person_inactive(&mut self, id: PersonId) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "make_person_inactive", |conn, _| {
            make_person_inactive(conn, id)
        })
    }

    /// Deletes a non-admin person.
    pub fn delete_person(&mut self, id: PersonId) -> CoreResult<()> {
        txn::run(self, Gate::Audited, "delete_person", |conn, _| {
            delete_person(conn, id)
        })
    }

    /// Loads a person without the credential hash.
    pub fn person(&self, id: PersonId) -> CoreResult<PublicPerson> {
        txn::read(self, |conn| Ok(rows::require_person(conn, id)?.to_public()))
    }

    /// Loads the full person row, credential hash included.
    pub fn person_record(&self, id: PersonId) -> CoreResult<Person> {
        txn::read(self, |conn| rows::require_person(conn, id))
    }

    /// Looks a person up by email.
    pub fn find_person_by_email(&self, email: &str) -> CoreResult<PublicPerson> {
        txn::read(self, |conn| {
            rows::find_person_by_email(conn, email)?
                .map(|p| p.to_public())
                .ok_or_else(|| CoreError::NotFound(format!("person not found: email: {email}")))
        })
    }

    /// Lists people, optionally filtered by status.
    pub fn people(&self, filter: Option<Status>) -> CoreResult<Vec<PublicPerson>> {
        txn::read(self, |conn| {
            Ok(rows::list_people(conn, filter)?
                .iter()
                .map(Person::to_public)
                .collect())
        })
    }

    /// Removes every court, queue row and non-admin person.
    pub fn delete_all_records(&mut self, gate: Gate) -> CoreResult<()> {
        txn::run(self, gate, "delete_all_records", |conn, _| {
            rows::delete_all_records(conn)
        })
    }
}
