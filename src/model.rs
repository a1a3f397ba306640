//! Person, court, assignment and waiting-entry records.

use serde::{Deserialize, Serialize};

use crate::types::{CourtId, PersonId, Position, Status};

/// Fully materialized person row, including the credential hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Stable person identifier.
    pub id: PersonId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Display name.
    pub knownas: String,
    /// Unique sign-in email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// bcrypt credential hash in modular crypt format.
    pub hash: String,
    /// Lifecycle status.
    pub status: Status,
}

impl Person {
    /// Public projection without the credential hash.
    pub fn to_public(&self) -> PublicPerson {
        PublicPerson {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            knownas: self.knownas.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            status: self.status,
        }
    }
}

/// Person as exposed to subscribers and callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPerson {
    /// Stable person identifier.
    pub id: PersonId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Display name.
    pub knownas: String,
    /// Sign-in email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Lifecycle status.
    pub status: Status,
}

/// Insert payload for a person row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Display name.
    pub knownas: String,
    /// Unique sign-in email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// bcrypt credential hash.
    pub hash: String,
    /// Initial status.
    pub status: Status,
}

/// Sparse profile patch where each `Some` field overwrites the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonPatch {
    /// Optional replacement for the given name.
    pub first_name: Option<String>,
    /// Optional replacement for the family name.
    pub last_name: Option<String>,
    /// Optional replacement for the display name.
    pub knownas: Option<String>,
    /// Optional replacement for the email.
    pub email: Option<String>,
    /// Optional replacement for the phone.
    pub phone: Option<String>,
    /// Optional new password; hashed before storage.
    pub password: Option<String>,
    /// Optional new status.
    pub status: Option<Status>,
}

impl PersonPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Court row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    /// Stable court identifier.
    pub id: CourtId,
    /// Display name.
    pub name: String,
}

/// One occupied position on one court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Court being played on.
    pub court: CourtId,
    /// Seated person.
    pub person: PersonId,
    /// Seat index.
    pub position: Position,
}

/// One entry in the FIFO waiting queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    /// Insertion sequence, used to break timestamp ties.
    pub seq: i64,
    /// Waiting person.
    pub person: PersonId,
    /// Enqueue time in milliseconds since epoch.
    pub enqueued_at_ms: u64,
}

/// Person identity as shown on a court.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    /// Seated person.
    pub person_id: PersonId,
    /// Display name.
    pub knownas: String,
}

/// A position on a court and whoever occupies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat index.
    pub position: Position,
    /// Occupant, if any.
    pub occupant: Option<Occupant>,
}

/// Court with its full occupancy, one [`Seat`] per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtOccupancy {
    /// Stable court identifier.
    pub id: CourtId,
    /// Display name.
    pub name: String,
    /// Seats in position order.
    pub seats: Vec<Seat>,
}

/// Waiting entry joined with the waiting person's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayWaiter {
    /// Waiting person.
    pub person_id: PersonId,
    /// Display name.
    pub knownas: String,
    /// Enqueue time in milliseconds since epoch.
    pub enqueued_at_ms: u64,
}
