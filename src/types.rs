//! Shared primitive IDs, the person status enum and court geometry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Person row identifier.
pub type PersonId = i64;
/// Court row identifier.
pub type CourtId = i64;
/// Zero-based seat index on a court.
pub type Position = i64;

/// Number of positions on every court.
pub const POSITIONS_PER_COURT: Position = 4;

/// Lifecycle status of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Club administrator.
    Admin,
    /// May queue for and occupy courts.
    Player,
    /// Registered but not currently playing.
    Inactive,
    /// Newly registered or blocked; cannot sign in.
    Suspended,
}

impl Status {
    /// Every status, in display order.
    pub const ALL: [Status; 4] = [
        Status::Admin,
        Status::Player,
        Status::Inactive,
        Status::Suspended,
    ];

    /// Stored text form.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Admin => "admin",
            Status::Player => "player",
            Status::Inactive => "inactive",
            Status::Suspended => "suspended",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Status::Admin),
            "player" => Ok(Status::Player),
            "inactive" => Ok(Status::Inactive),
            "suspended" => Ok(Status::Suspended),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Returns true when `position` is a valid seat index.
pub fn is_valid_position(position: Position) -> bool {
    (0..POSITIONS_PER_COURT).contains(&position)
}
