//! Club sign-in and court queueing core backed by SQLite.
//!
//! Players wait in a FIFO queue and are seated on courts of
//! [`types::POSITIONS_PER_COURT`] positions. Every mutation runs through
//! [`txn::run`], which audits the post-state and rolls back anything that
//! would leave a player both waiting and playing, or neither.
//!
//! # Examples
//!
//! ```
//! use clubqueue::{roster::Registration, store::Store, types::Status};
//!
//! let mut store = Store::open_in_memory().expect("open");
//! for name in ["alice", "bobby", "carol", "derek", "ellen"] {
//!     store
//!         .seed_person(
//!             Registration {
//!                 first_name: name.to_string(),
//!                 last_name: "Smith".to_string(),
//!                 knownas: name.to_string(),
//!                 email: format!("{name}@example.com"),
//!                 phone: String::new(),
//!                 password: "correct horse".to_string(),
//!             },
//!             Status::Player,
//!         )
//!         .expect("seed");
//! }
//!
//! let court = store.create_court("Court One").expect("court");
//! let seats = store.fill_court(court).expect("fill");
//! assert!(seats.iter().all(|seat| seat.occupant.is_some()));
//! assert_eq!(store.waiting_queue().expect("queue").len(), 1);
//! assert_eq!(store.check_consistency(false, Default::default()).expect("audit"), 0);
//! ```
#![deny(missing_docs)]

/// Consistency auditor and repairs.
pub mod audit;
/// Authorization seam.
pub mod authz;
/// Injectable time source.
pub mod clock;
/// Serde-loadable store and runtime configuration.
pub mod config;
/// Court administration.
pub mod courts;
/// Queue and assignment engine.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Domain records.
pub mod model;
/// Change publication.
pub mod publish;
/// Person lifecycle.
pub mod roster;
/// Single-writer runtime handle.
pub mod runtime;
/// SQLite persistence.
pub mod store;
/// Transactional wrapper.
pub mod txn;
/// Shared primitive types and enums.
pub mod types;
