//! Consistency auditor for the roster, waiting queue and court assignments.
//!
//! For a person with status `player`, exactly one of {waiting entry,
//! assignment} must exist. Anyone else must have neither. The auditor counts
//! divergences and, in fix mode, repairs them.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::{
    clock::Clock,
    error::CoreResult,
    model::Person,
    store::{Store, rows},
    txn::{self, Gate},
    types::{PersonId, Status},
};

/// Repair prescribed for one person.
///
/// The bundled schema holds `person` UNIQUE in both `waiting` and `playing`,
/// so `UnseatAndEnqueue`, `Unseat` and `Reset` only fire against stores whose
/// tables lack those constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Nothing to do.
    None,
    /// Player with no rows: enqueue.
    Enqueue,
    /// Player seated more than once and not waiting: unseat, then enqueue.
    UnseatAndEnqueue,
    /// Player waiting once but seated more than once: unseat, keep waiting.
    Unseat,
    /// Player waiting more than once: remove all rows, enqueue once.
    Reset,
    /// Non-player holding rows: delete them.
    Purge {
        /// Waiting entries present.
        waiting: bool,
        /// Assignments present.
        playing: bool,
    },
}

/// Outcome of classifying one person's row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Violations counted for this person.
    pub violations: usize,
    /// Repair to apply in fix mode.
    pub repair: Repair,
}

/// Classifies a person from their status and row counts.
pub fn classify(status: Status, waiting: usize, playing: usize) -> Verdict {
    let repair = if status == Status::Player {
        match (waiting, playing) {
            (0, 0) => Repair::Enqueue,
            (0, 1) | (1, 0) | (1, 1) => Repair::None,
            (0, _) => Repair::UnseatAndEnqueue,
            (1, _) => Repair::Unseat,
            _ => Repair::Reset,
        }
    } else if waiting > 0 || playing > 0 {
        Repair::Purge {
            waiting: waiting > 0,
            playing: playing > 0,
        }
    } else {
        Repair::None
    };

    let violations = match repair {
        Repair::None => 0,
        Repair::Purge { waiting, playing } => usize::from(waiting) + usize::from(playing),
        _ => 1,
    };
    Verdict { violations, repair }
}

/// One person whose rows diverge from the invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Offending person.
    pub person_id: PersonId,
    /// Display name, for logs.
    pub knownas: String,
    /// Status at scan time.
    pub status: Status,
    /// Waiting entries held.
    pub waiting: usize,
    /// Assignments held.
    pub playing: usize,
    /// Classification.
    pub verdict: Verdict,
}

/// Scans every person and returns those in violation. Never mutates.
pub fn scan(conn: &Connection) -> CoreResult<Vec<Finding>> {
    let mut out = Vec::new();
    for person in rows::list_people(conn, None)? {
        if let Some(finding) = inspect(conn, &person)? {
            out.push(finding);
        }
    }
    Ok(out)
}

fn inspect(conn: &Connection, person: &Person) -> CoreResult<Option<Finding>> {
    let waiting = rows::count_waiters_for_person(conn, person.id)?;
    let playing = rows::count_assignments_for_person(conn, person.id)?;
    let verdict = classify(person.status, waiting, playing);
    if verdict.violations == 0 {
        return Ok(None);
    }
    Ok(Some(Finding {
        person_id: person.id,
        knownas: person.knownas.clone(),
        status: person.status,
        waiting,
        playing,
        verdict,
    }))
}

/// Counts violations across all people, repairing them when `fix` is set.
///
/// The returned count is always the pre-repair count.
pub fn check(conn: &Connection, clock: &dyn Clock, fix: bool) -> CoreResult<usize> {
    let findings = scan(conn)?;
    let mut total = 0;
    for finding in &findings {
        total += finding.verdict.violations;
        report(finding, fix);
        if fix {
            apply(conn, clock, finding.person_id, finding.verdict.repair)?;
        }
    }
    Ok(total)
}

/// Checks a single person, repairing when `fix` is set.
pub fn check_person(
    conn: &Connection,
    clock: &dyn Clock,
    person: &Person,
    fix: bool,
) -> CoreResult<usize> {
    let Some(finding) = inspect(conn, person)? else {
        return Ok(0);
    };
    report(&finding, fix);
    if fix {
        apply(conn, clock, finding.person_id, finding.verdict.repair)?;
    }
    Ok(finding.verdict.violations)
}

fn report(finding: &Finding, fix: bool) {
    warn!(
        person_id = finding.person_id,
        knownas = %finding.knownas,
        status = %finding.status,
        waiting = finding.waiting,
        playing = finding.playing,
        repair = ?finding.verdict.repair,
        fix,
        "inconsistent queue state"
    );
}

fn apply(conn: &Connection, clock: &dyn Clock, person: PersonId, repair: Repair) -> CoreResult<()> {
    match repair {
        Repair::None => {}
        Repair::Enqueue => {
            rows::insert_waiter(conn, person, clock.now_ms())?;
        }
        Repair::UnseatAndEnqueue => {
            rows::delete_assignments_for_person(conn, person)?;
            rows::insert_waiter(conn, person, clock.now_ms())?;
        }
        Repair::Unseat => {
            rows::delete_assignments_for_person(conn, person)?;
        }
        Repair::Reset => {
            rows::delete_waiters_for_person(conn, person)?;
            rows::delete_assignments_for_person(conn, person)?;
            rows::insert_waiter(conn, person, clock.now_ms())?;
        }
        Repair::Purge { waiting, playing } => {
            if waiting {
                rows::delete_waiters_for_person(conn, person)?;
            }
            if playing {
                rows::delete_assignments_for_person(conn, person)?;
            }
        }
    }
    debug!(person_id = person, ?repair, "repair applied");
    Ok(())
}

impl Store {
    /// Runs the auditor in its own transaction.
    ///
    /// Report-only runs never write. Fix runs commit their repairs through
    /// `gate`, so an [`Gate::Audited`] fix also proves the repairs converged.
    pub fn check_consistency(&mut self, fix: bool, gate: Gate) -> CoreResult<usize> {
        if !fix {
            let store: &Store = self;
            return txn::read(store, |conn| check(conn, store.clock(), false));
        }
        txn::run(self, gate, "check_consistency", |conn, clock| {
            check(conn, clock, true)
        })
    }

    /// Lists current violations without repairing them.
    pub fn audit_findings(&self) -> CoreResult<Vec<Finding>> {
        txn::read(self, scan)
    }
}
