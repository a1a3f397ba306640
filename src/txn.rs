//! Begin/commit/rollback discipline gated on the auditor's verdict.
//!
//! Every mutation runs through [`run`]: the business closure executes inside a
//! SQLite transaction, the auditor then scans the post-state in report-only
//! mode, and only a clean scan commits. A mutation whose statements all
//! succeeded but whose post-state violates the queue invariant is still
//! rolled back and reported as [`CoreError::Inconsistent`].
//!
//! Rollback is also the drop behaviour of the underlying
//! [`rusqlite::Transaction`], so an early return or unwind can never leave a
//! half-applied mutation committed.

use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::{
    audit,
    clock::Clock,
    error::{CoreError, CoreResult},
    store::Store,
};

/// Whether the post-mutation audit decides commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gate {
    /// Commit only when the report-only audit finds no violations.
    #[default]
    Audited,
    /// Commit whenever the closure succeeds. For maintenance tooling.
    Unaudited,
}

/// Lifecycle of one wrapped transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// `BEGIN` issued.
    Started,
    /// Business closure running.
    Open,
    /// Audit passed (or skipped for [`Gate::Unaudited`]).
    Verified,
    /// `COMMIT` succeeded.
    Committed,
    /// Audit reported violations.
    Violated,
    /// Closure or audit returned an error.
    Errored,
    /// `ROLLBACK` issued.
    RolledBack,
}

/// Runs `op` in one transaction on `store`, committing per `gate`.
pub fn run<T>(
    store: &mut Store,
    gate: Gate,
    label: &'static str,
    op: impl FnOnce(&Connection, &dyn Clock) -> CoreResult<T>,
) -> CoreResult<T> {
    let (conn, clock) = store.split_mut();
    let tx = conn.transaction()?;
    debug!(label, state = ?TxState::Started, "transaction");

    let open: &Connection = &tx;
    debug!(label, state = ?TxState::Open, "transaction");
    let outcome = op(open, clock).and_then(|value| match gate {
        Gate::Audited => match audit::check(open, clock, false)? {
            0 => Ok(value),
            count => {
                warn!(label, count, state = ?TxState::Violated, "post-mutation audit failed");
                Err(CoreError::Inconsistent { count })
            }
        },
        Gate::Unaudited => Ok(value),
    });

    match outcome {
        Ok(value) => {
            debug!(label, state = ?TxState::Verified, "transaction");
            tx.commit()?;
            info!(label, state = ?TxState::Committed, "transaction");
            Ok(value)
        }
        Err(err) => {
            if !matches!(err, CoreError::Inconsistent { .. }) {
                debug!(label, state = ?TxState::Errored, error = %err, "transaction");
            }
            match tx.rollback() {
                Ok(()) => warn!(label, state = ?TxState::RolledBack, error = %err, "transaction"),
                Err(rb) => error!(label, error = %rb, "rollback failed"),
            }
            Err(err)
        }
    }
}

/// Runs a read-only closure inside a deferred transaction that is always
/// rolled back, giving it a consistent snapshot.
pub fn read<T>(store: &Store, op: impl FnOnce(&Connection) -> CoreResult<T>) -> CoreResult<T> {
    let tx = store.conn().unchecked_transaction()?;
    let snapshot: &Connection = &tx;
    let out = op(snapshot);
    tx.rollback()?;
    out
}
