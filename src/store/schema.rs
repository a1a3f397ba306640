use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::RetryPolicy,
    error::{CoreError, CoreResult},
};

/// Schema SQL embedded at compile time.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Tables in drop order: dependents before the rows they reference.
pub const TABLES: [&str; 4] = ["playing", "waiting", "person", "court"];

/// Returns true when `table` is present in the schema catalog.
pub fn table_exists(conn: &Connection, table: &str) -> CoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Calls `check` until it reports true or `policy.attempts` is exhausted,
/// sleeping `policy.delay` on `clock` between checks.
///
/// Returns the number of checks made.
pub fn wait_until(
    clock: &dyn Clock,
    policy: &RetryPolicy,
    what: &str,
    mut check: impl FnMut() -> CoreResult<bool>,
) -> CoreResult<u32> {
    for attempt in 1..=policy.attempts {
        if check()? {
            debug!(what, attempt, "schema change visible");
            return Ok(attempt);
        }
        if attempt < policy.attempts {
            clock.sleep(policy.delay());
        }
    }
    warn!(what, attempts = policy.attempts, "schema change never became visible");
    Err(CoreError::Internal(format!(
        "{what} not visible after {} attempts",
        policy.attempts
    )))
}

/// Creates missing tables and indexes, then waits for each table to appear.
pub fn create_tables(conn: &Connection, clock: &dyn Clock, policy: &RetryPolicy) -> CoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    for table in TABLES {
        wait_until(clock, policy, &format!("table {table}"), || {
            table_exists(conn, table)
        })?;
    }
    info!("schema tables created");
    Ok(())
}

/// Drops every table, then waits for each to disappear.
pub fn drop_tables(conn: &Connection, clock: &dyn Clock, policy: &RetryPolicy) -> CoreResult<()> {
    for table in TABLES {
        // Names come from TABLES, never from callers.
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        wait_until(clock, policy, &format!("drop of table {table}"), || {
            table_exists(conn, table).map(|exists| !exists)
        })?;
    }
    info!("schema tables dropped");
    Ok(())
}
