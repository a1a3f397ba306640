use tempfile::TempDir;

use tracing_subscriber::EnvFilter;

use clubqueue::{
    error::{CoreError, ErrorKind},
    roster::{MIN_HASH_COST, Registration},
    store::{Store, rows},
    txn::{self, Gate},
    types::{PersonId, Status},
};

fn registration(name: &str) -> Registration {
    Registration {
        first_name: name.to_string(),
        last_name: "Tester".to_string(),
        knownas: name.to_string(),
        email: format!("{name}@example.com"),
        phone: String::new(),
        password: "password123".to_string(),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn seed(store: &mut Store, name: &str, status: Status) -> PersonId {
    store.seed_person(registration(name), status).expect("seed")
}

#[test]
fn audited_mutation_leaving_violation_is_rolled_back() {
    init_tracing();
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);
    let suspended = seed(&mut store, "sleeper", Status::Suspended);

    let err = txn::run(&mut store, Gate::Audited, "stray_waiter", |conn, _| {
        rows::insert_waiter(conn, suspended, 1)
    })
    .expect_err("violation");

    assert!(matches!(err, CoreError::Inconsistent { count: 1 }));
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(err.status(), 500);
    assert!(store.waiting_queue().expect("queue").is_empty());
}

#[test]
fn unaudited_mutation_commits_regardless() {
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);
    let suspended = seed(&mut store, "sleeper", Status::Suspended);

    txn::run(&mut store, Gate::Unaudited, "stray_waiter", |conn, _| {
        rows::insert_waiter(conn, suspended, 1)
    })
    .expect("commit");

    assert_eq!(store.waiting_queue().expect("queue"), vec![suspended]);
    assert_eq!(store.audit_findings().expect("findings").len(), 1);
}

#[test]
fn error_after_partial_work_rolls_everything_back() {
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);

    let err = txn::run(&mut store, Gate::Audited, "partial", |conn, _| {
        rows::insert_court(conn, "Court A")?;
        Err::<(), _>(CoreError::BadRequest("stop".to_string()))
    })
    .expect_err("fails");

    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(store.courts().expect("courts").is_empty());
}

#[test]
fn store_constraint_failure_is_internal_and_atomic() {
    init_tracing();
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);
    let a = seed(&mut store, "alpha", Status::Player);
    let b = seed(&mut store, "bravo", Status::Player);
    let court = store.create_court("Court A").expect("court");

    let err = txn::run(&mut store, Gate::Unaudited, "double_seat", |conn, _| {
        rows::delete_waiters_for_person(conn, a)?;
        rows::insert_assignment(conn, court, a, 0)?;
        rows::delete_waiters_for_person(conn, b)?;
        rows::insert_assignment(conn, court, b, 0)
    })
    .expect_err("primary key");

    assert!(matches!(err, CoreError::Store(_)));
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(store.waiting_queue().expect("queue"), vec![a, b]);
    assert!(rows::list_assignments(store.conn()).expect("assignments").is_empty());
}

#[test]
fn reads_see_a_consistent_snapshot_and_never_write() {
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);
    seed(&mut store, "alpha", Status::Player);

    let count = txn::read(&store, |conn| Ok(rows::list_waiters(conn)?.len())).expect("read");

    assert_eq!(count, 1);
}

#[test]
fn committed_mutations_survive_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("club.db");

    let court = {
        let mut store = Store::open_path(&path).expect("open");
        seed(&mut store, "alpha", Status::Player);
        let court = store.create_court("Court A").expect("court");
        store.fill_court(court).expect("fill");
        let failed = store.create_court("x");
        assert!(failed.is_err());
        court
    };

    let store = Store::open_path(&path).expect("reopen");
    let courts = store.courts().expect("courts");
    assert_eq!(courts.len(), 1);
    assert_eq!(courts[0].id, court);
    assert!(courts[0].seats[0].occupant.is_some());
    assert!(store.waiting_queue().expect("queue").is_empty());
}

#[test]
fn out_of_range_queue_timestamps_are_rejected() {
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST);
    let player = seed(&mut store, "alpha", Status::Player);

    let err = txn::run(&mut store, Gate::Unaudited, "far_future", |conn, _| {
        rows::delete_waiters_for_person(conn, player)?;
        rows::insert_waiter(conn, player, u64::MAX)
    })
    .expect_err("overflow");
    assert!(matches!(err, CoreError::Internal(_)));
    assert_eq!(store.waiting_queue().expect("queue"), vec![player]);

    store
        .conn()
        .execute("UPDATE waiting SET start_ms = -1 WHERE person = ?1", [player])
        .expect("corrupt");
    let err = rows::list_waiters(store.conn()).expect_err("negative");
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
}
