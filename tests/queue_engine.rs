use std::sync::Arc;

use clubqueue::{
    clock::ManualClock,
    engine::game::{GameUpdate, PositionEdit},
    error::{CoreResult, ErrorKind},
    model::{Assignment, Seat, WaitingEntry},
    roster::{MIN_HASH_COST, Registration},
    store::{Store, rows},
    types::{PersonId, Status},
};

fn registration(name: &str) -> Registration {
    Registration {
        first_name: name.to_string(),
        last_name: "Tester".to_string(),
        knownas: name.to_string(),
        email: format!("{name}@example.com"),
        phone: "555-0100".to_string(),
        password: "password123".to_string(),
    }
}

fn store() -> (Store, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST)
        .with_clock(clock.clone());
    (store, clock)
}

fn seed(store: &mut Store, clock: &ManualClock, name: &str, status: Status) -> PersonId {
    clock.advance(10);
    store.seed_person(registration(name), status).expect("seed")
}

fn players(store: &mut Store, clock: &ManualClock, n: usize) -> Vec<PersonId> {
    (1..=n)
        .map(|i| seed(store, clock, &format!("player{i:02}"), Status::Player))
        .collect()
}

fn occupants(seats: &[Seat]) -> Vec<Option<PersonId>> {
    seats
        .iter()
        .map(|seat| seat.occupant.as_ref().map(|o| o.person_id))
        .collect()
}

fn kind<T>(result: CoreResult<T>) -> ErrorKind {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => err.kind(),
    }
}

fn snapshot(store: &Store) -> (Vec<WaitingEntry>, Vec<Assignment>) {
    (
        rows::list_waiters(store.conn()).expect("waiters"),
        rows::list_assignments(store.conn()).expect("assignments"),
    )
}

#[test]
fn fill_seats_queue_in_enqueue_order_and_leaves_rest_empty() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 3);
    let court = store.create_court("Court A").expect("court");

    let seats = store.fill_court(court).expect("fill");

    assert_eq!(occupants(&seats), vec![Some(p[0]), Some(p[1]), Some(p[2]), None]);
    assert!(store.waiting_queue().expect("queue").is_empty());
    assert_eq!(store.check_consistency(false, Default::default()).expect("audit"), 0);
}

#[test]
fn fill_stops_at_court_capacity() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 6);
    let court = store.create_court("Court A").expect("court");

    let seats = store.fill_court(court).expect("fill");

    assert_eq!(occupants(&seats), p[..4].iter().copied().map(Some).collect::<Vec<_>>());
    assert_eq!(store.waiting_queue().expect("queue"), vec![p[4], p[5]]);
}

#[test]
fn fill_on_full_court_changes_nothing() {
    let (mut store, clock) = store();
    players(&mut store, &clock, 6);
    let court = store.create_court("Court A").expect("court");
    let first = store.fill_court(court).expect("fill");
    let before = snapshot(&store);

    let second = store.fill_court(court).expect("refill");

    assert_eq!(first, second);
    assert_eq!(snapshot(&store), before);
}

#[test]
fn fill_only_uses_empty_positions() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 5);
    let court = store.create_court("Court A").expect("court");
    store.make_player_play(p[0], court, 2).expect("play");

    let seats = store.fill_court(court).expect("fill");

    assert_eq!(occupants(&seats), vec![Some(p[1]), Some(p[2]), Some(p[0]), Some(p[3])]);
    assert_eq!(store.waiting_queue().expect("queue"), vec![p[4]]);
}

#[test]
fn fill_with_empty_queue_is_quiet() {
    let (mut store, _clock) = store();
    let court = store.create_court("Court A").expect("court");

    let seats = store.fill_court(court).expect("fill");

    assert_eq!(seats.len(), 4);
    assert!(seats.iter().all(|seat| seat.occupant.is_none()));
}

#[test]
fn clear_sends_players_to_back_of_queue_in_position_order() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 6);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");
    clock.advance(1_000);

    let vacated = store.clear_court(court).expect("clear");

    assert_eq!(vacated, p[..4].to_vec());
    assert_eq!(
        store.waiting_queue().expect("queue"),
        vec![p[4], p[5], p[0], p[1], p[2], p[3]]
    );
    let occupancy = store.court_occupancy(court).expect("occupancy");
    assert!(occupancy.seats.iter().all(|seat| seat.occupant.is_none()));
}

#[test]
fn clear_then_fill_reseats_the_same_players() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 4);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");

    store.clear_court(court).expect("clear");
    let seats = store.fill_court(court).expect("refill");

    let mut seated: Vec<PersonId> = occupants(&seats).into_iter().flatten().collect();
    seated.sort_unstable();
    assert_eq!(seated, p);
    let (waiters, assignments) = snapshot(&store);
    assert!(waiters.is_empty());
    assert_eq!(assignments.len(), 4);
    assert_eq!(store.check_consistency(false, Default::default()).expect("audit"), 0);
}

#[test]
fn make_player_wait_unseats_and_requeues_at_back() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 5);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");
    clock.advance(100);

    store.make_player_wait(p[1]).expect("wait");

    assert_eq!(store.waiting_queue().expect("queue"), vec![p[4], p[1]]);
    let seats = store.court_occupancy(court).expect("occupancy").seats;
    assert_eq!(occupants(&seats), vec![Some(p[0]), None, Some(p[2]), Some(p[3])]);
}

#[test]
fn make_player_wait_moves_waiter_to_back() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 3);
    clock.advance(100);

    store.make_player_wait(p[0]).expect("wait");

    assert_eq!(store.waiting_queue().expect("queue"), vec![p[1], p[2], p[0]]);
}

#[test]
fn make_player_play_moves_a_seated_player() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 1);
    let court = store.create_court("Court A").expect("court");
    store.make_player_play(p[0], court, 0).expect("seat");

    store.make_player_play(p[0], court, 3).expect("move");

    let seats = store.court_occupancy(court).expect("occupancy").seats;
    assert_eq!(occupants(&seats), vec![None, None, None, Some(p[0])]);
}

#[test]
fn make_player_play_on_non_waiting_person_leaves_rows_alone() {
    let (mut store, clock) = store();
    players(&mut store, &clock, 2);
    let idle = seed(&mut store, &clock, "idler", Status::Inactive);
    let court = store.create_court("Court A").expect("court");
    let before = snapshot(&store);

    let err = store.make_player_play(idle, court, 0).expect_err("must fail");

    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(snapshot(&store), before);
}

#[test]
fn make_player_play_onto_occupied_position_fails_without_change() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 2);
    let court = store.create_court("Court A").expect("court");
    store.make_player_play(p[0], court, 1).expect("seat");
    let before = snapshot(&store);

    let err = store.make_player_play(p[1], court, 1).expect_err("occupied");

    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(snapshot(&store), before);
}

#[test]
fn allocation_errors_are_classified() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 1);
    let idle = seed(&mut store, &clock, "idler", Status::Inactive);
    let court = store.create_court("Court A").expect("court");

    assert_eq!(kind(store.fill_court(999)), ErrorKind::NotFound);
    assert_eq!(kind(store.clear_court(999)), ErrorKind::NotFound);
    assert_eq!(kind(store.make_player_wait(999)), ErrorKind::NotFound);
    assert_eq!(kind(store.make_player_wait(idle)), ErrorKind::BadRequest);
    assert_eq!(kind(store.make_player_play(999, court, 0)), ErrorKind::NotFound);
    assert_eq!(kind(store.make_player_play(p[0], 999, 0)), ErrorKind::NotFound);
    assert_eq!(kind(store.make_player_play(p[0], court, 4)), ErrorKind::BadRequest);
    assert_eq!(kind(store.make_player_play(p[0], court, -1)), ErrorKind::BadRequest);
    assert_eq!(store.waiting_queue().expect("queue"), p);
}

#[test]
fn update_game_swaps_in_a_waiting_player() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 5);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");

    let seats = store
        .update_game(&GameUpdate {
            court,
            edits: vec![PositionEdit {
                position: 1,
                expected: Some(p[1]),
                desired: Some(p[4]),
            }],
        })
        .expect("update");

    assert_eq!(occupants(&seats), vec![Some(p[0]), Some(p[4]), Some(p[2]), Some(p[3])]);
    assert_eq!(store.waiting_queue().expect("queue"), vec![p[1]]);
}

#[test]
fn update_game_can_swap_two_seated_players() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 4);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");

    let seats = store
        .update_game(&GameUpdate {
            court,
            edits: vec![
                PositionEdit {
                    position: 0,
                    expected: Some(p[0]),
                    desired: Some(p[1]),
                },
                PositionEdit {
                    position: 1,
                    expected: Some(p[1]),
                    desired: Some(p[0]),
                },
            ],
        })
        .expect("swap");

    assert_eq!(occupants(&seats), vec![Some(p[1]), Some(p[0]), Some(p[2]), Some(p[3])]);
    assert!(store.waiting_queue().expect("queue").is_empty());
}

#[test]
fn update_game_rejects_stale_and_invalid_edits_atomically() {
    let (mut store, clock) = store();
    let p = players(&mut store, &clock, 5);
    let court = store.create_court("Court A").expect("court");
    store.fill_court(court).expect("fill");
    let before = snapshot(&store);

    let stale = GameUpdate {
        court,
        edits: vec![PositionEdit {
            position: 0,
            expected: Some(p[4]),
            desired: None,
        }],
    };
    let seated_elsewhere = GameUpdate {
        court,
        edits: vec![PositionEdit {
            position: 0,
            expected: Some(p[0]),
            desired: Some(p[2]),
        }],
    };
    let duplicate_position = GameUpdate {
        court,
        edits: vec![
            PositionEdit {
                position: 3,
                expected: Some(p[3]),
                desired: None,
            },
            PositionEdit {
                position: 3,
                expected: Some(p[3]),
                desired: None,
            },
        ],
    };

    for update in [stale, seated_elsewhere, duplicate_position] {
        let err = store.update_game(&update).expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::BadRequest, "{update:?}");
        assert_eq!(snapshot(&store), before);
    }

    let missing = store
        .update_game(&GameUpdate {
            court: 999,
            edits: vec![],
        })
        .expect_err("missing court");
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}
