use std::{collections::BTreeSet, sync::Arc};

use proptest::prelude::*;

use clubqueue::{
    clock::ManualClock,
    engine::game::{GameUpdate, PositionEdit},
    roster::{MIN_HASH_COST, Registration},
    store::{Store, rows},
    types::{CourtId, PersonId, Status},
};

const PEOPLE: usize = 9;
const COURTS: usize = 2;

#[derive(Debug, Clone)]
enum Action {
    Fill { court: u8 },
    Clear { court: u8 },
    Wait { person: u8 },
    Play { person: u8, court: u8, position: i64 },
    Inactive { person: u8 },
    Player { person: u8 },
    Vacate { court: u8, position: i64 },
    DeleteCourt { court: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let person = 0u8..PEOPLE as u8;
    let court = 0u8..COURTS as u8;
    prop_oneof![
        court.clone().prop_map(|court| Action::Fill { court }),
        court.clone().prop_map(|court| Action::Clear { court }),
        person.clone().prop_map(|person| Action::Wait { person }),
        (person.clone(), court.clone(), -1i64..5)
            .prop_map(|(person, court, position)| Action::Play { person, court, position }),
        person.clone().prop_map(|person| Action::Inactive { person }),
        person.prop_map(|person| Action::Player { person }),
        (court.clone(), 0i64..4).prop_map(|(court, position)| Action::Vacate { court, position }),
        court.prop_map(|court| Action::DeleteCourt { court }),
    ]
}

fn registration(i: usize) -> Registration {
    Registration {
        first_name: format!("person{i}"),
        last_name: "Tester".to_string(),
        knownas: format!("p{i}"),
        email: format!("person{i}@example.com"),
        phone: String::new(),
        password: "password123".to_string(),
    }
}

fn setup() -> (Store, Arc<ManualClock>, Vec<PersonId>, Vec<CourtId>) {
    let clock = Arc::new(ManualClock::new(0));
    let mut store = Store::open_in_memory()
        .expect("open")
        .with_hash_cost(MIN_HASH_COST)
        .with_clock(clock.clone());
    let people = (0..PEOPLE)
        .map(|i| {
            clock.advance(1);
            store.seed_person(registration(i), Status::Player).expect("seed")
        })
        .collect();
    let courts = (0..COURTS)
        .map(|i| store.create_court(&format!("Court {i}")).expect("court"))
        .collect();
    (store, clock, people, courts)
}

fn apply(store: &mut Store, people: &[PersonId], courts: &[CourtId], action: &Action) {
    let person = |i: &u8| people[*i as usize];
    let court = |i: &u8| courts[*i as usize];
    // Individual operations may be rejected; only the aggregate state matters.
    let _ = match action {
        Action::Fill { court: c } => store.fill_court(court(c)).map(|_| ()),
        Action::Clear { court: c } => store.clear_court(court(c)).map(|_| ()),
        Action::Wait { person: p } => store.make_player_wait(person(p)),
        Action::Play {
            person: p,
            court: c,
            position,
        } => store.make_player_play(person(p), court(c), *position),
        Action::Inactive { person: p } => store.make_person_inactive(person(p)),
        Action::Player { person: p } => store.make_person_player(person(p)),
        Action::Vacate { court: c, position } => {
            let current = store
                .court_occupancy(court(c))
                .ok()
                .and_then(|o| o.seats.get(*position as usize).cloned())
                .and_then(|seat| seat.occupant)
                .map(|o| o.person_id);
            store
                .update_game(&GameUpdate {
                    court: court(c),
                    edits: vec![PositionEdit {
                        position: *position,
                        expected: current,
                        desired: None,
                    }],
                })
                .map(|_| ())
        }
        Action::DeleteCourt { court: c } => store.delete_court(court(c)),
    };
}

fn assert_invariants(store: &Store) {
    assert!(
        store.audit_findings().expect("findings").is_empty(),
        "audit found violations"
    );

    let assignments = rows::list_assignments(store.conn()).expect("assignments");
    let seats: BTreeSet<_> = assignments.iter().map(|a| (a.court, a.position)).collect();
    let seated: BTreeSet<_> = assignments.iter().map(|a| a.person).collect();
    assert_eq!(seats.len(), assignments.len());
    assert_eq!(seated.len(), assignments.len());

    let waiters = rows::list_waiters(store.conn()).expect("waiters");
    let waiting: BTreeSet<_> = waiters.iter().map(|w| w.person).collect();
    assert_eq!(waiting.len(), waiters.len());
    assert!(waiting.is_disjoint(&seated));

    for person in store.people(None).expect("people") {
        let rows_held = usize::from(waiting.contains(&person.id)) + usize::from(seated.contains(&person.id));
        let expected = usize::from(person.status == Status::Player);
        assert_eq!(rows_held, expected, "person {} ({})", person.id, person.status);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_operations_preserve_queue_invariant(actions in prop::collection::vec(action_strategy(), 1..60)) {
        let (mut store, clock, people, courts) = setup();

        for action in &actions {
            clock.advance(5);
            apply(&mut store, &people, &courts, action);
            assert_invariants(&store);
        }
    }

    #[test]
    fn clear_then_fill_reseats_vacated_players(extra in 0usize..5) {
        let (mut store, clock, people, courts) = setup();
        for person in people.iter().skip(4 + extra) {
            store.make_person_inactive(*person).expect("inactive");
        }
        store.fill_court(courts[0]).expect("fill");
        let before: BTreeSet<_> = rows::assignments_for_court(store.conn(), courts[0])
            .expect("seated")
            .into_iter()
            .map(|a| a.person)
            .collect();
        let queue_before = store.waiting_queue().expect("queue");

        clock.advance(5);
        store.clear_court(courts[0]).expect("clear");
        store.fill_court(courts[0]).expect("refill");

        let after: BTreeSet<_> = rows::assignments_for_court(store.conn(), courts[0])
            .expect("seated")
            .into_iter()
            .map(|a| a.person)
            .collect();
        // With others waiting, the refill seats them ahead of the vacated players.
        if queue_before.is_empty() {
            prop_assert_eq!(before, after);
        } else {
            prop_assert_eq!(after.len(), 4);
        }
        assert_invariants(&store);
    }
}
