mod common;

use campus_portal::{
    feed::{Change, ChangeFeed},
    model::{RegistrationState, Role},
    store::{EventRepository, Ledger, LedgerStrategy},
    PortalError,
};
use futures_util::future::join_all;
use rstest::rstest;

use common::harness;

const RETRY: LedgerStrategy = LedgerStrategy::CompareAndRetry { max_attempts: 100 };

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test]
async fn adding_twice_keeps_one_entry(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    h.state.events.add_registrant(&alice, &event, "alice").await.unwrap();
    h.state.events.add_registrant(&alice, &event, "alice").await.unwrap();

    assert_eq!(h.state.events.get(&event).await.unwrap().registered_students, ["alice"]);
}

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test]
async fn removing_an_absent_student_is_a_no_op(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    h.state.events.remove_registrant(&alice, &event, "alice").await.unwrap();

    assert!(h.state.events.get(&event).await.unwrap().registered_students.is_empty());
}

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_all_land(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let admin = h.profile("admin", Role::Admin).await;
    let event = h.event(&admin, "Robotics Expo").await;

    let mut students = Vec::new();
    for i in 0..12 {
        students.push(h.profile(&format!("s{i:02}"), Role::Student).await);
    }

    let adds = students.iter().map(|student| {
        let events = h.state.events.clone();
        let student = student.clone();
        let event = event.clone();
        tokio::spawn(async move { events.add_registrant(&student, &event, &student.uid).await })
    });
    for result in join_all(adds).await {
        result.unwrap().unwrap();
    }

    let mut ledger = h.state.events.get(&event).await.unwrap().registered_students;
    ledger.sort();
    let expected: Vec<String> = students.iter().map(|s| s.uid.clone()).collect();
    assert_eq!(ledger, expected);

    // the even half leaves while the odd half re-registers
    let churn = students.iter().enumerate().map(|(i, student)| {
        let events = h.state.events.clone();
        let student = student.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if i % 2 == 0 {
                events.remove_registrant(&student, &event, &student.uid).await
            } else {
                events.add_registrant(&student, &event, &student.uid).await
            }
        })
    });
    for result in join_all(churn).await {
        result.unwrap().unwrap();
    }

    let mut ledger = h.state.events.get(&event).await.unwrap().registered_students;
    ledger.sort();
    let odd: Vec<String> = students.iter().skip(1).step_by(2).map(|s| s.uid.clone()).collect();
    assert_eq!(ledger, odd);
}

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_leaves_while_another_joins(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let admin = h.profile("admin", Role::Admin).await;
    let a = h.profile("A", Role::Student).await;
    let b = h.profile("B", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;
    h.state.events.add_registrant(&a, &event, "A").await.unwrap();

    let (joined, left) = tokio::join!(
        h.state.events.add_registrant(&b, &event, "B"),
        h.state.events.remove_registrant(&a, &event, "A"),
    );
    joined.unwrap();
    left.unwrap();

    assert_eq!(h.state.events.get(&event).await.unwrap().registered_students, ["B"]);
}

#[tokio::test]
async fn registration_order_is_kept() {
    let h = harness(LedgerStrategy::Atomic).await;
    let admin = h.profile("admin", Role::Admin).await;
    let event = h.event(&admin, "Robotics Expo").await;

    for uid in ["zed", "amy", "kim"] {
        let student = h.profile(uid, Role::Student).await;
        h.state.events.add_registrant(&student, &event, uid).await.unwrap();
    }
    let amy = h.state.profiles.get("amy").await.unwrap();
    h.state.events.remove_registrant(&amy, &event, "amy").await.unwrap();

    assert_eq!(h.state.events.get(&event).await.unwrap().registered_students, ["zed", "kim"]);
}

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test]
async fn missing_event_is_not_found(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let alice = h.profile("alice", Role::Student).await;

    for result in [
        h.state.events.add_registrant(&alice, "nope", "alice").await,
        h.state.events.remove_registrant(&alice, "nope", "alice").await,
    ] {
        assert!(matches!(result, Err(PortalError::NotFound { .. })), "{result:?}");
    }
}

#[tokio::test]
async fn students_only_touch_their_own_entry() {
    let h = harness(LedgerStrategy::Atomic).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    h.profile("bob", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    let foreign = h.state.events.add_registrant(&alice, &event, "bob").await;
    assert!(matches!(foreign, Err(PortalError::Permission(_))));

    let by_admin = h.state.events.add_registrant(&admin, &event, "admin").await;
    assert!(matches!(by_admin, Err(PortalError::Permission(_))));

    assert!(h.state.events.get(&event).await.unwrap().registered_students.is_empty());
}

#[tokio::test]
async fn set_registration_drives_to_target() {
    let h = harness(LedgerStrategy::Atomic).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;
    let ledger: &dyn Ledger = &h.state.events;

    let state = ledger.set_registration(&alice, &event, RegistrationState::Registered).await.unwrap();
    assert_eq!(state, RegistrationState::Registered);
    let state = ledger.set_registration(&alice, &event, RegistrationState::Registered).await.unwrap();
    assert_eq!(state, RegistrationState::Registered);
    assert_eq!(h.state.events.get(&event).await.unwrap().registered_students, ["alice"]);

    let state = h.state.events.toggle_registration(&alice, &event).await.unwrap();
    assert_eq!(state, RegistrationState::Unregistered);
    assert!(h.state.events.get(&event).await.unwrap().registered_students.is_empty());
}

#[tokio::test]
async fn editing_an_event_leaves_the_ledger_alone() {
    let h = harness(LedgerStrategy::Atomic).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;
    h.state.events.add_registrant(&alice, &event, "alice").await.unwrap();

    h.state
        .events
        .update(&admin, &event, campus_portal::model::EventPatch {
            venue: Some("Auditorium".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap();

    let stored = h.state.events.get(&event).await.unwrap();
    assert_eq!(stored.venue, "Auditorium");
    assert_eq!(stored.name, "Robotics Expo");
    assert_eq!(stored.registered_students, ["alice"]);
}

#[tokio::test]
async fn board_refreshes_after_a_registration() {
    let h = harness(LedgerStrategy::Atomic).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    let before = h.state.board.snapshot(&h.state.events).await.unwrap();
    assert_eq!(before.len(), 1);
    assert!(before[0].registered_students.is_empty());

    h.state.events.add_registrant(&alice, &event, "alice").await.unwrap();
    let after = h.state.board.snapshot(&h.state.events).await.unwrap();
    assert_eq!(after[0].registered_students, ["alice"]);

    h.event(&admin, "Chess Open").await;
    assert_eq!(h.state.board.snapshot(&h.state.events).await.unwrap().len(), 2);
}

#[tokio::test]
async fn retries_give_up_when_every_write_loses() {
    let h = harness(LedgerStrategy::CompareAndRetry { max_attempts: 3 }).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    // every versioned rewrite of the ledger is silently dropped, as if another writer won
    sqlx::query(
        "CREATE TRIGGER always_stale BEFORE UPDATE OF registered_students ON events \
         BEGIN SELECT RAISE(IGNORE); END",
    )
    .execute(&h.db_pool)
    .await
    .unwrap();

    let result = h.state.events.add_registrant(&alice, &event, "alice").await;
    assert!(matches!(result, Err(PortalError::Conflict { attempts: 3 })), "{result:?}");
    assert!(h.state.events.get(&event).await.unwrap().registered_students.is_empty());
}

#[tokio::test]
async fn zero_attempts_still_tries_once() {
    let h = harness(LedgerStrategy::CompareAndRetry { max_attempts: 0 }).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    h.state.events.add_registrant(&alice, &event, "alice").await.unwrap();
    assert_eq!(h.state.events.get(&event).await.unwrap().registered_students, ["alice"]);
}

#[rstest]
#[case(LedgerStrategy::Atomic)]
#[case(RETRY)]
#[tokio::test]
async fn only_real_changes_are_announced(#[case] strategy: LedgerStrategy) {
    let h = harness(strategy).await;
    let admin = h.profile("admin", Role::Admin).await;
    let alice = h.profile("alice", Role::Student).await;
    let event = h.event(&admin, "Robotics Expo").await;

    let feed = ChangeFeed::new();
    let mut changes = feed.subscribe();
    let events = EventRepository::new(h.db_pool.clone(), feed, strategy);

    events.add_registrant(&alice, &event, "alice").await.unwrap();
    events.add_registrant(&alice, &event, "alice").await.unwrap();
    events.remove_registrant(&alice, &event, "alice").await.unwrap();
    events.remove_registrant(&alice, &event, "alice").await.unwrap();

    let mut seen = Vec::new();
    while let Ok(change) = changes.try_recv() {
        if let Change::Registration { state, .. } = change {
            seen.push(state);
        }
    }
    assert_eq!(seen, [RegistrationState::Registered, RegistrationState::Unregistered]);
}
