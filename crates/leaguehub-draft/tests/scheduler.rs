//! Turn-loop tests. Time is paused, so turn timeouts fire as soon as the
//! runtime is otherwise idle and elapsed time is exact.

use std::sync::Arc;
use std::time::Duration;

use leaguehub_draft::{DraftConfig, DraftScheduler, DraftStore, MemoryDraftStore, StoreError};
use leaguehub_protocol::{
    ClientMessage, DraftState, LeagueId, ServerEvent, StartOutcome, TurnEndReason, UserId,
};
use leaguehub_room::{Coordinator, CoordinatorConfig, PickOutcome, StaticRoster};
use leaguehub_transport::{MemoryConnection, MemoryPeer};
use tokio::time::Instant;

type Scheduler<S> = DraftScheduler<MemoryConnection, StaticRoster, S>;

const TURN: Duration = Duration::from_secs(10);

// =========================================================================
// Helpers
// =========================================================================

fn league() -> LeagueId {
    LeagueId::from("l1")
}

fn uid(s: &str) -> UserId {
    UserId::from(s)
}

fn users(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| uid(n)).collect()
}

fn pick() -> ClientMessage {
    ClientMessage::DraftPicked { pick: None }
}

fn scheduler_with<S: DraftStore>(store: Arc<S>, config: DraftConfig) -> Scheduler<S> {
    let coordinator = Coordinator::new(
        "draft",
        StaticRoster::new().with_league("l1", ["a", "b", "c"]),
        CoordinatorConfig::default(),
    );
    DraftScheduler::new(Arc::new(coordinator), store, config)
}

fn scheduler() -> (Scheduler<MemoryDraftStore>, Arc<MemoryDraftStore>) {
    let store = Arc::new(MemoryDraftStore::new());
    (
        scheduler_with(Arc::clone(&store), DraftConfig::default()),
        store,
    )
}

/// Connects `user` to the draft room and discards the join traffic.
async fn observe<S: DraftStore>(scheduler: &Scheduler<S>, user: &str) -> MemoryPeer {
    let (conn, mut peer) = MemoryConnection::pair();
    scheduler
        .coordinator()
        .connect(&league(), &uid(user), Arc::new(conn))
        .await
        .unwrap();
    while peer.try_recv().is_some() {}
    peer
}

async fn next_event(peer: &mut MemoryPeer) -> ServerEvent {
    let frame = peer.recv().await.expect("peer channel closed");
    serde_json::from_slice(&frame).expect("frame should decode as a ServerEvent")
}

/// Reads events until the draft reports COMPLETED.
async fn until_completed(peer: &mut MemoryPeer) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(peer).await;
        let done = matches!(
            event,
            ServerEvent::DraftStateChange {
                draft_state: DraftState::Completed
            }
        );
        events.push(event);
        if done {
            return events;
        }
    }
}

fn turn_starts(events: &[ServerEvent]) -> Vec<(u32, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::DraftTurnStart {
                round_num,
                current_user_id,
                ..
            } => Some((*round_num, current_user_id.to_string())),
            _ => None,
        })
        .collect()
}

async fn wait_until_idle<S: DraftStore>(scheduler: &Scheduler<S>) {
    while scheduler.is_running(&league()) {
        tokio::task::yield_now().await;
    }
}

/// A store whose writes always fail.
struct BrokenStore;

impl DraftStore for BrokenStore {
    async fn save_state(&self, _league_id: &LeagueId, _state: DraftState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }
}

// =========================================================================
// Turn order
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_three_rounds_follow_snake_order() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;

    let began = Instant::now();
    let outcome = scheduler.start(&league(), users(&["a", "b", "c"]), 3, TURN);
    assert_eq!(outcome, StartOutcome::Running);

    let events = until_completed(&mut peer).await;

    let expected: Vec<(u32, String)> = [
        (1, "a"), (1, "b"), (1, "c"),
        (2, "c"), (2, "b"), (2, "a"),
        (3, "a"), (3, "b"), (3, "c"),
    ]
    .into_iter()
    .map(|(r, u)| (r, u.to_string()))
    .collect();
    assert_eq!(turn_starts(&events), expected);

    // stateChange, then strict turnStart/turnEnd pairs, then stateChange.
    assert!(matches!(
        events.first(),
        Some(ServerEvent::DraftStateChange {
            draft_state: DraftState::InProgress
        })
    ));
    assert_eq!(events.len(), 2 + 2 * 9);
    for pair in events[1..events.len() - 1].chunks(2) {
        match pair {
            [
                ServerEvent::DraftTurnStart {
                    round_num: r1,
                    current_user_id: u1,
                    ..
                },
                ServerEvent::DraftTurnEnd {
                    round_num: r2,
                    previous_user_id: u2,
                    ended_by,
                    ..
                },
            ] => {
                assert_eq!((r1, u1), (r2, u2));
                assert_eq!(*ended_by, TurnEndReason::Timeout);
            }
            other => panic!("expected a turnStart/turnEnd pair, got {other:?}"),
        }
    }

    assert!(began.elapsed() >= TURN * 9);
}

#[tokio::test(start_paused = true)]
async fn test_start_draft_uses_roster_order() {
    let store = Arc::new(MemoryDraftStore::new());
    let config = DraftConfig {
        num_rounds: 1,
        turn_timeout: Duration::from_secs(1),
        shuffle_order: false,
    };
    let scheduler = scheduler_with(store, config);
    let mut peer = observe(&scheduler, "b").await;

    assert_eq!(
        scheduler.start_draft(&league()).await.unwrap(),
        StartOutcome::Running
    );
    let events = until_completed(&mut peer).await;
    assert_eq!(
        turn_starts(&events),
        vec![(1, "a".to_string()), (1, "b".to_string()), (1, "c".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shuffled_order_is_a_permutation_of_roster() {
    let store = Arc::new(MemoryDraftStore::new());
    let config = DraftConfig {
        num_rounds: 2,
        turn_timeout: Duration::from_secs(1),
        shuffle_order: true,
    };
    let scheduler = scheduler_with(store, config);
    let mut peer = observe(&scheduler, "a").await;

    scheduler.start_draft(&league()).await.unwrap();
    let starts = turn_starts(&until_completed(&mut peer).await);

    let mut first_round: Vec<String> = starts[..3].iter().map(|(_, u)| u.clone()).collect();
    let second_round: Vec<String> = starts[3..].iter().map(|(_, u)| u.clone()).collect();
    let mut reversed = first_round.clone();
    reversed.reverse();
    assert_eq!(second_round, reversed);

    first_round.sort();
    assert_eq!(first_round, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_turn_timeout_is_used_as_given() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    let short = Duration::from_millis(100);

    let began = Instant::now();
    scheduler.start(&league(), users(&["a"]), 1, short);
    until_completed(&mut peer).await;

    assert!(began.elapsed() >= short);
    assert!(began.elapsed() < DraftConfig::MIN_TURN_TIMEOUT);
}

// =========================================================================
// Picks
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pick_ends_turn_before_deadline() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a", "b"]), 1, TURN);

    assert!(matches!(
        next_event(&mut peer).await,
        ServerEvent::DraftStateChange { .. }
    ));
    assert!(matches!(
        next_event(&mut peer).await,
        ServerEvent::DraftTurnStart { current_user_id, .. } if current_user_id == uid("a")
    ));

    let picked_at = Instant::now();
    assert_eq!(
        scheduler.handle_pick(&league(), &uid("a"), &pick()).await,
        Some(PickOutcome::Accepted)
    );
    match next_event(&mut peer).await {
        ServerEvent::DraftTurnEnd {
            previous_user_id,
            ended_by,
            ..
        } => {
            assert_eq!(previous_user_id, uid("a"));
            assert_eq!(ended_by, TurnEndReason::Pick);
        }
        other => panic!("expected turnEnd, got {other:?}"),
    }
    assert!(picked_at.elapsed() < TURN);

    // b stays silent and runs out the clock.
    let rest = until_completed(&mut peer).await;
    assert!(rest.iter().any(|e| matches!(
        e,
        ServerEvent::DraftTurnEnd { previous_user_id, ended_by: TurnEndReason::Timeout, .. }
            if *previous_user_id == uid("b")
    )));
}

#[tokio::test(start_paused = true)]
async fn test_pick_from_other_user_is_ignored() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    let began = Instant::now();
    scheduler.start(&league(), users(&["a", "b"]), 1, TURN);

    next_event(&mut peer).await;
    next_event(&mut peer).await;

    assert_eq!(
        scheduler.handle_pick(&league(), &uid("b"), &pick()).await,
        Some(PickOutcome::NotCurrentUser)
    );
    assert_eq!(
        scheduler.handle_pick(&league(), &uid("zed"), &pick()).await,
        Some(PickOutcome::NotCurrentUser)
    );
    assert!(peer.try_recv().is_none());

    match next_event(&mut peer).await {
        ServerEvent::DraftTurnEnd { ended_by, .. } => {
            assert_eq!(ended_by, TurnEndReason::Timeout);
        }
        other => panic!("expected turnEnd, got {other:?}"),
    }
    assert!(began.elapsed() >= TURN);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_pick_advances_once() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a", "b"]), 1, TURN);

    next_event(&mut peer).await;
    next_event(&mut peer).await;

    assert_eq!(
        scheduler.handle_pick(&league(), &uid("a"), &pick()).await,
        Some(PickOutcome::Accepted)
    );
    let second = scheduler.handle_pick(&league(), &uid("a"), &pick()).await;
    assert_ne!(second, Some(PickOutcome::Accepted));

    let events = until_completed(&mut peer).await;
    let ends: Vec<(String, TurnEndReason)> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::DraftTurnEnd {
                previous_user_id,
                ended_by,
                ..
            } => Some((previous_user_id.to_string(), *ended_by)),
            _ => None,
        })
        .collect();
    assert_eq!(
        ends,
        vec![
            ("a".to_string(), TurnEndReason::Pick),
            ("b".to_string(), TurnEndReason::Timeout),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_pick_after_completion_is_stale() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a"]), 1, TURN);
    until_completed(&mut peer).await;

    assert_eq!(
        scheduler.handle_pick(&league(), &uid("a"), &pick()).await,
        Some(PickOutcome::NoActiveTurn)
    );
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected_while_running() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;

    assert_eq!(
        scheduler.start(&league(), users(&["a", "b"]), 2, TURN),
        StartOutcome::Running
    );
    assert_eq!(
        scheduler.start(&league(), users(&["c"]), 5, TURN),
        StartOutcome::AlreadyRunning
    );
    assert_eq!(
        scheduler.start_draft(&league()).await.unwrap(),
        StartOutcome::AlreadyRunning
    );

    let events = until_completed(&mut peer).await;
    assert_eq!(turn_starts(&events).len(), 4);

    // Once the loop is gone the league can draft again.
    wait_until_idle(&scheduler).await;
    assert_eq!(
        scheduler.start(&league(), users(&["a"]), 1, TURN),
        StartOutcome::Running
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_participants_complete_immediately() {
    let (scheduler, store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;

    let began = Instant::now();
    assert_eq!(
        scheduler.start(&league(), Vec::new(), 3, TURN),
        StartOutcome::Running
    );
    let events = until_completed(&mut peer).await;

    assert_eq!(events.len(), 1);
    assert!(began.elapsed() < TURN);
    wait_until_idle(&scheduler).await;
    assert_eq!(store.history(&league()), vec![DraftState::Completed]);
}

#[tokio::test(start_paused = true)]
async fn test_state_is_persisted_at_both_ends() {
    let (scheduler, store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a", "b"]), 1, TURN);

    until_completed(&mut peer).await;
    assert_eq!(
        store.history(&league()),
        vec![DraftState::InProgress, DraftState::Completed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_does_not_stop_draft() {
    let scheduler = scheduler_with(Arc::new(BrokenStore), DraftConfig::default());
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a", "b"]), 2, TURN);

    let events = until_completed(&mut peer).await;
    assert_eq!(turn_starts(&events).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_draft_runs_with_nobody_connected() {
    let (scheduler, store) = scheduler();
    scheduler.start(&league(), users(&["a", "b", "c"]), 2, TURN);

    tokio::time::sleep(TURN * 6 + Duration::from_secs(1)).await;
    wait_until_idle(&scheduler).await;

    assert_eq!(store.latest(&league()), Some(DraftState::Completed));
    // Session cleared and room empty: no lock entry left behind.
    assert!(scheduler.coordinator().rooms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_receives_draft_info() {
    let (scheduler, _store) = scheduler();
    scheduler.start(&league(), users(&["a", "b"]), 1, TURN);

    // Let the loop reach its first turn.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (conn, mut peer) = MemoryConnection::pair();
    scheduler
        .coordinator()
        .connect(&league(), &uid("c"), Arc::new(conn))
        .await
        .unwrap();

    assert!(matches!(next_event(&mut peer).await, ServerEvent::State { .. }));
    match next_event(&mut peer).await {
        ServerEvent::DraftInfo {
            current_user_id,
            round_num,
            draft_state,
            ..
        } => {
            assert_eq!(current_user_id, uid("a"));
            assert_eq!(round_num, 1);
            assert_eq!(draft_state, DraftState::InProgress);
        }
        other => panic!("expected draft.info, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut peer).await,
        ServerEvent::PresenceJoin { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_drafts_in_different_leagues_are_independent() {
    let coordinator = Coordinator::<MemoryConnection, _>::new(
        "draft",
        StaticRoster::new()
            .with_league("l1", ["a"])
            .with_league("l2", ["b"]),
        CoordinatorConfig::default(),
    );
    let scheduler = DraftScheduler::new(
        Arc::new(coordinator),
        Arc::new(MemoryDraftStore::new()),
        DraftConfig::default(),
    );

    assert_eq!(
        scheduler.start(&"l1".into(), users(&["a"]), 1, TURN),
        StartOutcome::Running
    );
    assert_eq!(
        scheduler.start(&"l2".into(), users(&["b"]), 1, TURN),
        StartOutcome::Running
    );
    assert!(scheduler.is_running(&"l1".into()));
    assert!(scheduler.is_running(&"l2".into()));
}

#[tokio::test(start_paused = true)]
async fn test_pick_landing_as_deadline_fires_ends_turn_by_pick() {
    let (scheduler, _store) = scheduler();
    let mut peer = observe(&scheduler, "a").await;
    scheduler.start(&league(), users(&["a"]), 1, TURN);
    next_event(&mut peer).await;
    next_event(&mut peer).await;

    tokio::time::sleep(TURN - Duration::from_millis(1)).await;

    // Hold the room so the pick queues first and the deadline fires
    // while it waits.
    let room = scheduler
        .coordinator()
        .rooms()
        .get(&league())
        .expect("room exists while drafting");
    let slot = room.lock().await;
    let picking = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.handle_pick(&league(), &uid("a"), &pick()).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(2)).await;
    drop(slot);
    drop(room);

    assert_eq!(picking.await.unwrap(), Some(PickOutcome::Accepted));
    match next_event(&mut peer).await {
        ServerEvent::DraftTurnEnd { ended_by, .. } => {
            assert_eq!(ended_by, TurnEndReason::Pick);
        }
        other => panic!("expected turnEnd, got {other:?}"),
    }
}
