//! Room actor and registry integration tests.
//!
//! Exercises the async surface: per-room command serialization, broadcast
//! redaction, registry lifecycle (including the destroy-vs-command race),
//! and stats delivery on match end.

use digit_duel::{
    Action, BOARD_COLS, BOARD_ROWS, Board, Digit, GameError, InMemoryStats, MatchEvent,
    MatchRegistry, Phase, PlayerId, RoomBroadcast, RoomConfig, StatsRepository,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{Duration, timeout},
};

type Grid = [[Option<Digit>; BOARD_COLS]; BOARD_ROWS];

fn standard_grid() -> Grid {
    let mut cells: Grid = [[None; BOARD_COLS]; BOARD_ROWS];
    for d in 0..=9u8 {
        cells[d as usize / BOARD_COLS][d as usize % BOARD_COLS] = Some(d);
    }
    cells
}

fn participants(count: usize) -> Vec<(PlayerId, String)> {
    (1..=count as PlayerId)
        .map(|id| (id, format!("p{id}")))
        .collect()
}

/// Config with no reveal delay so tests run at full speed.
fn fast_config(owner: PlayerId) -> RoomConfig {
    RoomConfig {
        owner,
        max_players: 5,
        reveal_pacing_ms: 0,
    }
}

async fn recv_broadcast(rx: &mut mpsc::Receiver<RoomBroadcast>) -> RoomBroadcast {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("broadcast timeout")
        .expect("broadcast channel closed")
}

/// Wait until a broadcast matching the predicate arrives.
async fn wait_for_event(
    rx: &mut mpsc::Receiver<RoomBroadcast>,
    mut predicate: impl FnMut(&MatchEvent) -> bool,
) -> RoomBroadcast {
    for _ in 0..256 {
        let broadcast = recv_broadcast(rx).await;
        if predicate(&broadcast.event) {
            return broadcast;
        }
    }
    panic!("expected event never arrived");
}

#[tokio::test]
async fn test_create_requires_three_players() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    let result = registry
        .create("ab12".to_string(), fast_config(1), participants(2))
        .await;
    assert!(matches!(result, Err(GameError::NotEnoughPlayers)));
}

#[tokio::test]
async fn test_create_rejects_duplicate_room() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("first create");
    let result = registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await;
    assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    assert_eq!(registry.live_match_count().await, 1);
}

#[tokio::test]
async fn test_create_rejects_invalid_config() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    let mut config = fast_config(1);
    config.max_players = 6;
    let result = registry
        .create("ab12".to_string(), config, participants(3))
        .await;
    assert!(matches!(result, Err(GameError::InvalidConfig(_))));

    // More participants than the cap allows.
    let mut config = fast_config(1);
    config.max_players = 3;
    let result = registry
        .create("cd34".to_string(), config, participants(4))
        .await;
    assert!(matches!(result, Err(GameError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_unknown_room_is_unavailable() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    assert!(matches!(
        registry.view("nope", None).await,
        Err(GameError::MatchUnavailable)
    ));
    assert!(matches!(
        registry.take_action("nope", 1, Action::Skip).await,
        Err(GameError::MatchUnavailable)
    ));
}

#[tokio::test]
async fn test_destroyed_room_rejects_commands() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    let handle = registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("create");

    registry.destroy("ab12").await.expect("destroy");
    assert!(registry.get("ab12").await.is_none());
    assert_eq!(registry.live_match_count().await, 0);

    // Through the registry: the entry is gone.
    assert!(matches!(
        registry.start_match("ab12", 1).await,
        Err(GameError::MatchUnavailable)
    ));
    // Through a stale handle: the actor is gone, the command fails cleanly.
    let (tx, _rx) = tokio::sync::oneshot::channel();
    let late = handle
        .send(digit_duel::RoomMessage::StartMatch {
            caller: 1,
            response: tx,
        })
        .await;
    assert!(matches!(late, Err(GameError::MatchUnavailable)));

    // Destroying twice reports the room as gone.
    assert!(matches!(
        registry.destroy("ab12").await,
        Err(GameError::MatchUnavailable)
    ));
}

#[tokio::test]
async fn test_only_the_owner_starts_the_match() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("create");

    let response = registry.start_match("ab12", 2).await.expect("send");
    assert_eq!(response.error(), Some(&GameError::NotRoomOwner));

    let response = registry.start_match("ab12", 1).await.expect("send");
    assert!(response.is_accepted());

    let view = registry.view("ab12", None).await.expect("view");
    assert_eq!(view.phase, Phase::Deployment);
}

#[tokio::test]
async fn test_round_flow_with_redacted_broadcasts() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("create");

    let (tx, mut rx) = mpsc::channel(64);
    registry.subscribe("ab12", 1, tx).await.expect("subscribe");

    assert!(
        registry
            .start_match("ab12", 1)
            .await
            .expect("send")
            .is_accepted()
    );

    for id in 1..=3 {
        let response = registry
            .deploy("ab12", id, standard_grid())
            .await
            .expect("send");
        assert!(response.is_accepted());
    }
    let complete =
        wait_for_event(&mut rx, |e| matches!(e, MatchEvent::DeploymentComplete)).await;
    assert_eq!(complete.view.phase, Phase::Action);
    assert_eq!(complete.view.round, 1);

    // Every broadcast to player 1 shows player 1's digits and redacts the
    // other boards down to occupancy.
    for player in &complete.view.players {
        if player.id == 1 {
            assert!(player.board.is_some());
        } else {
            assert!(player.board.is_none());
            assert!(player.occupancy.iter().flatten().filter(|&&c| c).count() == 10);
        }
    }

    // All three players expose their digit 2; the first two mutually
    // eliminate and the leftover goes home at round end.
    for _ in 0..3 {
        let view = registry.view("ab12", None).await.expect("view");
        let current = view.current_turn.expect("current player");
        let response = registry
            .take_action("ab12", current, Action::Advance { row: 0, col: 2 })
            .await
            .expect("send");
        assert!(response.is_accepted());
    }

    let fight =
        wait_for_event(&mut rx, |e| matches!(e, MatchEvent::Confrontation { .. })).await;
    match fight.event {
        MatchEvent::Confrontation { winner, loser, .. } => {
            assert_eq!(winner, None);
            assert_eq!(loser, None);
        }
        _ => unreachable!(),
    }

    let next_round =
        wait_for_event(&mut rx, |e| matches!(e, MatchEvent::RoundStarted(2))).await;
    assert_eq!(next_round.view.phase, Phase::Action);
    assert!(next_round.view.contested.is_empty());
}

#[tokio::test]
async fn test_unsubscribed_player_stops_receiving() {
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    let handle = registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("create");

    let (tx, mut rx) = mpsc::channel(64);
    registry.subscribe("ab12", 2, tx).await.expect("subscribe");
    handle
        .send(digit_duel::RoomMessage::Unsubscribe { player: 2 })
        .await
        .expect("unsubscribe");

    assert!(
        registry
            .start_match("ab12", 1)
            .await
            .expect("send")
            .is_accepted()
    );
    registry
        .deploy("ab12", 1, standard_grid())
        .await
        .expect("send");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

/// Scan for the first piece that can legally advance, front row first.
fn choose_move(board: &Board) -> Option<(usize, usize)> {
    for col in 0..BOARD_COLS {
        if board.get(0, col).is_some() {
            return Some((0, col));
        }
    }
    for row in 1..BOARD_ROWS {
        for col in 0..BOARD_COLS {
            if board.get(row, col).is_some() && board.get(row - 1, col).is_none() {
                return Some((row, col));
            }
        }
    }
    None
}

#[tokio::test]
async fn test_full_match_through_actor_updates_stats() {
    let stats = Arc::new(InMemoryStats::new());
    let registry = MatchRegistry::new(stats.clone());
    registry
        .create("ab12".to_string(), fast_config(1), participants(3))
        .await
        .expect("create");

    assert!(
        registry
            .start_match("ab12", 1)
            .await
            .expect("send")
            .is_accepted()
    );
    for id in 1..=3 {
        assert!(
            registry
                .deploy("ab12", id, standard_grid())
                .await
                .expect("send")
                .is_accepted()
        );
    }

    // Drive the match to completion: every player always advances when
    // possible, and a bonus holder always skips.
    let winner = {
        let mut guard = 0;
        loop {
            guard += 1;
            assert!(guard < 2000, "match did not converge");

            let view = registry.view("ab12", None).await.expect("view");
            match view.phase {
                Phase::Ended => break view.winner.expect("winner"),
                Phase::Action => {
                    let current = view.current_turn.expect("current player");
                    let mine = registry.view("ab12", Some(current)).await.expect("view");
                    let board = mine
                        .players
                        .iter()
                        .find(|p| p.id == current)
                        .and_then(|p| p.board)
                        .expect("own board");
                    let action = match choose_move(&board) {
                        Some((row, col)) => Action::Advance { row, col },
                        None => Action::Skip,
                    };
                    let response = registry
                        .take_action("ab12", current, action)
                        .await
                        .expect("send");
                    assert!(response.is_accepted());
                }
                Phase::Settlement => {
                    if let Some(holder) = view.bonus_holder {
                        let response = registry
                            .take_action("ab12", holder, Action::Skip)
                            .await
                            .expect("send");
                        assert!(response.is_accepted());
                    } else {
                        // The actor is pacing confrontations; let it run.
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                }
                _ => tokio::time::sleep(Duration::from_millis(2)).await,
            }
        }
    };

    // The room still answers reads after the match ends.
    let view = registry.view("ab12", None).await.expect("view");
    assert_eq!(view.phase, Phase::Ended);
    assert_eq!(view.winner, Some(winner));

    // Winner got a game and a win; the others a game each.
    let record = stats.player_record(winner).await.expect("record");
    assert_eq!(record.games, 1);
    assert_eq!(record.wins, 1);
    for id in (1..=3).filter(|id| *id != winner) {
        let record = stats.player_record(id).await.expect("record");
        assert_eq!(record.games, 1);
        assert_eq!(record.wins, 0);
    }

    registry.destroy("ab12").await.expect("destroy");
}

#[tokio::test]
async fn test_rooms_progress_independently() {
    // Two rooms, one stalled mid-deployment, must not block the other.
    let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
    registry
        .create("aaaa".to_string(), fast_config(1), participants(3))
        .await
        .expect("create aaaa");
    registry
        .create("bbbb".to_string(), fast_config(1), participants(3))
        .await
        .expect("create bbbb");

    // Room aaaa starts and never deploys; room bbbb plays a full round.
    assert!(
        registry
            .start_match("aaaa", 1)
            .await
            .expect("send")
            .is_accepted()
    );
    assert!(
        registry
            .start_match("bbbb", 1)
            .await
            .expect("send")
            .is_accepted()
    );
    for id in 1..=3 {
        assert!(
            registry
                .deploy("bbbb", id, standard_grid())
                .await
                .expect("send")
                .is_accepted()
        );
    }
    for _ in 0..3 {
        let view = registry.view("bbbb", None).await.expect("view");
        let current = view.current_turn.expect("current player");
        assert!(
            registry
                .take_action("bbbb", current, Action::Skip)
                .await
                .expect("send")
                .is_accepted()
        );
    }

    // bbbb reached round 2 while aaaa is still waiting on deployments.
    let mut guard = 0;
    loop {
        guard += 1;
        assert!(guard < 100, "round never closed");
        let view = registry.view("bbbb", None).await.expect("view");
        if view.round == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let stalled = registry.view("aaaa", None).await.expect("view");
    assert_eq!(stalled.phase, Phase::Deployment);
}
