
use party_rooms::coordination::RoomCoordinator;
use party_rooms::protocol::{GameSnapshot, RoomStatus};
use std::sync::Arc;
use test_helpers::{create_test_coordinator, test_config};
use tokio::sync::Barrier;
use uuid::Uuid;

async fn room_with_host(coordinator: &RoomCoordinator) -> (String, Uuid) {
    let host = Uuid::new_v4();
    let room = coordinator.create_room(host, "Host").await.unwrap();
    (room.code, host)
}

/// Concurrent joins by the same identity must leave exactly one membership row.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_join_yields_one_membership() {
    let coordinator = Arc::new(create_test_coordinator(&test_config()));
    let (code, _host) = room_with_host(&coordinator).await;
    let guest = Uuid::new_v4();
    let attempts = 8usize;
    let barrier = Arc::new(Barrier::new(attempts));

    let mut handles = Vec::new();
    for _ in 0..attempts {
        let coordinator = Arc::clone(&coordinator);
        let barrier = Arc::clone(&barrier);
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator.join_room(&code, guest, "Guest").await
        }));
    }

    let mut fresh_joins = 0;
    for handle in handles {
        let joined = handle.await.unwrap().unwrap();
        if !joined.already_member {
            fresh_joins += 1;
        }
    }
    assert_eq!(fresh_joins, 1);

    let roster = coordinator.roster(&code).await.unwrap();
    assert_eq!(roster.iter().filter(|p| p.user_id == guest).count(), 1);
    assert_eq!(roster.len(), 2);
}

/// Racing joins never overfill a room.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_respect_capacity() {
    let coordinator = Arc::new(create_test_coordinator(&test_config()));
    let (code, host) = room_with_host(&coordinator).await;
    coordinator.set_max_players(host, &code, 4).await.unwrap();

    let attempts = 10usize;
    let barrier = Arc::new(Barrier::new(attempts));
    let mut handles = Vec::new();
    for i in 0..attempts {
        let coordinator = Arc::clone(&coordinator);
        let barrier = Arc::clone(&barrier);
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator
                .join_room(&code, Uuid::new_v4(), &format!("Guest{i}"))
                .await
                .is_ok()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);
    assert_eq!(coordinator.roster(&code).await.unwrap().len(), 4);
}

/// Concurrent host repairs converge on the earliest-joined remaining member.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_host_migration_converges() {
    let coordinator = Arc::new(create_test_coordinator(&test_config()));
    let (code, host) = room_with_host(&coordinator).await;
    let first = Uuid::new_v4();
    coordinator.join_room(&code, first, "First").await.unwrap();
    for i in 0..3 {
        coordinator
            .join_room(&code, Uuid::new_v4(), &format!("Guest{i}"))
            .await
            .unwrap();
    }

    let attempts = 6usize;
    let barrier = Arc::new(Barrier::new(attempts + 1));
    let mut handles = Vec::new();
    for _ in 0..attempts {
        let coordinator = Arc::clone(&coordinator);
        let barrier = Arc::clone(&barrier);
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator.migrate_host(&code).await
        }));
    }

    barrier.wait().await;
    let outcome = coordinator.leave_room(host, &code).await.unwrap();
    assert_eq!(outcome.new_host, Some(first));

    for handle in handles {
        // Repairs that ran before the leave see the old host; later ones see `first`.
        let current = handle.await.unwrap().unwrap();
        assert!(current == Some(host) || current == Some(first));
    }
    assert_eq!(coordinator.room(&code).await.unwrap().host_id, first);
    assert_eq!(coordinator.metrics().snapshot().players.host_migrations, 1);
}

/// Only one of several concurrent starts wins the status compare-and-set.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_game_wins_once() {
    let coordinator = Arc::new(create_test_coordinator(&test_config()));
    let (code, host) = room_with_host(&coordinator).await;
    coordinator
        .select_game(host, &code, "charades")
        .await
        .unwrap();

    let attempts = 5usize;
    let barrier = Arc::new(Barrier::new(attempts));
    let mut handles = Vec::new();
    for _ in 0..attempts {
        let coordinator = Arc::clone(&coordinator);
        let barrier = Arc::clone(&barrier);
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator
                .start_game(host, &code, GameSnapshot::empty("charades"))
                .await
                .is_ok()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(
        coordinator.room(&code).await.unwrap().status,
        RoomStatus::Playing
    );
    assert_eq!(coordinator.metrics().snapshot().rooms.games_started, 1);
}
