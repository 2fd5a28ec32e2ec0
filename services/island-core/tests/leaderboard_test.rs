//! Leaderboard and token-id allocator integration tests.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use island_core_service::services::{LeaderboardService, TokenIdService};
use island_core_types::{PlatformUser, UserRecord};
use island_storage::MemoryStore;

fn user_with_points(id: i64, wallet: &str, points: u64) -> UserRecord {
    let platform = PlatformUser {
        id,
        first_name: format!("User{}", id),
        last_name: String::new(),
        username: String::new(),
    };
    let mut record = UserRecord::new(&platform, wallet, Utc::now());
    record.points = points;
    record
}

#[tokio::test]
async fn top_n_orders_by_points_descending() {
    let store = Arc::new(MemoryStore::new());
    let board = LeaderboardService::new(store);
    let period = board.current_period();

    for (id, points) in [(1, 30u64), (2, 120), (3, 70), (4, 5)] {
        let user = user_with_points(id, &format!("0xwallet{}", id), points);
        board.record_points(&period, &user).unwrap();
    }

    let top = board.top_n(&period, 3).unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(
        top.iter().map(|e| e.points).collect::<Vec<_>>(),
        vec![120, 70, 30]
    );
}

#[tokio::test]
async fn equal_totals_rank_identically() {
    let store = Arc::new(MemoryStore::new());
    let board = LeaderboardService::new(store);
    let period = board.current_period();

    let first = user_with_points(1, "0xaaa", 100);
    let tied_a = user_with_points(2, "0xbbb", 60);
    let tied_b = user_with_points(3, "0xccc", 60);
    for user in [&first, &tied_a, &tied_b] {
        board.record_points(&period, user).unwrap();
    }

    assert_eq!(board.rank_of(&period, &first.user_key).unwrap().rank, Some(1));
    assert_eq!(board.rank_of(&period, &tied_a.user_key).unwrap().rank, Some(2));
    assert_eq!(board.rank_of(&period, &tied_b.user_key).unwrap().rank, Some(2));

    // An absent user is unranked, not an error.
    let stranger = user_with_points(9, "0xddd", 0);
    let info = board.rank_of(&period, &stranger.user_key).unwrap();
    assert_eq!(info.rank, None);
    assert_eq!(info.total_participants, 3);
}

#[tokio::test]
async fn re_recording_updates_instead_of_duplicating() {
    let store = Arc::new(MemoryStore::new());
    let board = LeaderboardService::new(store);
    let period = board.current_period();

    let mut user = user_with_points(1, "0xaaa", 50);
    board.record_points(&period, &user).unwrap();
    user.points = 150;
    board.record_points(&period, &user).unwrap();

    let top = board.top_n(&period, 10).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].points, 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_token_id_allocation_never_repeats() {
    let store = Arc::new(MemoryStore::new());
    let allocator = Arc::new(TokenIdService::new(store, false));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move { allocator.next_token_id().unwrap() }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let id = handle.await.unwrap();
        assert!(seen.insert(id), "token id {} allocated twice", id);
    }
    assert_eq!(seen.len(), 50);
    assert_eq!(*seen.iter().max().unwrap(), 50);
}
