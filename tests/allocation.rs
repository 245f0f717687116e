//! Integration tests for board allocation.

use kratzer_tournament_web::{allocate_boards, Player};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn players(n: usize) -> Vec<Player> {
    (0..n).map(|i| Player::new(format!("P{i}"), "B", 3)).collect()
}

#[test]
fn every_player_placed_once_within_group_size() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in 1..=24 {
        for board_count in 1..=6u32 {
            for max_group_size in 2..=6u32 {
                if (board_count * max_group_size) < n as u32 {
                    continue;
                }
                let ps = players(n);
                let boards = allocate_boards(&ps, board_count, max_group_size, &mut rng);

                let placed: Vec<_> = boards.iter().flat_map(|b| b.players.iter().copied()).collect();
                assert_eq!(placed.len(), n);
                let unique: HashSet<_> = placed.iter().copied().collect();
                assert_eq!(unique.len(), n);
                assert!(ps.iter().all(|p| unique.contains(&p.id)));

                let board_ids: HashSet<_> = boards.iter().map(|b| b.id).collect();
                assert_eq!(board_ids.len(), boards.len());
                for b in &boards {
                    assert!(!b.players.is_empty());
                    assert!(b.players.len() <= max_group_size as usize);
                    assert!((1..=board_count).contains(&b.id));
                    assert!(b.started_at.is_none());
                }
            }
        }
    }
}

#[test]
fn nine_players_on_two_boards_of_five() {
    let ps = players(9);
    let boards = allocate_boards(&ps, 2, 5, &mut StdRng::seed_from_u64(1));
    assert_eq!(boards.len(), 2);
    let mut sizes: Vec<_> = boards.iter().map(|b| b.players.len()).collect();
    sizes.sort();
    assert_eq!(sizes, vec![4, 5]);
}

#[test]
fn deals_round_robin_so_boards_stay_balanced() {
    let ps = players(10);
    let boards = allocate_boards(&ps, 4, 6, &mut StdRng::seed_from_u64(3));
    let sizes: Vec<_> = boards.iter().map(|b| b.players.len()).collect();
    assert_eq!(sizes, vec![3, 3, 2, 2]);
}

#[test]
fn empty_boards_are_dropped() {
    let ps = players(3);
    let boards = allocate_boards(&ps, 8, 4, &mut StdRng::seed_from_u64(5));
    assert_eq!(boards.len(), 3);
    assert_eq!(
        boards.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn same_seed_same_allocation() {
    let ps = players(12);
    let a = allocate_boards(&ps, 3, 4, &mut StdRng::seed_from_u64(42));
    let b = allocate_boards(&ps, 3, 4, &mut StdRng::seed_from_u64(42));
    assert_eq!(a, b);
}

#[test]
fn shuffles_players() {
    let ps = players(16);
    let in_order: Vec<_> = ps.iter().map(|p| p.id).collect();
    // With one board of 16, allocation order is the shuffled order.
    let shuffled_differs = (0..10u64).any(|seed| {
        let boards = allocate_boards(&ps, 1, 16, &mut StdRng::seed_from_u64(seed));
        boards[0].players != in_order
    });
    assert!(shuffled_differs);
}
