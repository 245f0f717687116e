//! Board allocation: shuffle active players and deal them onto boards.

use crate::models::{Board, BoardId, Player};
use rand::seq::SliceRandom;
use rand::Rng;

/// Deal `active_players` onto boards 1..=`board_count`.
///
/// 1. Shuffle the players uniformly.
/// 2. Deal round-robin across the boards, skipping boards already at `max_group_size`.
/// 3. Drop boards that received nobody.
///
/// The caller must have checked `board_count * max_group_size >= active_players.len()`;
/// players that do not fit are left unplaced.
pub fn allocate_boards<R: Rng + ?Sized>(
    active_players: &[Player],
    board_count: u32,
    max_group_size: u32,
    rng: &mut R,
) -> Vec<Board> {
    let mut ids: Vec<_> = active_players.iter().map(|p| p.id).collect();
    ids.shuffle(rng);

    let mut boards: Vec<Board> = (1..=board_count as BoardId).map(Board::new).collect();
    if boards.is_empty() {
        return boards;
    }
    let max_group_size = max_group_size as usize;

    let mut next = 0;
    for id in ids {
        let start = next;
        // Find the next board with room, wrapping around once.
        while boards[next].players.len() >= max_group_size {
            next = (next + 1) % boards.len();
            if next == start {
                log::warn!("No board capacity left; player {} not placed", id);
                return finish(boards);
            }
        }
        boards[next].players.push(id);
        next = (next + 1) % boards.len();
    }

    finish(boards)
}

fn finish(mut boards: Vec<Board>) -> Vec<Board> {
    boards.retain(|b| !b.players.is_empty());
    boards
}
