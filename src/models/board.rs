//! Board (playing station) and Round (one allocation step) snapshots.

use crate::models::player::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Board number, stable per physical station (1..=board_count).
pub type BoardId = u32;

/// One playing station for the current round.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    /// Assigned players in allocation order.
    pub players: Vec<PlayerId>,
    /// None while idle.
    pub started_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn new(id: BoardId) -> Self {
        Self {
            id,
            players: Vec::new(),
            started_at: None,
        }
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }
}

/// Snapshot of one round: boards as allocated, plus which of them are already resolved.
///
/// Persisted before any board may start, and re-persisted on every board change so that a
/// reload sees started timestamps and resolved boards.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u32,
    pub boards: Vec<Board>,
    /// Boards finished, cancelled or timed out.
    pub resolved_boards: BTreeSet<BoardId>,
    pub created_at: DateTime<Utc>,
}

impl Round {
    pub fn new(number: u32, boards: Vec<Board>, created_at: DateTime<Utc>) -> Self {
        Self {
            number,
            boards,
            resolved_boards: BTreeSet::new(),
            created_at,
        }
    }

    /// Boards still in play.
    pub fn open_boards(&self) -> impl Iterator<Item = &Board> {
        self.boards
            .iter()
            .filter(|b| !self.resolved_boards.contains(&b.id))
    }

    pub fn open_board(&self, id: BoardId) -> Option<&Board> {
        self.open_boards().find(|b| b.id == id)
    }

    pub fn open_board_mut(&mut self, id: BoardId) -> Option<&mut Board> {
        if self.resolved_boards.contains(&id) {
            return None;
        }
        self.boards.iter_mut().find(|b| b.id == id)
    }

    pub fn is_complete(&self) -> bool {
        self.open_boards().next().is_none()
    }

    /// Total players allocated in this round.
    pub fn player_count(&self) -> usize {
        self.boards.iter().map(|b| b.players.len()).sum()
    }
}
