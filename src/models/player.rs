//! Player (tournament participant) and the club roster / registry records it is admitted from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player (club roster id, reused inside tournaments).
pub type PlayerId = Uuid;

/// League tier code (e.g. "A", "B"); decides the starting life count.
pub type LeagueStatus = String;

/// A player in a running tournament.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub league_status: LeagueStatus,
    pub lives: u32,
    /// Always equal to `lives == 0`.
    pub eliminated: bool,
    pub elimination_round: Option<u32>,
    pub elimination_time: Option<DateTime<Utc>>,
}

impl Player {
    /// Create an active player with the given starting lives.
    pub fn new(name: impl Into<String>, league_status: impl Into<String>, lives: u32) -> Self {
        Self::with_id(Uuid::new_v4(), name, league_status, lives)
    }

    pub fn with_id(
        id: PlayerId,
        name: impl Into<String>,
        league_status: impl Into<String>,
        lives: u32,
    ) -> Self {
        // Admitted with zero lives: eliminated before round 1.
        Self {
            id,
            name: name.into(),
            league_status: league_status.into(),
            lives,
            eliminated: lives == 0,
            elimination_round: (lives == 0).then_some(0),
            elimination_time: None,
        }
    }

    /// Not eliminated.
    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    /// Take one life. Returns true if this eliminated the player.
    pub fn lose_life(&mut self, round: u32, now: DateTime<Utc>) -> bool {
        if self.eliminated || self.lives == 0 {
            return false;
        }
        self.lives -= 1;
        if self.lives == 0 {
            self.eliminate(round, now);
            return true;
        }
        false
    }

    /// Overwrite the life total, keeping the elimination flag and metadata in step.
    pub fn set_lives(&mut self, lives: u32, round: u32, now: DateTime<Utc>) {
        self.lives = lives;
        if lives == 0 {
            if !self.eliminated {
                self.eliminate(round, now);
            }
        } else if self.eliminated {
            self.revive();
        }
    }

    fn eliminate(&mut self, round: u32, now: DateTime<Utc>) {
        self.lives = 0;
        self.eliminated = true;
        self.elimination_round = Some(round);
        self.elimination_time = Some(now);
    }

    fn revive(&mut self) {
        self.eliminated = false;
        self.elimination_round = None;
        self.elimination_time = None;
    }
}

/// A player known to the club.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClubPlayer {
    pub id: PlayerId,
    pub name: String,
    pub league_status: LeagueStatus,
}

impl ClubPlayer {
    pub fn new(name: impl Into<String>, league_status: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            league_status: league_status.into(),
        }
    }
}

/// A club player registered for the next tournament.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub player: ClubPlayer,
    /// Entry fee paid (counts toward the prize pool).
    pub paid: bool,
}
