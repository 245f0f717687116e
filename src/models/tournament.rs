//! Tournament settings, the running instance aggregate, results, and errors.

use crate::models::player::{Player, PlayerId};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organizer identity (one running tournament each).
pub type OrganizerId = String;

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

pub const MIN_BOARDS: u32 = 1;
pub const MAX_BOARDS: u32 = 32;
pub const MIN_GROUP_SIZE: u32 = 2;
pub const MAX_GROUP_SIZE: u32 = 6;
pub const MIN_SUDDEN_DEATH_MINUTES: u32 = 1;
pub const MAX_SUDDEN_DEATH_MINUTES: u32 = 60;

/// Errors that can occur during tournament operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TournamentError {
    /// Round machine or tournament is not in a state that allows this action.
    InvalidState,
    /// A setting is outside its allowed range.
    InvalidSettings(String),
    /// Not enough board places for the active players.
    CapacityExceeded { capacity: usize, active: usize },
    /// Need at least 2 registered players to start.
    NotEnoughPlayersToStart,
    /// Player not found in the tournament.
    PlayerNotFound(PlayerId),
    /// A finished game needs at least one loser from the board.
    NoLosersSelected,
    /// This organizer already has a running tournament (resume or abandon it first).
    ActiveTournamentExists(TournamentId),
    /// Registration references a player that is not on the club roster.
    UnknownClubPlayer(PlayerId),
    /// Club player name is empty.
    EmptyPlayerName,
    /// A club player with this name already exists (names are unique, case-insensitive).
    DuplicatePlayerName,
    /// Storage call failed.
    Store(StoreError),
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentError::InvalidState => write!(f, "Invalid state for this action"),
            TournamentError::InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
            TournamentError::CapacityExceeded { capacity, active } => write!(
                f,
                "Not enough board places: {} places for {} active players",
                capacity, active
            ),
            TournamentError::NotEnoughPlayersToStart => {
                write!(f, "Need at least 2 registered players to start")
            }
            TournamentError::PlayerNotFound(_) => write!(f, "Player not found"),
            TournamentError::NoLosersSelected => write!(f, "Select at least one loser from the board"),
            TournamentError::ActiveTournamentExists(_) => {
                write!(f, "A tournament is already running; resume or abandon it")
            }
            TournamentError::UnknownClubPlayer(_) => write!(f, "Player is not on the club roster"),
            TournamentError::EmptyPlayerName => write!(f, "Player name must not be empty"),
            TournamentError::DuplicatePlayerName => write!(f, "A player with this name already exists"),
            TournamentError::Store(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for TournamentError {}

impl From<StoreError> for TournamentError {
    fn from(e: StoreError) -> Self {
        TournamentError::Store(e)
    }
}

/// Configuration for one tournament.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TournamentSettings {
    pub board_count: u32,
    pub max_group_size: u32,
    pub sudden_death: bool,
    pub sudden_death_minutes: u32,
    /// Queue spoken announcements for the front-end.
    pub speech_enabled: bool,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            board_count: 4,
            max_group_size: 4,
            sudden_death: false,
            sudden_death_minutes: 10,
            speech_enabled: false,
        }
    }
}

impl TournamentSettings {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), TournamentError> {
        if !(MIN_BOARDS..=MAX_BOARDS).contains(&self.board_count) {
            return Err(TournamentError::InvalidSettings(format!(
                "board count must be {}..={}",
                MIN_BOARDS, MAX_BOARDS
            )));
        }
        if !(MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&self.max_group_size) {
            return Err(TournamentError::InvalidSettings(format!(
                "max group size must be {}..={}",
                MIN_GROUP_SIZE, MAX_GROUP_SIZE
            )));
        }
        if !(MIN_SUDDEN_DEATH_MINUTES..=MAX_SUDDEN_DEATH_MINUTES).contains(&self.sudden_death_minutes)
        {
            return Err(TournamentError::InvalidSettings(format!(
                "sudden death time must be {}..={} minutes",
                MIN_SUDDEN_DEATH_MINUTES, MAX_SUDDEN_DEATH_MINUTES
            )));
        }
        Ok(())
    }

    /// Board places available per round.
    pub fn capacity(&self) -> usize {
        self.board_count as usize * self.max_group_size as usize
    }

    /// Capacity check for a round with `active` players.
    pub fn check_capacity(&self, active: usize) -> Result<(), TournamentError> {
        let capacity = self.capacity();
        if capacity < active {
            return Err(TournamentError::CapacityExceeded { capacity, active });
        }
        Ok(())
    }
}

/// Persisted lifecycle status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Running,
    Finished,
    Cancelled,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TournamentStatus::Running => "running",
            TournamentStatus::Finished => "finished",
            TournamentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Top-level tournament aggregate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TournamentInstance {
    pub id: TournamentId,
    pub organizer: OrganizerId,
    pub status: TournamentStatus,
    /// 0 until the first round is confirmed.
    pub current_round: u32,
    pub winner: Option<PlayerId>,
    pub settings: TournamentSettings,
    /// All players, eliminated ones included.
    pub players: Vec<Player>,
    pub started_at: DateTime<Utc>,
}

impl TournamentInstance {
    pub fn new(
        id: TournamentId,
        organizer: impl Into<OrganizerId>,
        settings: TournamentSettings,
        players: Vec<Player>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            organizer: organizer.into(),
            status: TournamentStatus::Running,
            current_round: 0,
            winner: None,
            settings,
            players,
            started_at,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    /// Display name, or "?" for an unknown id.
    pub fn player_name(&self, id: PlayerId) -> &str {
        self.player(id).map(|p| p.name.as_str()).unwrap_or("?")
    }

    pub fn is_running(&self) -> bool {
        self.status == TournamentStatus::Running
    }
}

/// One row of the permanent ranked result record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub rank: u32,
    pub player_id: PlayerId,
    pub name: String,
    pub league_status: String,
    pub lives: u32,
    pub eliminated: bool,
    pub elimination_round: Option<u32>,
    pub elimination_time: Option<DateTime<Utc>>,
}

/// History entry for a finished or cancelled tournament.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TournamentSummary {
    pub id: TournamentId,
    pub status: TournamentStatus,
    pub winner: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub total_rounds: u32,
    pub player_count: usize,
    pub started_at: DateTime<Utc>,
}
