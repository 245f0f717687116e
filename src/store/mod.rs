//! Persistence contract the tournament engine expects from its host, plus an in-memory backend.

mod memory;

pub use memory::MemoryStore;

use crate::models::{
    ClubPlayer, Player, PlayerId, RankedResult, Registration, Round, TournamentId,
    TournamentInstance, TournamentSettings, TournamentStatus, TournamentSummary,
};
use chrono::{DateTime, Utc};

/// A storage call failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

/// Request/response storage used by the lifecycle controller. No retries are done by callers.
pub trait TournamentStore: Send + Sync {
    // Club roster.
    fn add_club_player(&self, player: ClubPlayer) -> Result<(), StoreError>;
    fn list_club_players(&self) -> Result<Vec<ClubPlayer>, StoreError>;

    // Registry for the organizer's next tournament.
    fn load_registered_players(&self, organizer: &str) -> Result<Vec<Registration>, StoreError>;
    /// Register roster players; already registered ids are left as they are.
    fn register_players(&self, organizer: &str, ids: &[PlayerId]) -> Result<(), StoreError>;
    fn clear_registered_players(&self, organizer: &str) -> Result<(), StoreError>;
    fn set_paid_status(&self, organizer: &str, id: PlayerId, paid: bool) -> Result<(), StoreError>;

    // Tournaments.
    fn create_tournament(
        &self,
        organizer: &str,
        settings: &TournamentSettings,
        players: &[Player],
        started_at: DateTime<Utc>,
    ) -> Result<TournamentId, StoreError>;
    /// Upsert keyed by (tournament, round number).
    fn save_round(&self, id: TournamentId, round: &Round) -> Result<(), StoreError>;
    fn update_players(&self, id: TournamentId, players: &[Player]) -> Result<(), StoreError>;
    fn set_tournament_status(
        &self,
        id: TournamentId,
        status: TournamentStatus,
        winner: Option<PlayerId>,
        total_rounds: Option<u32>,
    ) -> Result<(), StoreError>;
    fn get_active_tournament(
        &self,
        organizer: &str,
    ) -> Result<Option<TournamentInstance>, StoreError>;
    fn get_last_round(&self, id: TournamentId) -> Result<Option<Round>, StoreError>;
    fn get_players(&self, id: TournamentId) -> Result<Vec<Player>, StoreError>;
    fn save_results(
        &self,
        id: TournamentId,
        winner: Option<PlayerId>,
        total_rounds: u32,
        results: &[RankedResult],
    ) -> Result<(), StoreError>;

    // History.
    fn list_results(&self, organizer: &str) -> Result<Vec<TournamentSummary>, StoreError>;
    fn get_results(&self, id: TournamentId) -> Result<Option<Vec<RankedResult>>, StoreError>;
}
