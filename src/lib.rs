//! Kratzer dart tournament web app: library with models, business logic and storage.

pub mod config;
pub mod logic;
pub mod models;
pub mod store;

pub use config::{LivesTable, ServerConfig};
pub use logic::{
    admit_players, allocate_boards, apply_life_loss, bulk_set_lives_by_league_status,
    calculate_prize_pool, count_active, edit_lives_manually, paid_count, rank_players, winner,
    write_results_csv, BoardOutcome, NewRoundOutcome, PrizeDistribution, PrizePlace, Resolution,
    RoundMachine, RoundPhase, TournamentController, TournamentSession,
};
pub use models::{
    Board, BoardId, ClubPlayer, LeagueStatus, OrganizerId, Player, PlayerId, RankedResult,
    Registration, Round, TournamentError, TournamentId, TournamentInstance, TournamentSettings,
    TournamentStatus, TournamentSummary,
};
pub use store::{MemoryStore, StoreError, TournamentStore};
