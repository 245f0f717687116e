//! Data structures for the Kratzer tournament: players, boards, rounds, tournament state.

mod board;
mod player;
mod tournament;

pub use board::{Board, BoardId, Round};
pub use player::{ClubPlayer, LeagueStatus, Player, PlayerId, Registration};
pub use tournament::{
    OrganizerId, RankedResult, TournamentError, TournamentId, TournamentInstance,
    TournamentSettings, TournamentStatus, TournamentSummary, MAX_BOARDS, MAX_GROUP_SIZE,
    MAX_SUDDEN_DEATH_MINUTES, MIN_BOARDS, MIN_GROUP_SIZE, MIN_SUDDEN_DEATH_MINUTES,
};
