//! Tournament business logic: allocation, lives, rounds, lifecycle, prizes, results.

mod allocation;
mod lifecycle;
mod lives;
mod prize_pool;
mod registry;
mod results;
mod rounds;

pub use allocation::allocate_boards;
pub use lifecycle::{TournamentController, TournamentSession};
pub use lives::{
    apply_life_loss, bulk_set_lives_by_league_status, count_active, edit_lives_manually, winner,
};
pub use prize_pool::{calculate_prize_pool, PrizeDistribution, PrizePlace};
pub use registry::{admit_players, paid_count};
pub use results::{rank_players, write_results_csv};
pub use rounds::{BoardOutcome, NewRoundOutcome, Resolution, RoundMachine, RoundPhase};
