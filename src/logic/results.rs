//! Final ranking and CSV export of results.

use crate::models::{Player, RankedResult};
use std::cmp::Reverse;

/// Rank all players: active before eliminated, then most lives; among eliminated players the
/// later elimination (round, then time) ranks higher.
pub fn rank_players(players: &[Player]) -> Vec<RankedResult> {
    let mut sorted: Vec<&Player> = players.iter().collect();
    sorted.sort_by_key(|p| {
        (
            p.eliminated,
            Reverse(p.lives),
            Reverse(p.elimination_round),
            Reverse(p.elimination_time),
        )
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| RankedResult {
            rank: i as u32 + 1,
            player_id: p.id,
            name: p.name.clone(),
            league_status: p.league_status.clone(),
            lives: p.lives,
            eliminated: p.eliminated,
            elimination_round: p.elimination_round,
            elimination_time: p.elimination_time,
        })
        .collect()
}

/// Write results as CSV with a header row.
pub fn write_results_csv<W: std::io::Write>(
    results: &[RankedResult],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in results {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}
