//! Registry: turning registrations into tournament players.

use crate::config::LivesTable;
use crate::models::{Player, Registration};

/// Admit every registered player with starting lives from the league-status table.
pub fn admit_players(registrations: &[Registration], lives_table: &LivesTable) -> Vec<Player> {
    registrations
        .iter()
        .map(|r| {
            Player::with_id(
                r.player.id,
                r.player.name.clone(),
                r.player.league_status.clone(),
                lives_table.lives_for(&r.player.league_status),
            )
        })
        .collect()
}

/// Registrations with the entry fee paid.
pub fn paid_count(registrations: &[Registration]) -> u32 {
    registrations.iter().filter(|r| r.paid).count() as u32
}
