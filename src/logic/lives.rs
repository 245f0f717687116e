//! Life and elimination tracking.

use crate::models::{Player, PlayerId, TournamentError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Take one life from every player in `losing_ids`; players reaching 0 are eliminated in
/// `current_round` at `now`. Returns the ids eliminated by this call.
pub fn apply_life_loss(
    players: &mut [Player],
    losing_ids: &HashSet<PlayerId>,
    current_round: u32,
    now: DateTime<Utc>,
) -> Vec<PlayerId> {
    players
        .iter_mut()
        .filter(|p| losing_ids.contains(&p.id))
        .filter_map(|p| p.lose_life(current_round, now).then_some(p.id))
        .collect()
}

/// Set an explicit life total. 0 eliminates; raising an eliminated player above 0 revives them.
/// This is the only way an elimination is reversed.
pub fn edit_lives_manually(
    players: &mut [Player],
    player_id: PlayerId,
    new_lives: u32,
    current_round: u32,
    now: DateTime<Utc>,
) -> Result<(), TournamentError> {
    let p = players
        .iter_mut()
        .find(|p| p.id == player_id)
        .ok_or(TournamentError::PlayerNotFound(player_id))?;
    p.set_lives(new_lives, current_round, now);
    Ok(())
}

/// Overwrite lives of every non-eliminated player whose league status is a key of
/// `status_to_lives` (case-insensitive). Eliminated players stay frozen. Returns how many
/// players were changed.
pub fn bulk_set_lives_by_league_status(
    players: &mut [Player],
    status_to_lives: &HashMap<String, u32>,
    current_round: u32,
    now: DateTime<Utc>,
) -> usize {
    let mut changed = 0;
    for p in players.iter_mut().filter(|p| p.is_active()) {
        let lives = status_to_lives
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(&p.league_status))
            .map(|(_, &l)| l);
        if let Some(lives) = lives {
            p.set_lives(lives, current_round, now);
            changed += 1;
        }
    }
    changed
}

/// Players not yet eliminated.
pub fn count_active(players: &[Player]) -> usize {
    players.iter().filter(|p| p.is_active()).count()
}

/// The sole remaining player, if exactly one is left.
pub fn winner(players: &[Player]) -> Option<PlayerId> {
    let mut active = players.iter().filter(|p| p.is_active());
    match (active.next(), active.next()) {
        (Some(p), None) => Some(p.id),
        _ => None,
    }
}
