//! In-memory `TournamentStore`: lock-guarded maps, lost on restart.

use super::{StoreError, TournamentStore};
use crate::models::{
    ClubPlayer, OrganizerId, Player, PlayerId, RankedResult, Registration, Round, TournamentId,
    TournamentInstance, TournamentSettings, TournamentStatus, TournamentSummary,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

struct StoredTournament {
    instance: TournamentInstance,
    rounds: BTreeMap<u32, Round>,
    results: Option<Vec<RankedResult>>,
}

#[derive(Default)]
struct Inner {
    club_players: Vec<ClubPlayer>,
    registries: HashMap<OrganizerId, Vec<Registration>>,
    tournaments: HashMap<TournamentId, StoredTournament>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    /// When set, every write fails (simulates an unreachable backend).
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError("lock error".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("backend unavailable".to_string()));
        }
        self.inner
            .write()
            .map_err(|_| StoreError("lock error".to_string()))
    }
}

fn not_found(id: TournamentId) -> StoreError {
    StoreError(format!("tournament {} not found", id))
}

impl TournamentStore for MemoryStore {
    fn add_club_player(&self, player: ClubPlayer) -> Result<(), StoreError> {
        self.write()?.club_players.push(player);
        Ok(())
    }

    fn list_club_players(&self) -> Result<Vec<ClubPlayer>, StoreError> {
        let mut players = self.read()?.club_players.clone();
        players.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(players)
    }

    fn load_registered_players(&self, organizer: &str) -> Result<Vec<Registration>, StoreError> {
        Ok(self
            .read()?
            .registries
            .get(organizer)
            .cloned()
            .unwrap_or_default())
    }

    fn register_players(&self, organizer: &str, ids: &[PlayerId]) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let mut new_entries = Vec::new();
        for &id in ids {
            let player = g
                .club_players
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| StoreError(format!("club player {} not found", id)))?;
            new_entries.push(player);
        }
        let registry = g.registries.entry(organizer.to_string()).or_default();
        for player in new_entries {
            if !registry.iter().any(|r| r.player.id == player.id) {
                registry.push(Registration {
                    player,
                    paid: false,
                });
            }
        }
        Ok(())
    }

    fn clear_registered_players(&self, organizer: &str) -> Result<(), StoreError> {
        self.write()?.registries.remove(organizer);
        Ok(())
    }

    fn set_paid_status(&self, organizer: &str, id: PlayerId, paid: bool) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let registration = g
            .registries
            .get_mut(organizer)
            .and_then(|r| r.iter_mut().find(|r| r.player.id == id))
            .ok_or_else(|| StoreError(format!("player {} is not registered", id)))?;
        registration.paid = paid;
        Ok(())
    }

    fn create_tournament(
        &self,
        organizer: &str,
        settings: &TournamentSettings,
        players: &[Player],
        started_at: DateTime<Utc>,
    ) -> Result<TournamentId, StoreError> {
        let id = Uuid::new_v4();
        let instance =
            TournamentInstance::new(id, organizer, settings.clone(), players.to_vec(), started_at);
        self.write()?.tournaments.insert(
            id,
            StoredTournament {
                instance,
                rounds: BTreeMap::new(),
                results: None,
            },
        );
        Ok(id)
    }

    fn save_round(&self, id: TournamentId, round: &Round) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let t = g.tournaments.get_mut(&id).ok_or_else(|| not_found(id))?;
        t.rounds.insert(round.number, round.clone());
        t.instance.current_round = t.instance.current_round.max(round.number);
        Ok(())
    }

    fn update_players(&self, id: TournamentId, players: &[Player]) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let t = g.tournaments.get_mut(&id).ok_or_else(|| not_found(id))?;
        t.instance.players = players.to_vec();
        Ok(())
    }

    fn set_tournament_status(
        &self,
        id: TournamentId,
        status: TournamentStatus,
        winner: Option<PlayerId>,
        total_rounds: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let t = g.tournaments.get_mut(&id).ok_or_else(|| not_found(id))?;
        t.instance.status = status;
        if winner.is_some() {
            t.instance.winner = winner;
        }
        if let Some(rounds) = total_rounds {
            t.instance.current_round = rounds;
        }
        Ok(())
    }

    fn get_active_tournament(
        &self,
        organizer: &str,
    ) -> Result<Option<TournamentInstance>, StoreError> {
        Ok(self
            .read()?
            .tournaments
            .values()
            .map(|t| &t.instance)
            .find(|i| i.organizer == organizer && i.status == TournamentStatus::Running)
            .cloned())
    }

    fn get_last_round(&self, id: TournamentId) -> Result<Option<Round>, StoreError> {
        let g = self.read()?;
        let t = g.tournaments.get(&id).ok_or_else(|| not_found(id))?;
        Ok(t.rounds.values().next_back().cloned())
    }

    fn get_players(&self, id: TournamentId) -> Result<Vec<Player>, StoreError> {
        let g = self.read()?;
        let t = g.tournaments.get(&id).ok_or_else(|| not_found(id))?;
        Ok(t.instance.players.clone())
    }

    fn save_results(
        &self,
        id: TournamentId,
        winner: Option<PlayerId>,
        total_rounds: u32,
        results: &[RankedResult],
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let t = g.tournaments.get_mut(&id).ok_or_else(|| not_found(id))?;
        t.instance.winner = winner;
        t.instance.current_round = total_rounds;
        t.results = Some(results.to_vec());
        Ok(())
    }

    fn list_results(&self, organizer: &str) -> Result<Vec<TournamentSummary>, StoreError> {
        let g = self.read()?;
        let mut summaries: Vec<TournamentSummary> = g
            .tournaments
            .values()
            .map(|t| &t.instance)
            .filter(|i| i.organizer == organizer && i.status != TournamentStatus::Running)
            .map(|i| TournamentSummary {
                id: i.id,
                status: i.status,
                winner: i.winner,
                winner_name: i.winner.and_then(|w| i.player(w)).map(|p| p.name.clone()),
                total_rounds: i.current_round,
                player_count: i.players.len(),
                started_at: i.started_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }

    fn get_results(&self, id: TournamentId) -> Result<Option<Vec<RankedResult>>, StoreError> {
        let g = self.read()?;
        let t = g.tournaments.get(&id).ok_or_else(|| not_found(id))?;
        Ok(t.results.clone())
    }
}
