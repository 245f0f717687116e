//! Tournament lifecycle: start, recover, persist, complete, cancel.
//!
//! Round creation is persisted before it is committed in memory, so a storage failure leaves
//! the round proposed and nothing else changed. Every other transition is applied in memory
//! first and then persisted; when that write fails the session is flagged `pending_sync` and
//! the next operation re-pushes the full state before doing anything else.

use crate::config::LivesTable;
use crate::logic::lives::count_active;
use crate::logic::prize_pool::{calculate_prize_pool, PrizeDistribution};
use crate::logic::registry::{admit_players, paid_count};
use crate::logic::results::rank_players;
use crate::logic::rounds::{BoardOutcome, NewRoundOutcome, Resolution, RoundMachine};
use crate::models::{
    BoardId, ClubPlayer, PlayerId, RankedResult, Registration, Round, TournamentError,
    TournamentId, TournamentInstance, TournamentSettings, TournamentStatus,
};
use crate::store::{StoreError, TournamentStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// A loaded tournament: the instance aggregate plus its round machine.
#[derive(Clone, Debug, Serialize)]
pub struct TournamentSession {
    pub instance: TournamentInstance,
    pub rounds: RoundMachine,
    /// Last write to storage failed; state will be re-pushed on the next operation.
    pub pending_sync: bool,
    #[serde(skip)]
    announcements: Vec<String>,
}

impl TournamentSession {
    pub fn new(instance: TournamentInstance, rounds: RoundMachine) -> Self {
        Self {
            instance,
            rounds,
            pending_sync: false,
            announcements: Vec::new(),
        }
    }

    /// Take all queued announcement lines.
    pub fn drain_announcements(&mut self) -> Vec<String> {
        std::mem::take(&mut self.announcements)
    }

    /// Nothing would be lost by dropping this session from memory: storage is up to date and
    /// every announcement was delivered.
    pub fn can_unload(&self) -> bool {
        !self.pending_sync && self.announcements.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.rounds.phase().is_terminal()
    }

    fn announce(&mut self, line: String) {
        if self.instance.settings.speech_enabled {
            self.announcements.push(line);
        }
    }

    fn announce_round(&mut self, round: &Round) {
        let lines: Vec<String> = round
            .boards
            .iter()
            .map(|b| {
                let names: Vec<&str> = b
                    .players
                    .iter()
                    .map(|&id| self.instance.player_name(id))
                    .collect();
                format!("Round {}, board {}: {}", round.number, b.id, names.join(", "))
            })
            .collect();
        for line in lines {
            self.announce(line);
        }
    }

    fn announce_outcome(&mut self, outcome: &BoardOutcome) {
        if let BoardOutcome::Resolved {
            board,
            resolution,
            eliminated,
            ..
        } = outcome
        {
            if *resolution == Resolution::SuddenDeath {
                self.announce(format!("Board {}: time is up, everyone loses a life", board));
            }
            for &id in eliminated {
                let line = format!("{} is out", self.instance.player_name(id));
                self.announce(line);
            }
        }
        self.announce_winner();
    }

    fn announce_winner(&mut self) {
        if self.instance.status != TournamentStatus::Finished {
            return;
        }
        if let Some(w) = self.instance.winner {
            let line = format!("{} wins the tournament", self.instance.player_name(w));
            self.announce(line);
        }
    }
}

/// Drives tournaments against a `TournamentStore`.
pub struct TournamentController<S> {
    store: S,
    lives_table: LivesTable,
}

impl<S: TournamentStore> TournamentController<S> {
    pub fn new(store: S, lives_table: LivesTable) -> Self {
        Self { store, lives_table }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lives_table(&self) -> &LivesTable {
        &self.lives_table
    }

    // ---- Club roster and registry ----

    /// Add a player to the club roster. Names are unique (case-insensitive).
    pub fn add_club_player(
        &self,
        name: &str,
        league_status: &str,
    ) -> Result<ClubPlayer, TournamentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TournamentError::EmptyPlayerName);
        }
        if self
            .store
            .list_club_players()?
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Err(TournamentError::DuplicatePlayerName);
        }
        let player = ClubPlayer::new(name, league_status.trim());
        self.store.add_club_player(player.clone())?;
        Ok(player)
    }

    pub fn club_players(&self) -> Result<Vec<ClubPlayer>, TournamentError> {
        Ok(self.store.list_club_players()?)
    }

    pub fn registry(&self, organizer: &str) -> Result<Vec<Registration>, TournamentError> {
        Ok(self.store.load_registered_players(organizer)?)
    }

    /// Register roster players for the organizer's next tournament.
    pub fn register_players(
        &self,
        organizer: &str,
        ids: &[PlayerId],
    ) -> Result<Vec<Registration>, TournamentError> {
        let roster = self.store.list_club_players()?;
        if let Some(&unknown) = ids.iter().find(|id| !roster.iter().any(|p| p.id == **id)) {
            return Err(TournamentError::UnknownClubPlayer(unknown));
        }
        self.store.register_players(organizer, ids)?;
        self.registry(organizer)
    }

    pub fn clear_registry(&self, organizer: &str) -> Result<(), TournamentError> {
        Ok(self.store.clear_registered_players(organizer)?)
    }

    pub fn set_paid(
        &self,
        organizer: &str,
        id: PlayerId,
        paid: bool,
    ) -> Result<Vec<Registration>, TournamentError> {
        if !self.registry(organizer)?.iter().any(|r| r.player.id == id) {
            return Err(TournamentError::PlayerNotFound(id));
        }
        self.store.set_paid_status(organizer, id, paid)?;
        self.registry(organizer)
    }

    /// Prize pool from the registry's paid count, unless an explicit count is given.
    pub fn prize_pool(
        &self,
        organizer: &str,
        entry_fee: f64,
        paid_player_count: Option<u32>,
        percentages: &[f64],
    ) -> Result<PrizeDistribution, TournamentError> {
        let paid = match paid_player_count {
            Some(n) => n,
            None => paid_count(&self.registry(organizer)?),
        };
        Ok(calculate_prize_pool(entry_fee, paid, percentages))
    }

    // ---- Lifecycle ----

    /// Start a tournament from the organizer's registry and propose round 1.
    pub fn start(
        &self,
        organizer: &str,
        settings: TournamentSettings,
        now: DateTime<Utc>,
    ) -> Result<TournamentSession, TournamentError> {
        if let Some(active) = self.store.get_active_tournament(organizer)? {
            return Err(TournamentError::ActiveTournamentExists(active.id));
        }
        settings.validate()?;
        let registrations = self.store.load_registered_players(organizer)?;
        let players = admit_players(&registrations, &self.lives_table);
        let active = count_active(&players);
        if active < 2 {
            return Err(TournamentError::NotEnoughPlayersToStart);
        }
        settings.check_capacity(active)?;

        let id = self
            .store
            .create_tournament(organizer, &settings, &players, now)?;
        let instance = TournamentInstance::new(id, organizer, settings, players, now);
        log::info!(
            "Started tournament {} for {} with {} players",
            id,
            organizer,
            instance.players.len()
        );
        let mut session = TournamentSession::new(instance, RoundMachine::new());
        self.propose_round(&mut session)?;
        Ok(session)
    }

    /// Reload the organizer's running tournament, if any. Countdowns already past their
    /// deadline fire immediately.
    pub fn recover_active(
        &self,
        organizer: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TournamentSession>, TournamentError> {
        let Some(mut instance) = self.store.get_active_tournament(organizer)? else {
            return Ok(None);
        };
        instance.players = self.store.get_players(instance.id)?;
        let round = self.store.get_last_round(instance.id)?;
        if let Some(r) = &round {
            instance.current_round = instance.current_round.max(r.number);
        }
        let rounds = RoundMachine::restore(round, &instance);
        let mut session = TournamentSession::new(instance, rounds);
        log::info!(
            "Recovered tournament {} at round {} ({:?}, {} timers armed)",
            session.instance.id,
            session.instance.current_round,
            session.rounds.phase(),
            session.rounds.armed_timers()
        );
        let fired = self.tick(&mut session, now)?;
        if !fired.is_empty() {
            log::info!(
                "Tournament {}: {} sudden-death timeout(s) expired while unloaded",
                session.instance.id,
                fired.len()
            );
        }
        Ok(Some(session))
    }

    /// Mark the organizer's running tournament cancelled without loading it (to start anew).
    /// The registry is kept.
    pub fn abandon_active(&self, organizer: &str) -> Result<Option<TournamentId>, TournamentError> {
        let Some(active) = self.store.get_active_tournament(organizer)? else {
            return Ok(None);
        };
        self.store.set_tournament_status(
            active.id,
            TournamentStatus::Cancelled,
            None,
            Some(active.current_round),
        )?;
        log::info!("Abandoned tournament {} at round {}", active.id, active.current_round);
        Ok(Some(active.id))
    }

    /// Ask for the next round (or finish when one player is left).
    pub fn propose_round(
        &self,
        session: &mut TournamentSession,
    ) -> Result<NewRoundOutcome, TournamentError> {
        self.reconcile(session)?;
        let outcome = session.rounds.start_new_round(&mut session.instance)?;
        if let NewRoundOutcome::Finished { .. } = outcome {
            session.announce_winner();
            self.sync(session)?;
        }
        Ok(outcome)
    }

    /// Allocate, persist, then activate the proposed round.
    pub fn confirm_round<R: Rng + ?Sized>(
        &self,
        session: &mut TournamentSession,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Round, TournamentError> {
        self.reconcile(session)?;
        let round = session.rounds.plan_round(&session.instance, rng, now)?;
        self.store.save_round(session.instance.id, &round)?;
        session
            .rounds
            .commit_round(&mut session.instance, round.clone())?;
        log::info!(
            "Tournament {}: round {} with {} players on {} boards",
            session.instance.id,
            round.number,
            round.player_count(),
            round.boards.len()
        );
        session.announce_round(&round);
        Ok(round)
    }

    pub fn start_game(
        &self,
        session: &mut TournamentSession,
        board: BoardId,
        now: DateTime<Utc>,
    ) -> Result<BoardOutcome, TournamentError> {
        self.reconcile(session)?;
        let outcome = session.rounds.start_game(&session.instance, board, now);
        self.after_board_action(session, &outcome)?;
        Ok(outcome)
    }

    pub fn finish_game(
        &self,
        session: &mut TournamentSession,
        board: BoardId,
        losers: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<BoardOutcome, TournamentError> {
        self.reconcile(session)?;
        let outcome = session
            .rounds
            .finish_game(&mut session.instance, board, losers, now)?;
        self.after_board_action(session, &outcome)?;
        Ok(outcome)
    }

    pub fn cancel_game(
        &self,
        session: &mut TournamentSession,
        board: BoardId,
        now: DateTime<Utc>,
    ) -> Result<BoardOutcome, TournamentError> {
        self.reconcile(session)?;
        let outcome = session.rounds.cancel_game(&mut session.instance, board, now);
        self.after_board_action(session, &outcome)?;
        Ok(outcome)
    }

    /// Fire due sudden-death countdowns.
    pub fn tick(
        &self,
        session: &mut TournamentSession,
        now: DateTime<Utc>,
    ) -> Result<Vec<BoardOutcome>, TournamentError> {
        self.reconcile(session)?;
        let outcomes = session.rounds.tick(&mut session.instance, now);
        if outcomes.is_empty() {
            return Ok(outcomes);
        }
        for outcome in &outcomes {
            log::info!("Tournament {}: sudden death {:?}", session.instance.id, outcome);
            session.announce_outcome(outcome);
        }
        self.sync(session)?;
        Ok(outcomes)
    }

    pub fn edit_lives(
        &self,
        session: &mut TournamentSession,
        player_id: PlayerId,
        lives: u32,
        now: DateTime<Utc>,
    ) -> Result<(), TournamentError> {
        self.reconcile(session)?;
        session
            .rounds
            .edit_lives(&mut session.instance, player_id, lives, now)?;
        session.announce_winner();
        self.sync(session)
    }

    pub fn bulk_set_lives(
        &self,
        session: &mut TournamentSession,
        status_to_lives: &HashMap<String, u32>,
        now: DateTime<Utc>,
    ) -> Result<usize, TournamentError> {
        self.reconcile(session)?;
        let changed = session
            .rounds
            .bulk_set_lives(&mut session.instance, status_to_lives, now)?;
        session.announce_winner();
        self.sync(session)?;
        Ok(changed)
    }

    /// Persist the final record of a finished tournament and return the ranking.
    pub fn complete(
        &self,
        session: &mut TournamentSession,
    ) -> Result<Vec<RankedResult>, TournamentError> {
        if session.instance.status != TournamentStatus::Finished {
            return Err(TournamentError::InvalidState);
        }
        self.sync(session)?;
        Ok(rank_players(&session.instance.players))
    }

    /// Abort the tournament; round records are kept.
    pub fn cancel(&self, session: &mut TournamentSession) -> Result<(), TournamentError> {
        session.rounds.cancel_tournament(&mut session.instance)?;
        log::info!(
            "Cancelled tournament {} at round {}",
            session.instance.id,
            session.instance.current_round
        );
        self.sync(session)
    }

    fn after_board_action(
        &self,
        session: &mut TournamentSession,
        outcome: &BoardOutcome,
    ) -> Result<(), TournamentError> {
        if outcome.is_ignored() {
            log::info!(
                "Tournament {}: ignoring action on {:?}",
                session.instance.id,
                outcome
            );
            return Ok(());
        }
        session.announce_outcome(outcome);
        self.sync(session)
    }

    fn reconcile(&self, session: &mut TournamentSession) -> Result<(), TournamentError> {
        if session.pending_sync {
            log::info!("Tournament {}: re-pushing unsaved state", session.instance.id);
            self.sync(session)?;
        }
        Ok(())
    }

    /// Push players, the current round and (for terminal states) the final status.
    fn sync(&self, session: &mut TournamentSession) -> Result<(), TournamentError> {
        let result = self.push(session);
        session.pending_sync = result.is_err();
        if let Err(e) = &result {
            log::warn!(
                "Tournament {}: failed to persist state: {}",
                session.instance.id,
                e
            );
        }
        result.map_err(TournamentError::from)
    }

    fn push(&self, session: &TournamentSession) -> Result<(), StoreError> {
        let t = &session.instance;
        self.store.update_players(t.id, &t.players)?;
        if let Some(round) = session.rounds.current_round() {
            self.store.save_round(t.id, round)?;
        }
        match t.status {
            TournamentStatus::Running => {}
            TournamentStatus::Finished => {
                let results = rank_players(&t.players);
                self.store
                    .save_results(t.id, t.winner, t.current_round, &results)?;
                self.store.set_tournament_status(
                    t.id,
                    TournamentStatus::Finished,
                    t.winner,
                    Some(t.current_round),
                )?;
                self.store.clear_registered_players(&t.organizer)?;
            }
            TournamentStatus::Cancelled => {
                self.store.set_tournament_status(
                    t.id,
                    TournamentStatus::Cancelled,
                    None,
                    Some(t.current_round),
                )?;
                self.store.clear_registered_players(&t.organizer)?;
            }
        }
        Ok(())
    }
}
