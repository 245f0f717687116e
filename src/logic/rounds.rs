//! Round and sudden-death timer state machine.
//!
//! `Idle -> RoundProposed -> RoundActive -> RoundComplete -> RoundProposed ...` until one
//! player is left (`TournamentFinished`) or the operator aborts (`TournamentCancelled`).
//!
//! Board actions that reference a board no longer in play are ignored rather than rejected,
//! so a sudden-death timeout racing a reported result resolves the board exactly once.

use crate::logic::allocation::allocate_boards;
use crate::logic::lives::{
    apply_life_loss, bulk_set_lives_by_league_status, count_active, edit_lives_manually, winner,
};
use crate::models::{
    Board, BoardId, Player, PlayerId, Round, TournamentError, TournamentInstance,
    TournamentStatus,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Where the round machine currently is.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// No round generated yet.
    #[default]
    Idle,
    /// Capacity checked; waiting for the operator to confirm the next round.
    RoundProposed,
    /// Boards assigned; games may be running.
    RoundActive,
    /// Every board of the round resolved.
    RoundComplete,
    TournamentFinished,
    TournamentCancelled,
}

impl RoundPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RoundPhase::TournamentFinished | RoundPhase::TournamentCancelled
        )
    }
}

/// Result of asking for a new round.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NewRoundOutcome {
    /// Round `round` is ready to be confirmed.
    Proposed { round: u32 },
    /// Only one player is left; no round was created.
    Finished { winner: PlayerId },
    /// Everybody is eliminated; needs a manual life edit or a cancel.
    NoActivePlayers,
}

/// How a board left the round.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Finished,
    Cancelled,
    SuddenDeath,
}

/// Result of a board action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BoardOutcome {
    /// Board not in play (already resolved, already started, or unknown); nothing changed.
    Ignored { board: BoardId },
    Started {
        board: BoardId,
        /// Sudden-death deadline, if armed.
        deadline: Option<DateTime<Utc>>,
    },
    Resolved {
        board: BoardId,
        resolution: Resolution,
        losers: Vec<PlayerId>,
        eliminated: Vec<PlayerId>,
        /// Phase after the board was removed.
        phase: RoundPhase,
    },
}

impl BoardOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, BoardOutcome::Ignored { .. })
    }
}

/// Round lifecycle plus the board → countdown deadline table.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RoundMachine {
    phase: RoundPhase,
    round: Option<Round>,
    /// At most one armed countdown per open board.
    timers: HashMap<BoardId, DateTime<Utc>>,
}

impl RoundMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the machine for a reloaded tournament from its last round snapshot.
    ///
    /// Started, unresolved boards get their countdown re-armed at `started_at + limit`; deadlines
    /// already in the past fire on the next `tick`.
    pub fn restore(round: Option<Round>, instance: &TournamentInstance) -> Self {
        let mut machine = Self {
            phase: RoundPhase::Idle,
            round,
            timers: HashMap::new(),
        };
        machine.phase = match instance.status {
            TournamentStatus::Finished => RoundPhase::TournamentFinished,
            TournamentStatus::Cancelled => RoundPhase::TournamentCancelled,
            TournamentStatus::Running => match &machine.round {
                Some(r) if !r.is_complete() => RoundPhase::RoundActive,
                Some(_) => RoundPhase::RoundComplete,
                None => RoundPhase::Idle,
            },
        };
        if machine.phase == RoundPhase::RoundActive && instance.settings.sudden_death {
            let limit = Duration::minutes(i64::from(instance.settings.sudden_death_minutes));
            if let Some(round) = &machine.round {
                for board in round.open_boards() {
                    if let Some(started) = board.started_at {
                        machine.timers.insert(board.id, started + limit);
                    }
                }
            }
        }
        machine
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Snapshot of the current (or last) round.
    pub fn current_round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Boards still in play in the active round.
    pub fn open_boards(&self) -> Vec<&Board> {
        match (&self.round, self.phase) {
            (Some(r), RoundPhase::RoundActive) => r.open_boards().collect(),
            _ => Vec::new(),
        }
    }

    pub fn deadline(&self, board: BoardId) -> Option<DateTime<Utc>> {
        self.timers.get(&board).copied()
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    /// `Idle`/`RoundComplete` → `RoundProposed`, or straight to `TournamentFinished` when a
    /// single player is left. A capacity shortfall leaves the phase unchanged.
    pub fn start_new_round(
        &mut self,
        instance: &mut TournamentInstance,
    ) -> Result<NewRoundOutcome, TournamentError> {
        if !matches!(self.phase, RoundPhase::Idle | RoundPhase::RoundComplete) {
            return Err(TournamentError::InvalidState);
        }
        if let Some(w) = winner(&instance.players) {
            self.finish(instance, w);
            return Ok(NewRoundOutcome::Finished { winner: w });
        }
        let active = count_active(&instance.players);
        if active == 0 {
            log::info!(
                "Tournament {}: no active players left, no winner",
                instance.id
            );
            return Ok(NewRoundOutcome::NoActivePlayers);
        }
        instance.settings.check_capacity(active)?;
        self.phase = RoundPhase::RoundProposed;
        Ok(NewRoundOutcome::Proposed {
            round: instance.current_round + 1,
        })
    }

    /// Allocate boards for the proposed round without committing it (so it can be persisted
    /// first).
    pub fn plan_round<R: Rng + ?Sized>(
        &self,
        instance: &TournamentInstance,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Round, TournamentError> {
        if self.phase != RoundPhase::RoundProposed {
            return Err(TournamentError::InvalidState);
        }
        let active: Vec<Player> = instance.active_players().cloned().collect();
        if active.len() < 2 {
            return Err(TournamentError::InvalidState);
        }
        instance.settings.check_capacity(active.len())?;
        let boards = allocate_boards(
            &active,
            instance.settings.board_count,
            instance.settings.max_group_size,
            rng,
        );
        Ok(Round::new(instance.current_round + 1, boards, now))
    }

    /// `RoundProposed` → `RoundActive` with a planned round.
    pub fn commit_round(
        &mut self,
        instance: &mut TournamentInstance,
        round: Round,
    ) -> Result<(), TournamentError> {
        if self.phase != RoundPhase::RoundProposed || round.number != instance.current_round + 1 {
            return Err(TournamentError::InvalidState);
        }
        instance.current_round = round.number;
        self.round = Some(round);
        self.timers.clear();
        self.phase = RoundPhase::RoundActive;
        Ok(())
    }

    /// Mark a board's game as started and arm its sudden-death countdown.
    pub fn start_game(
        &mut self,
        instance: &TournamentInstance,
        board: BoardId,
        now: DateTime<Utc>,
    ) -> BoardOutcome {
        if self.phase != RoundPhase::RoundActive {
            return BoardOutcome::Ignored { board };
        }
        let Some(b) = self.round.as_mut().and_then(|r| r.open_board_mut(board)) else {
            return BoardOutcome::Ignored { board };
        };
        if b.started_at.is_some() {
            return BoardOutcome::Ignored { board };
        }
        b.started_at = Some(now);
        let deadline = instance.settings.sudden_death.then(|| {
            now + Duration::minutes(i64::from(instance.settings.sudden_death_minutes))
        });
        if let Some(d) = deadline {
            self.timers.insert(board, d);
        }
        BoardOutcome::Started { board, deadline }
    }

    /// Normal result: each named loser on the board loses one life.
    pub fn finish_game(
        &mut self,
        instance: &mut TournamentInstance,
        board: BoardId,
        losers: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<BoardOutcome, TournamentError> {
        let Some(b) = self.open_board(board) else {
            return Ok(BoardOutcome::Ignored { board });
        };
        let losing: HashSet<PlayerId> = losers.iter().copied().filter(|id| b.contains(*id)).collect();
        if losing.is_empty() {
            return Err(TournamentError::NoLosersSelected);
        }
        Ok(self.resolve(instance, board, Resolution::Finished, losing, now))
    }

    /// Operator abort: remove the board, nobody loses a life.
    pub fn cancel_game(
        &mut self,
        instance: &mut TournamentInstance,
        board: BoardId,
        now: DateTime<Utc>,
    ) -> BoardOutcome {
        if self.open_board(board).is_none() {
            return BoardOutcome::Ignored { board };
        }
        self.resolve(instance, board, Resolution::Cancelled, HashSet::new(), now)
    }

    /// Countdown expired: every player on the board loses one life.
    pub fn sudden_death_timeout(
        &mut self,
        instance: &mut TournamentInstance,
        board: BoardId,
        now: DateTime<Utc>,
    ) -> BoardOutcome {
        self.timers.remove(&board);
        if !instance.settings.sudden_death {
            return BoardOutcome::Ignored { board };
        }
        let Some(b) = self.open_board(board) else {
            return BoardOutcome::Ignored { board };
        };
        if b.started_at.is_none() {
            return BoardOutcome::Ignored { board };
        }
        let losing: HashSet<PlayerId> = b.players.iter().copied().collect();
        self.resolve(instance, board, Resolution::SuddenDeath, losing, now)
    }

    /// Fire every countdown whose deadline is at or before `now`, earliest first.
    pub fn tick(&mut self, instance: &mut TournamentInstance, now: DateTime<Utc>) -> Vec<BoardOutcome> {
        let mut due: Vec<(DateTime<Utc>, BoardId)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(board, deadline)| (*deadline, *board))
            .collect();
        due.sort();
        due.into_iter()
            .map(|(_, board)| self.sudden_death_timeout(instance, board, now))
            .filter(|o| !o.is_ignored())
            .collect()
    }

    /// Abort the tournament from any non-terminal phase.
    pub fn cancel_tournament(
        &mut self,
        instance: &mut TournamentInstance,
    ) -> Result<(), TournamentError> {
        if self.phase.is_terminal() {
            return Err(TournamentError::InvalidState);
        }
        self.phase = RoundPhase::TournamentCancelled;
        self.timers.clear();
        instance.status = TournamentStatus::Cancelled;
        Ok(())
    }

    /// Manual life edit (may eliminate or revive); re-checks the win condition.
    pub fn edit_lives(
        &mut self,
        instance: &mut TournamentInstance,
        player_id: PlayerId,
        lives: u32,
        now: DateTime<Utc>,
    ) -> Result<(), TournamentError> {
        if self.phase.is_terminal() {
            return Err(TournamentError::InvalidState);
        }
        let round = instance.current_round;
        edit_lives_manually(&mut instance.players, player_id, lives, round, now)?;
        self.check_winner(instance);
        Ok(())
    }

    /// Bulk life edit per league status; re-checks the win condition.
    pub fn bulk_set_lives(
        &mut self,
        instance: &mut TournamentInstance,
        status_to_lives: &HashMap<String, u32>,
        now: DateTime<Utc>,
    ) -> Result<usize, TournamentError> {
        if self.phase.is_terminal() {
            return Err(TournamentError::InvalidState);
        }
        let round = instance.current_round;
        let changed = bulk_set_lives_by_league_status(&mut instance.players, status_to_lives, round, now);
        self.check_winner(instance);
        Ok(changed)
    }

    fn open_board(&self, board: BoardId) -> Option<&Board> {
        if self.phase != RoundPhase::RoundActive {
            return None;
        }
        self.round.as_ref().and_then(|r| r.open_board(board))
    }

    fn resolve(
        &mut self,
        instance: &mut TournamentInstance,
        board: BoardId,
        resolution: Resolution,
        losing: HashSet<PlayerId>,
        now: DateTime<Utc>,
    ) -> BoardOutcome {
        self.timers.remove(&board);
        let eliminated = apply_life_loss(&mut instance.players, &losing, instance.current_round, now);
        if let Some(round) = self.round.as_mut() {
            round.resolved_boards.insert(board);
        }

        if let Some(w) = winner(&instance.players) {
            self.finish(instance, w);
        } else if self.round.as_ref().map_or(true, Round::is_complete) {
            self.phase = RoundPhase::RoundComplete;
            self.timers.clear();
            if count_active(&instance.players) == 0 {
                log::info!(
                    "Tournament {}: all remaining players eliminated in round {}, no winner",
                    instance.id,
                    instance.current_round
                );
            }
        }

        // Keep the order players sat on the board.
        let losers: Vec<PlayerId> = self
            .round
            .as_ref()
            .and_then(|r| r.boards.iter().find(|b| b.id == board))
            .map(|b| b.players.iter().copied().filter(|id| losing.contains(id)).collect())
            .unwrap_or_default();

        BoardOutcome::Resolved {
            board,
            resolution,
            losers,
            eliminated,
            phase: self.phase,
        }
    }

    fn check_winner(&mut self, instance: &mut TournamentInstance) {
        if matches!(
            self.phase,
            RoundPhase::RoundProposed | RoundPhase::RoundActive
        ) {
            if let Some(w) = winner(&instance.players) {
                self.finish(instance, w);
            }
        }
    }

    fn finish(&mut self, instance: &mut TournamentInstance, winner: PlayerId) {
        self.phase = RoundPhase::TournamentFinished;
        self.timers.clear();
        instance.winner = Some(winner);
        instance.status = TournamentStatus::Finished;
        log::info!(
            "Tournament {} finished after round {}: winner {}",
            instance.id,
            instance.current_round,
            instance.player_name(winner)
        );
    }
}
