//! Integration tests for the tournament lifecycle against the in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use kratzer_tournament_web::{
    BoardOutcome, ClubPlayer, LivesTable, MemoryStore, NewRoundOutcome, RoundPhase,
    TournamentController, TournamentError, TournamentSession, TournamentSettings,
    TournamentStatus, TournamentStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use uuid::Uuid;

const ORG: &str = "org-1";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 19, 0, 0).unwrap()
}

fn settings(board_count: u32, max_group_size: u32, sudden_death: bool) -> TournamentSettings {
    TournamentSettings {
        board_count,
        max_group_size,
        sudden_death,
        sudden_death_minutes: 5,
        speech_enabled: true,
    }
}

/// Controller with the given (name, status) roster, everyone registered for `ORG`.
fn setup(roster: &[(&str, &str)]) -> (TournamentController<MemoryStore>, Vec<ClubPlayer>) {
    let controller = TournamentController::new(MemoryStore::new(), LivesTable::default());
    let players: Vec<ClubPlayer> = roster
        .iter()
        .map(|(name, status)| controller.add_club_player(name, status).unwrap())
        .collect();
    let ids: Vec<_> = players.iter().map(|p| p.id).collect();
    controller.register_players(ORG, &ids).unwrap();
    (controller, players)
}

fn confirm(
    controller: &TournamentController<MemoryStore>,
    session: &mut TournamentSession,
    seed: u64,
) {
    controller
        .confirm_round(session, &mut StdRng::seed_from_u64(seed), t0())
        .unwrap();
}

#[test]
fn start_admits_registry_with_lives_from_table() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "b"), ("Cleo", "Z")]);
    let session = controller.start(ORG, settings(2, 2, false), t0()).unwrap();

    assert_eq!(session.rounds.phase(), RoundPhase::RoundProposed);
    assert_eq!(session.instance.current_round, 0);
    assert_eq!(session.instance.status, TournamentStatus::Running);
    let lives: Vec<_> = roster
        .iter()
        .map(|c| session.instance.player(c.id).unwrap().lives)
        .collect();
    assert_eq!(lives, vec![2, 3, 3]);

    let stored = controller.store().get_active_tournament(ORG).unwrap().unwrap();
    assert_eq!(stored.id, session.instance.id);
}

#[test]
fn start_rejects_bad_input() {
    let (controller, _) = setup(&[("Anna", "A")]);
    assert_eq!(
        controller.start(ORG, settings(2, 2, false), t0()).unwrap_err(),
        TournamentError::NotEnoughPlayersToStart
    );

    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C")]);
    assert!(matches!(
        controller.start(ORG, settings(0, 2, false), t0()),
        Err(TournamentError::InvalidSettings(_))
    ));
    assert!(matches!(
        controller.start(ORG, settings(1, 7, false), t0()),
        Err(TournamentError::InvalidSettings(_))
    ));
    assert_eq!(
        controller.start(ORG, settings(1, 2, false), t0()).unwrap_err(),
        TournamentError::CapacityExceeded {
            capacity: 2,
            active: 3
        }
    );
    assert!(controller.store().get_active_tournament(ORG).unwrap().is_none());
}

#[test]
fn one_running_tournament_per_organizer() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let first = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    assert_eq!(
        controller.start(ORG, settings(1, 2, false), t0()).unwrap_err(),
        TournamentError::ActiveTournamentExists(first.instance.id)
    );
}

#[test]
fn abandon_cancels_running_tournament_and_keeps_registry() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let first = controller.start(ORG, settings(1, 2, false), t0()).unwrap();

    assert_eq!(controller.abandon_active(ORG).unwrap(), Some(first.instance.id));
    assert_eq!(controller.abandon_active(ORG).unwrap(), None);
    assert_eq!(controller.registry(ORG).unwrap().len(), 2);

    let second = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    assert_ne!(second.instance.id, first.instance.id);
    let history = controller.store().list_results(ORG).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TournamentStatus::Cancelled);
}

#[test]
fn full_tournament_persists_results_and_clears_registry() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let (anna, ben) = (roster[0].id, roster[1].id);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    let id = session.instance.id;

    confirm(&controller, &mut session, 1);
    controller.finish_game(&mut session, 1, &[anna], t0()).unwrap();
    assert_eq!(session.rounds.phase(), RoundPhase::RoundComplete);

    assert_eq!(
        controller.propose_round(&mut session).unwrap(),
        NewRoundOutcome::Proposed { round: 2 }
    );
    confirm(&controller, &mut session, 2);
    let outcome = controller
        .finish_game(&mut session, 1, &[anna], t0() + Duration::minutes(20))
        .unwrap();
    assert!(matches!(
        outcome,
        BoardOutcome::Resolved {
            phase: RoundPhase::TournamentFinished,
            ..
        }
    ));
    assert_eq!(session.instance.winner, Some(ben));
    assert!(!session.pending_sync);

    let store = controller.store();
    assert!(store.get_active_tournament(ORG).unwrap().is_none());
    assert!(store.load_registered_players(ORG).unwrap().is_empty());

    let history = store.list_results(ORG).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TournamentStatus::Finished);
    assert_eq!(history[0].winner_name.as_deref(), Some("Ben"));
    assert_eq!(history[0].total_rounds, 2);

    let results = store.get_results(id).unwrap().unwrap();
    assert_eq!(results[0].player_id, ben);
    assert_eq!(results[1].player_id, anna);
    assert_eq!(results[1].elimination_round, Some(2));

    assert_eq!(controller.complete(&mut session).unwrap(), results);
    assert!(controller
        .finish_game(&mut session, 1, &[ben], t0())
        .unwrap()
        .is_ignored());
}

#[test]
fn complete_requires_finished_tournament() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    assert_eq!(
        controller.complete(&mut session).unwrap_err(),
        TournamentError::InvalidState
    );
}

#[test]
fn recovery_restores_round_and_fires_expired_timers() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C"), ("Dan", "B")]);
    let mut session = controller.start(ORG, settings(2, 2, true), t0()).unwrap();
    confirm(&controller, &mut session, 3);
    controller.start_game(&mut session, 1, t0()).unwrap();
    let on_board: Vec<_> = session.rounds.current_round().unwrap().boards[0].players.clone();
    let lives_before: Vec<_> = on_board
        .iter()
        .map(|&id| session.instance.player(id).unwrap().lives)
        .collect();
    drop(session);

    let early = controller
        .recover_active(ORG, t0() + Duration::minutes(2))
        .unwrap()
        .unwrap();
    assert_eq!(early.rounds.phase(), RoundPhase::RoundActive);
    assert_eq!(early.instance.current_round, 1);
    assert_eq!(early.rounds.deadline(1), Some(t0() + Duration::minutes(5)));
    assert_eq!(early.rounds.deadline(2), None);

    let late = controller
        .recover_active(ORG, t0() + Duration::minutes(30))
        .unwrap()
        .unwrap();
    assert_eq!(late.rounds.armed_timers(), 0);
    for (id, before) in on_board.iter().zip(lives_before) {
        assert_eq!(late.instance.player(*id).unwrap().lives, before - 1);
    }
    // The timeout was written back.
    let stored = controller.store().get_players(late.instance.id).unwrap();
    assert_eq!(stored, late.instance.players);
    assert_eq!(late.rounds.open_boards().len(), 1);
}

#[test]
fn recover_without_running_tournament() {
    let (controller, _) = setup(&[("Anna", "A")]);
    assert!(controller.recover_active(ORG, t0()).unwrap().is_none());
}

#[test]
fn failed_round_write_leaves_round_proposed() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();

    controller.store().set_fail_writes(true);
    let err = controller
        .confirm_round(&mut session, &mut StdRng::seed_from_u64(1), t0())
        .unwrap_err();
    assert!(matches!(err, TournamentError::Store(_)));
    assert_eq!(session.rounds.phase(), RoundPhase::RoundProposed);
    assert_eq!(session.instance.current_round, 0);
    assert!(session.rounds.current_round().is_none());

    controller.store().set_fail_writes(false);
    confirm(&controller, &mut session, 1);
    assert_eq!(session.instance.current_round, 1);
    assert_eq!(
        controller
            .store()
            .get_last_round(session.instance.id)
            .unwrap()
            .map(|r| r.number),
        Some(1)
    );
}

#[test]
fn failed_write_is_reconciled_on_next_operation() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C"), ("Dan", "B")]);
    let mut session = controller.start(ORG, settings(2, 2, false), t0()).unwrap();
    confirm(&controller, &mut session, 4);
    let loser = session.rounds.current_round().unwrap().boards[0].players[0];
    let before = session.instance.player(loser).unwrap().lives;

    controller.store().set_fail_writes(true);
    let err = controller
        .finish_game(&mut session, 1, &[loser], t0())
        .unwrap_err();
    assert!(matches!(err, TournamentError::Store(_)));
    assert!(session.pending_sync);
    assert_eq!(session.instance.player(loser).unwrap().lives, before - 1);

    let stored = controller.store().get_players(session.instance.id).unwrap();
    assert_eq!(
        stored.iter().find(|p| p.id == loser).unwrap().lives,
        before
    );

    controller.store().set_fail_writes(false);
    controller.start_game(&mut session, 2, t0()).unwrap();
    assert!(!session.pending_sync);
    let stored = controller.store().get_players(session.instance.id).unwrap();
    assert_eq!(stored, session.instance.players);
    let round = controller
        .store()
        .get_last_round(session.instance.id)
        .unwrap()
        .unwrap();
    assert!(round.resolved_boards.contains(&1));
}

#[test]
fn cancel_keeps_rounds_and_clears_registry() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    let id = session.instance.id;
    confirm(&controller, &mut session, 1);

    controller.cancel(&mut session).unwrap();
    assert_eq!(session.rounds.phase(), RoundPhase::TournamentCancelled);
    assert_eq!(
        controller.cancel(&mut session).unwrap_err(),
        TournamentError::InvalidState
    );

    let store = controller.store();
    assert!(store.get_active_tournament(ORG).unwrap().is_none());
    assert!(store.get_last_round(id).unwrap().is_some());
    assert!(store.load_registered_players(ORG).unwrap().is_empty());
    assert!(store.get_results(id).unwrap().is_none());
    let history = store.list_results(ORG).unwrap();
    assert_eq!(history[0].status, TournamentStatus::Cancelled);
    assert_eq!(history[0].total_rounds, 1);
}

#[test]
fn manual_edits_go_through_controller() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C")]);
    let mut session = controller.start(ORG, settings(2, 2, false), t0()).unwrap();

    let table: HashMap<String, u32> = [("c".to_string(), 6)].into_iter().collect();
    assert_eq!(controller.bulk_set_lives(&mut session, &table, t0()).unwrap(), 1);
    assert_eq!(session.instance.player(roster[2].id).unwrap().lives, 6);

    controller.edit_lives(&mut session, roster[0].id, 0, t0()).unwrap();
    assert_eq!(session.rounds.phase(), RoundPhase::RoundProposed);
    controller.edit_lives(&mut session, roster[1].id, 0, t0()).unwrap();
    assert_eq!(session.rounds.phase(), RoundPhase::TournamentFinished);
    assert_eq!(session.instance.winner, Some(roster[2].id));
    assert!(controller.store().get_active_tournament(ORG).unwrap().is_none());

    let unknown = Uuid::new_v4();
    assert_eq!(
        controller.edit_lives(&mut session, unknown, 1, t0()).unwrap_err(),
        TournamentError::InvalidState
    );
}

#[test]
fn announcements_follow_speech_setting() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, true), t0()).unwrap();
    confirm(&controller, &mut session, 1);
    let lines = session.drain_announcements();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Round 1, board 1: "));
    assert!(session.drain_announcements().is_empty());

    controller.start_game(&mut session, 1, t0()).unwrap();
    controller
        .tick(&mut session, t0() + Duration::minutes(5))
        .unwrap();
    assert_eq!(
        session.drain_announcements(),
        vec!["Board 1: time is up, everyone loses a life".to_string()]
    );

    controller.cancel(&mut session).unwrap();
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut quiet = settings(1, 2, false);
    quiet.speech_enabled = false;
    let mut session = controller.start(ORG, quiet, t0()).unwrap();
    confirm(&controller, &mut session, 1);
    assert!(session.drain_announcements().is_empty());
}

#[test]
fn winner_and_eliminations_are_announced() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    controller.edit_lives(&mut session, roster[0].id, 1, t0()).unwrap();
    confirm(&controller, &mut session, 1);
    session.drain_announcements();

    controller
        .finish_game(&mut session, 1, &[roster[0].id], t0())
        .unwrap();
    assert_eq!(
        session.drain_announcements(),
        vec!["Anna is out".to_string(), "Ben wins the tournament".to_string()]
    );
}

#[test]
fn roster_and_registry_validation() {
    let (controller, roster) = setup(&[("Anna", "A")]);
    assert_eq!(
        controller.add_club_player("  ", "A").unwrap_err(),
        TournamentError::EmptyPlayerName
    );
    assert_eq!(
        controller.add_club_player("anna", "B").unwrap_err(),
        TournamentError::DuplicatePlayerName
    );

    let unknown = Uuid::new_v4();
    assert_eq!(
        controller.register_players(ORG, &[unknown]).unwrap_err(),
        TournamentError::UnknownClubPlayer(unknown)
    );
    assert_eq!(
        controller.set_paid(ORG, unknown, true).unwrap_err(),
        TournamentError::PlayerNotFound(unknown)
    );

    let regs = controller.set_paid(ORG, roster[0].id, true).unwrap();
    assert!(regs[0].paid);
    controller.clear_registry(ORG).unwrap();
    assert!(controller.registry(ORG).unwrap().is_empty());
}

#[test]
fn prize_pool_uses_paid_registrations() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C"), ("Dan", "B")]);
    for p in &roster[..3] {
        controller.set_paid(ORG, p.id, true).unwrap();
    }

    let pool = controller.prize_pool(ORG, 10.0, None, &[50.0, 30.0, 20.0]).unwrap();
    assert_eq!(pool.total_prize_money, 30.0);
    let amounts: Vec<_> = pool.distribution.iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![15.0, 9.0, 6.0]);

    let explicit = controller
        .prize_pool(ORG, 20.0, Some(10), &[50.0, 30.0, 15.0, 5.0])
        .unwrap();
    assert_eq!(explicit.total_prize_money, 200.0);
}

#[test]
fn finished_session_holds_announcements_until_drained() {
    let (controller, roster) = setup(&[("Anna", "A"), ("Ben", "B")]);
    let mut session = controller.start(ORG, settings(1, 2, false), t0()).unwrap();
    controller.edit_lives(&mut session, roster[0].id, 1, t0()).unwrap();
    confirm(&controller, &mut session, 1);
    session.drain_announcements();
    assert!(session.can_unload());

    controller
        .finish_game(&mut session, 1, &[roster[0].id], t0())
        .unwrap();
    assert!(session.is_terminal());
    assert!(!session.can_unload());

    let lines = session.drain_announcements();
    assert_eq!(lines.last().map(String::as_str), Some("Ben wins the tournament"));
    assert!(session.can_unload());
}

#[test]
fn unsaved_session_cannot_be_unloaded() {
    let (controller, _) = setup(&[("Anna", "A"), ("Ben", "B"), ("Cleo", "C"), ("Dan", "B")]);
    let mut session = controller.start(ORG, settings(2, 2, false), t0()).unwrap();
    confirm(&controller, &mut session, 4);
    session.drain_announcements();
    let loser = session.rounds.current_round().unwrap().boards[0].players[0];

    controller.store().set_fail_writes(true);
    assert!(controller.finish_game(&mut session, 1, &[loser], t0()).is_err());
    assert!(!session.can_unload());
    assert!(!session.is_terminal());

    controller.store().set_fail_writes(false);
    controller.tick(&mut session, t0()).unwrap();
    assert!(!session.pending_sync);
    assert!(session.can_unload());
}
