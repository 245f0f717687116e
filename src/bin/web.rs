//! Single binary web server: HTML from templates/, static from /static, API via REST.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT; starting lives with
//! DEFAULT_LIVES and LIVES_BY_STATUS (e.g. "A=2,B=3,C=4"); cookie key with SESSION_KEY.

use actix_files::Files;
use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{
    cookie::Key,
    delete, get, post, put,
    web::{self, Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use chrono::Utc;
use kratzer_tournament_web::{
    write_results_csv, BoardId, MemoryStore, OrganizerId, PlayerId, ServerConfig,
    TournamentController, TournamentError, TournamentId, TournamentSession, TournamentSettings,
    TournamentStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

const ORGANIZER_KEY: &str = "organizer";

/// Loaded tournament + last activity time (unloaded after inactivity; storage keeps it).
struct SessionEntry {
    session: TournamentSession,
    last_activity: Instant,
}

struct AppInner {
    controller: TournamentController<MemoryStore>,
    /// Loaded tournaments by organizer.
    sessions: RwLock<HashMap<OrganizerId, SessionEntry>>,
}

type AppState = Data<AppInner>;

/// Inactivity threshold: loaded tournaments not accessed for this long are unloaded.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(12 * 3600);

/// How often due sudden-death countdowns are checked.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Serialize)]
struct TournamentResponse<'a, T: Serialize> {
    result: T,
    tournament: &'a TournamentSession,
    /// Lines queued by this request (or by the ticker since the last one).
    announcements: Vec<String>,
}

#[derive(Deserialize)]
struct AddClubPlayerBody {
    name: String,
    #[serde(default)]
    league_status: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    player_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
struct PaidBody {
    paid: bool,
}

#[derive(Deserialize)]
struct PrizePoolBody {
    entry_fee: f64,
    percentages: Vec<f64>,
    /// Defaults to the registry's paid count.
    paid_player_count: Option<u32>,
}

#[derive(Deserialize)]
struct FinishGameBody {
    losers: Vec<Uuid>,
}

#[derive(Deserialize)]
struct SetLivesBody {
    lives: u32,
}

#[derive(Deserialize)]
struct LivesByStatusBody {
    lives: HashMap<String, u32>,
}

#[derive(Deserialize)]
struct BoardPath {
    board_id: BoardId,
}

#[derive(Deserialize)]
struct PlayerPath {
    player_id: PlayerId,
}

#[derive(Deserialize)]
struct ResultsPath {
    id: TournamentId,
}

fn error_response(e: &TournamentError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        TournamentError::ActiveTournamentExists(id) => HttpResponse::Conflict()
            .json(serde_json::json!({ "error": e.to_string(), "tournament_id": id })),
        TournamentError::Store(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn no_tournament() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "No tournament" }))
}

fn lock_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("lock error")
}

/// Organizer id from the cookie session, created on first visit.
fn organizer(session: &Session) -> Result<OrganizerId, HttpResponse> {
    match session.get::<String>(ORGANIZER_KEY) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => {
            let id = Uuid::new_v4().to_string();
            session
                .insert(ORGANIZER_KEY, &id)
                .map_err(|_| HttpResponse::InternalServerError().body("session error"))?;
            Ok(id)
        }
        Err(_) => Err(HttpResponse::InternalServerError().body("session error")),
    }
}

/// Run `f` on the organizer's tournament, loading (recovering) it from storage if needed.
/// Queued announcements go out with the response; terminal tournaments are then unloaded
/// unless their last write failed.
fn with_tournament<T, F>(state: &AppState, organizer: &str, f: F) -> HttpResponse
where
    T: Serialize,
    F: FnOnce(
        &TournamentController<MemoryStore>,
        &mut TournamentSession,
    ) -> Result<T, TournamentError>,
{
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    if !g.contains_key(organizer) {
        match state.controller.recover_active(organizer, Utc::now()) {
            Ok(Some(session)) => {
                g.insert(
                    organizer.to_string(),
                    SessionEntry {
                        session,
                        last_activity: Instant::now(),
                    },
                );
            }
            Ok(None) => return no_tournament(),
            Err(e) => return error_response(&e),
        }
    }
    let Some(entry) = g.get_mut(organizer) else {
        return no_tournament();
    };
    entry.last_activity = Instant::now();
    let session = &mut entry.session;
    let response = match f(&state.controller, &mut *session) {
        Ok(result) => {
            let announcements = session.drain_announcements();
            HttpResponse::Ok().json(TournamentResponse {
                result,
                tournament: session,
                announcements,
            })
        }
        Err(e) => error_response(&e),
    };
    if session.is_terminal() && session.can_unload() {
        g.remove(organizer);
    }
    response
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "kratzer-tournament-web",
    })
}

/// Avoid 404 in browser tab: favicon not required for app logic.
#[get("/favicon.ico")]
async fn favicon() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Club roster.
#[get("/api/players")]
async fn api_list_club_players(state: AppState) -> HttpResponse {
    match state.controller.club_players() {
        Ok(players) => HttpResponse::Ok().json(players),
        Err(e) => error_response(&e),
    }
}

/// Add a player to the club roster.
#[post("/api/players")]
async fn api_add_club_player(state: AppState, body: Json<AddClubPlayerBody>) -> HttpResponse {
    match state
        .controller
        .add_club_player(&body.name, &body.league_status)
    {
        Ok(player) => HttpResponse::Ok().json(player),
        Err(e) => error_response(&e),
    }
}

/// Players registered for the next tournament.
#[get("/api/registry")]
async fn api_get_registry(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state.controller.registry(&organizer) {
        Ok(registry) => HttpResponse::Ok().json(registry),
        Err(e) => error_response(&e),
    }
}

#[post("/api/registry")]
async fn api_register_players(
    state: AppState,
    session: Session,
    body: Json<RegisterBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state.controller.register_players(&organizer, &body.player_ids) {
        Ok(registry) => HttpResponse::Ok().json(registry),
        Err(e) => error_response(&e),
    }
}

#[delete("/api/registry")]
async fn api_clear_registry(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state.controller.clear_registry(&organizer) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

/// Mark a registered player's entry fee as paid / unpaid.
#[put("/api/registry/{player_id}/paid")]
async fn api_set_paid(
    state: AppState,
    session: Session,
    path: Path<PlayerPath>,
    body: Json<PaidBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state
        .controller
        .set_paid(&organizer, path.player_id, body.paid)
    {
        Ok(registry) => HttpResponse::Ok().json(registry),
        Err(e) => error_response(&e),
    }
}

#[post("/api/prize-pool")]
async fn api_prize_pool(
    state: AppState,
    session: Session,
    body: Json<PrizePoolBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state.controller.prize_pool(
        &organizer,
        body.entry_fee,
        body.paid_player_count,
        &body.percentages,
    ) {
        Ok(pool) => HttpResponse::Ok().json(pool),
        Err(e) => error_response(&e),
    }
}

/// Start a tournament from the registry (409 if one is already running: resume or abandon).
#[post("/api/tournament")]
async fn api_start_tournament(
    state: AppState,
    session: Session,
    body: Option<Json<TournamentSettings>>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let settings = body.map(Json::into_inner).unwrap_or_default();
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match state.controller.start(&organizer, settings, Utc::now()) {
        Ok(tournament) => {
            let response = HttpResponse::Ok().json(&tournament);
            g.insert(
                organizer,
                SessionEntry {
                    session: tournament,
                    last_activity: Instant::now(),
                },
            );
            response
        }
        Err(e) => error_response(&e),
    }
}

/// Current tournament (recovered from storage after a reload).
#[get("/api/tournament")]
async fn api_get_tournament(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |_, _| Ok(()))
}

/// Give up the running tournament so a new one can be started; keeps the registry.
#[post("/api/tournament/abandon")]
async fn api_abandon_tournament(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    g.remove(&organizer);
    match state.controller.abandon_active(&organizer) {
        Ok(Some(id)) => HttpResponse::Ok().json(serde_json::json!({ "abandoned": id })),
        Ok(None) => no_tournament(),
        Err(e) => error_response(&e),
    }
}

/// Propose the next round (capacity checked; finishes if one player is left).
#[post("/api/tournament/rounds")]
async fn api_propose_round(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| c.propose_round(t))
}

/// Confirm the proposed round: allocate boards and persist.
#[post("/api/tournament/rounds/confirm")]
async fn api_confirm_round(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.confirm_round(t, &mut rand::thread_rng(), Utc::now())
    })
}

#[post("/api/tournament/boards/{board_id}/start")]
async fn api_start_game(state: AppState, session: Session, path: Path<BoardPath>) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.start_game(t, path.board_id, Utc::now())
    })
}

/// Report a board's result: the named losers lose one life each.
#[post("/api/tournament/boards/{board_id}/finish")]
async fn api_finish_game(
    state: AppState,
    session: Session,
    path: Path<BoardPath>,
    body: Json<FinishGameBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.finish_game(t, path.board_id, &body.losers, Utc::now())
    })
}

#[post("/api/tournament/boards/{board_id}/cancel")]
async fn api_cancel_game(state: AppState, session: Session, path: Path<BoardPath>) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.cancel_game(t, path.board_id, Utc::now())
    })
}

/// Set a player's lives manually (0 eliminates, >0 revives).
#[put("/api/tournament/players/{player_id}/lives")]
async fn api_set_lives(
    state: AppState,
    session: Session,
    path: Path<PlayerPath>,
    body: Json<SetLivesBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.edit_lives(t, path.player_id, body.lives, Utc::now())
    })
}

/// Overwrite lives of all active players per league status.
#[put("/api/tournament/lives-by-status")]
async fn api_set_lives_by_status(
    state: AppState,
    session: Session,
    body: Json<LivesByStatusBody>,
) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| {
        c.bulk_set_lives(t, &body.lives, Utc::now())
    })
}

#[post("/api/tournament/cancel")]
async fn api_cancel_tournament(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    with_tournament(&state, &organizer, |c, t| c.cancel(t))
}

/// Pending announcement lines (empties the queue).
#[get("/api/tournament/announcements")]
async fn api_announcements(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let lines = g
        .get_mut(&organizer)
        .map(|entry| entry.session.drain_announcements())
        .unwrap_or_default();
    HttpResponse::Ok().json(lines)
}

/// Finished and cancelled tournaments of this organizer.
#[get("/api/results")]
async fn api_list_results(state: AppState, session: Session) -> HttpResponse {
    let organizer = match organizer(&session) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match state.controller.store().list_results(&organizer) {
        Ok(summaries) => HttpResponse::Ok().json(summaries),
        Err(e) => error_response(&TournamentError::from(e)),
    }
}

#[get("/api/results/{id}")]
async fn api_get_results(state: AppState, path: Path<ResultsPath>) -> HttpResponse {
    match state.controller.store().get_results(path.id) {
        Ok(Some(results)) => HttpResponse::Ok().json(results),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({ "error": "No results" })),
        Err(e) => error_response(&TournamentError::from(e)),
    }
}

/// Ranked results as a CSV download.
#[get("/api/results/{id}/csv")]
async fn api_get_results_csv(state: AppState, path: Path<ResultsPath>) -> HttpResponse {
    let results = match state.controller.store().get_results(path.id) {
        Ok(Some(results)) => results,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({ "error": "No results" }))
        }
        Err(e) => return error_response(&TournamentError::from(e)),
    };
    let mut buf = Vec::new();
    if let Err(e) = write_results_csv(&results, &mut buf) {
        log::error!("CSV export of {} failed: {}", path.id, e);
        return HttpResponse::InternalServerError().body("csv error");
    }
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"results-{}.csv\"", path.id),
        ))
        .body(buf)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env();
    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let key = match &config.session_key {
        Some(k) => Key::from(k.as_slice()),
        None => {
            log::warn!("SESSION_KEY not set; organizer cookies will not survive a restart");
            Key::generate()
        }
    };

    let state = Data::new(AppInner {
        controller: TournamentController::new(MemoryStore::new(), config.lives_table.clone()),
        sessions: RwLock::new(HashMap::new()),
    });

    // Background task: fire due sudden-death countdowns every second, and unload tournaments
    // idle for 12+ hours (they stay in storage and are recovered on the next request).
    let state_ticker = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            let mut g = match state_ticker.sessions.write() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            let now = Utc::now();
            for entry in g.values_mut() {
                if let Err(e) = state_ticker.controller.tick(&mut entry.session, now) {
                    log::warn!(
                        "Tournament {}: timer tick failed: {}",
                        entry.session.instance.id,
                        e
                    );
                }
            }
            let before = g.len();
            // Unsaved sessions stay loaded; the tick above keeps retrying the write.
            g.retain(|_, entry| {
                entry.last_activity.elapsed() < INACTIVITY_TIMEOUT || entry.session.pending_sync
            });
            let removed = before - g.len();
            if removed > 0 {
                log::info!("Unloaded {} inactive tournament(s) (no activity for 12h)", removed);
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .route("/", web::get().to(serve_index_async))
            .service(api_health)
            .service(favicon)
            .service(api_list_club_players)
            .service(api_add_club_player)
            .service(api_get_registry)
            .service(api_register_players)
            .service(api_clear_registry)
            .service(api_set_paid)
            .service(api_prize_pool)
            .service(api_start_tournament)
            .service(api_get_tournament)
            .service(api_abandon_tournament)
            .service(api_propose_round)
            .service(api_confirm_round)
            .service(api_start_game)
            .service(api_finish_game)
            .service(api_cancel_game)
            .service(api_set_lives)
            .service(api_set_lives_by_status)
            .service(api_cancel_tournament)
            .service(api_announcements)
            .service(api_list_results)
            .service(api_get_results)
            .service(api_get_results_csv)
            .service(Files::new("/static", "static").show_files_listing())
    })
    .bind(bind)?
    .run()
    .await
}

async fn serve_index_async() -> HttpResponse {
    let html = include_str!("../../templates/index.html");
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}
