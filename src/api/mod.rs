// HTTP API routes (tournament CRUD, participants, matches, projections).

use axum::{
    body::Body,
    extract::{Json, Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthUser, Claims, OptionalAuthUser};
use crate::authz;
use crate::bracket::project_bracket;
use crate::db::{is_unique_violation, Database, Tournament};
use crate::error::Error;
use crate::identity;
use crate::ledger::{self, MatchPatch};
use crate::lifecycle::{BracketKind, ParticipantStatus, TournamentStatus};
use crate::metrics;
use crate::registry;
use crate::standings::compute_standings;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTournamentRequest {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: Option<String>,
    pub is_public: Option<bool>,
    pub max_participants: Option<i64>,
    pub bracket_kind: Option<String>,
    pub sponsors: Option<Vec<String>>,
    pub prizes: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct UpdateTournamentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<String>,
    pub is_public: Option<bool>,
    pub max_participants: Option<i64>,
    pub bracket_kind: Option<String>,
    pub banner_ref: Option<String>,
    pub sponsors: Option<Vec<String>>,
    pub prizes: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct SetParticipantStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct GrantAdminRequest {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct CreateMatchRequest {
    pub round: i64,
    pub player1_id: i64,
    pub player2_id: Option<i64>,
    pub scheduled_at: Option<String>,
}

#[derive(Deserialize)]
pub struct RecordResultRequest {
    pub winner_id: i64,
    pub score: Option<String>,
    pub replay_ref: Option<String>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::AlreadyRegistered
        | Error::AlreadyGranted
        | Error::TournamentFull
        | Error::RegistrationClosed(_)
        | Error::InvalidTransition(..) => StatusCode::CONFLICT,
        Error::InvalidWinner | Error::InvalidPlayer(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotAuthorized => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Store(inner) => {
            tracing::error!("Database error: {inner}");
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable")
                .into_response();
        }
    };
    json_error(status, &e.to_string()).into_response()
}

fn internal_error(e: sqlx::Error) -> Response {
    error_response(Error::Store(e))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>) -> Router {
    let state = AppState { db };

    Router::new()
        // Tournaments
        .route(
            "/api/tournaments",
            get(list_tournaments).post(create_tournament),
        )
        .route(
            "/api/tournaments/{id}",
            get(get_tournament)
                .put(update_tournament)
                .delete(delete_tournament),
        )
        .route("/api/tournaments/{id}/status", put(set_tournament_status))
        // Participants
        .route(
            "/api/tournaments/{id}/participants",
            get(list_participants).post(register_participant),
        )
        .route(
            "/api/tournaments/{id}/participants/direct",
            post(add_participant_direct),
        )
        .route(
            "/api/tournaments/{id}/participants/{participant_id}",
            put(set_participant_status).delete(remove_participant),
        )
        // Admin grants
        .route(
            "/api/tournaments/{id}/admins",
            get(list_admins).post(grant_admin),
        )
        .route(
            "/api/tournaments/{id}/admins/{grant_id}",
            axum::routing::delete(revoke_admin),
        )
        // Matches
        .route(
            "/api/tournaments/{id}/matches",
            get(list_matches).post(create_match),
        )
        .route(
            "/api/matches/{id}",
            get(get_match).put(update_match).delete(delete_match),
        )
        .route("/api/matches/{id}/result", post(record_result))
        // Projections
        .route("/api/tournaments/{id}/standings", get(get_standings))
        .route("/api/tournaments/{id}/bracket", get(get_bracket))
        // Metrics
        .route("/metrics", get(serve_metrics))
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Per-request counter and latency middleware.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let endpoint = metrics::normalize_path(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(start.elapsed().as_secs_f64());
    response
}

async fn serve_metrics() -> impl IntoResponse {
    metrics::gather_metrics()
}

// ── Visibility helper ─────────────────────────────────────────────────

/// Fetch a tournament the caller is allowed to see. Private tournaments
/// are indistinguishable from missing ones for everyone but their
/// operators.
async fn fetch_visible(
    db: &Database,
    claims: Option<&Claims>,
    id: i64,
) -> Result<Tournament, Error> {
    let tournament = db
        .get_tournament(id)
        .await?
        .ok_or(Error::NotFound("tournament"))?;
    if tournament.is_public {
        return Ok(tournament);
    }
    if let Some(claims) = claims {
        if authz::is_tournament_operator(db, claims, &tournament).await? {
            return Ok(tournament);
        }
    }
    Err(Error::NotFound("tournament"))
}

/// JSON view of a tournament with sponsors/prizes as real arrays.
fn tournament_json(t: &Tournament) -> serde_json::Value {
    json!({
        "id": t.id,
        "title": t.title,
        "description": t.description,
        "starts_at": t.starts_at,
        "is_public": t.is_public,
        "max_participants": t.max_participants,
        "bracket_kind": t.bracket_kind,
        "status": t.status,
        "banner_ref": t.banner_ref,
        "sponsors": t.sponsor_list(),
        "prizes": t.prize_list(),
        "created_by": t.created_by,
        "created_at": t.created_at,
    })
}

fn validate_starts_at(value: &Option<String>) -> Result<(), Error> {
    if let Some(ts) = value {
        chrono::DateTime::parse_from_rfc3339(ts)
            .map_err(|e| Error::invalid_input(format!("bad starts_at {ts:?}: {e}")))?;
    }
    Ok(())
}

// ── Tournament handlers ───────────────────────────────────────────────

async fn list_tournaments(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
) -> impl IntoResponse {
    let result = match &auth.0 {
        Some(claims) if claims.is_global_admin() => state.db.list_all_tournaments().await,
        Some(claims) => state.db.list_tournaments_visible(Some(claims.sub)).await,
        None => state.db.list_tournaments_visible(None).await,
    };
    match result {
        Ok(tournaments) => {
            let body: Vec<_> = tournaments.iter().map(tournament_json).collect();
            (StatusCode::OK, Json(json!(body))).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn create_tournament(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateTournamentRequest>,
) -> impl IntoResponse {
    if req.title.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "title is required").into_response();
    }
    let bracket_kind = match req.bracket_kind.as_deref() {
        None => BracketKind::SingleElimination,
        Some(s) => match BracketKind::from_str_name(s) {
            Some(k) => k,
            None => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "bracket_kind must be 'single_elimination', 'double_elimination', or 'round_robin'",
                )
                .into_response()
            }
        },
    };
    if let Err(e) = validate_starts_at(&req.starts_at) {
        return error_response(e);
    }
    let max_participants = req.max_participants.unwrap_or(16);
    if max_participants < 2 {
        return json_error(StatusCode::BAD_REQUEST, "max_participants must be at least 2")
            .into_response();
    }

    let sponsors = serde_json::to_string(&req.sponsors.unwrap_or_default()).unwrap_or_default();
    let prizes = serde_json::to_string(&req.prizes.unwrap_or_default()).unwrap_or_default();

    match state
        .db
        .create_tournament(
            &req.title,
            req.description.as_deref().unwrap_or(""),
            req.starts_at.as_deref(),
            req.is_public.unwrap_or(true),
            max_participants,
            bracket_kind.to_str_name(),
            &sponsors,
            &prizes,
            claims.sub,
        )
        .await
    {
        Ok(t) => {
            metrics::TOURNAMENTS_CREATED_TOTAL.inc();
            (StatusCode::CREATED, Json(tournament_json(&t))).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn get_tournament(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match fetch_visible(&state.db, auth.0.as_ref(), id).await {
        Ok(t) => (StatusCode::OK, Json(tournament_json(&t))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_tournament(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTournamentRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }

    if let Some(kind) = req.bracket_kind.as_deref() {
        if BracketKind::from_str_name(kind).is_none() {
            return json_error(
                StatusCode::BAD_REQUEST,
                "bracket_kind must be 'single_elimination', 'double_elimination', or 'round_robin'",
            )
            .into_response();
        }
    }
    if let Err(e) = validate_starts_at(&req.starts_at) {
        return error_response(e);
    }
    if matches!(req.max_participants, Some(n) if n < 2) {
        return json_error(StatusCode::BAD_REQUEST, "max_participants must be at least 2")
            .into_response();
    }

    let sponsors = req
        .sponsors
        .map(|s| serde_json::to_string(&s).unwrap_or_default());
    let prizes = req
        .prizes
        .map(|p| serde_json::to_string(&p).unwrap_or_default());

    match state
        .db
        .update_tournament(
            id,
            req.title.as_deref(),
            req.description.as_deref(),
            req.starts_at.as_deref(),
            req.is_public,
            req.max_participants,
            req.bracket_kind.as_deref(),
            req.banner_ref.as_deref(),
            sponsors.as_deref(),
            prizes.as_deref(),
        )
        .await
    {
        Ok(Some(t)) => (StatusCode::OK, Json(tournament_json(&t))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "tournament not found").into_response(),
        Err(e) => internal_error(e),
    }
}

async fn set_tournament_status(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }

    let Some(to) = TournamentStatus::from_str_name(&req.status) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "status must be 'draft', 'open', 'ongoing', or 'completed'",
        )
        .into_response();
    };
    let Some(from) = tournament.status_enum() else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable").into_response();
    };
    if !from.can_transition(to) {
        return error_response(Error::InvalidTransition(from, to));
    }

    match state
        .db
        .update_tournament_status(id, to.to_str_name())
        .await
    {
        Ok(true) => match state.db.get_tournament(id).await {
            Ok(Some(t)) => (StatusCode::OK, Json(tournament_json(&t))).into_response(),
            Ok(None) => json_error(StatusCode::NOT_FOUND, "tournament not found").into_response(),
            Err(e) => internal_error(e),
        },
        Ok(false) => json_error(StatusCode::NOT_FOUND, "tournament not found").into_response(),
        Err(e) => internal_error(e),
    }
}

async fn delete_tournament(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_creator_or_global(&claims, &tournament) {
        return error_response(e);
    }

    match state.db.delete_tournament(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "tournament not found").into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Participant handlers ──────────────────────────────────────────────

async fn list_participants(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(e) = fetch_visible(&state.db, auth.0.as_ref(), id).await {
        return error_response(e);
    }
    match registry::list(&state.db, id).await {
        Ok(entries) => (StatusCode::OK, Json(json!(entries))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn register_participant(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    // self-service: anyone who can see the tournament may ask to join
    if let Err(e) = fetch_visible(&state.db, Some(&claims), id).await {
        return error_response(e);
    }
    match registry::register(&state.db, id, claims.sub).await {
        Ok(p) => (StatusCode::CREATED, Json(json!(p))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_participant_direct(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AddParticipantRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match registry::add_direct(&state.db, id, req.user_id).await {
        Ok(p) => (StatusCode::CREATED, Json(json!(p))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_participant_status(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((id, participant_id)): Path<(i64, i64)>,
    Json(req): Json<SetParticipantStatusRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    let Some(status) = ParticipantStatus::from_str_name(&req.status) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "status must be 'pending', 'approved', or 'rejected'",
        )
        .into_response();
    };
    // the row must belong to this tournament
    match state.db.get_participant(participant_id).await {
        Ok(Some(p)) if p.tournament_id == id => {}
        Ok(_) => return json_error(StatusCode::NOT_FOUND, "participant not found").into_response(),
        Err(e) => return internal_error(e),
    }
    match registry::set_status(&state.db, participant_id, status).await {
        Ok(p) => (StatusCode::OK, Json(json!(p))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove_participant(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((id, participant_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match state.db.get_participant(participant_id).await {
        Ok(Some(p)) if p.tournament_id == id => {}
        Ok(_) => return json_error(StatusCode::NOT_FOUND, "participant not found").into_response(),
        Err(e) => return internal_error(e),
    }
    match registry::remove(&state.db, participant_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// ── Admin grant handlers ──────────────────────────────────────────────

async fn list_admins(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match state.db.list_admin_grants(id).await {
        Ok(grants) => (StatusCode::OK, Json(json!(grants))).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn grant_admin(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<GrantAdminRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_creator_or_global(&claims, &tournament) {
        return error_response(e);
    }
    match state.db.create_admin_grant(id, req.user_id).await {
        Ok(grant) => (StatusCode::CREATED, Json(json!(grant))).into_response(),
        Err(e) if is_unique_violation(&e) => error_response(Error::AlreadyGranted),
        Err(e) => internal_error(e),
    }
}

async fn revoke_admin(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((id, grant_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_creator_or_global(&claims, &tournament) {
        return error_response(e);
    }
    // only grants of this tournament are addressable here
    match state.db.list_admin_grants(id).await {
        Ok(grants) if grants.iter().any(|g| g.id == grant_id) => {}
        Ok(_) => return json_error(StatusCode::NOT_FOUND, "admin grant not found").into_response(),
        Err(e) => return internal_error(e),
    }
    match state.db.delete_admin_grant(grant_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "admin grant not found").into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Match handlers ────────────────────────────────────────────────────

async fn list_matches(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(e) = fetch_visible(&state.db, auth.0.as_ref(), id).await {
        return error_response(e);
    }
    match ledger::list_by_tournament(&state.db, id).await {
        Ok(matches) => (StatusCode::OK, Json(json!(matches))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_match(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<CreateMatchRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, Some(&claims), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match ledger::create_match(
        &state.db,
        id,
        req.round,
        req.player1_id,
        req.player2_id,
        req.scheduled_at.as_deref(),
    )
    .await
    {
        Ok(m) => (StatusCode::CREATED, Json(json!(m))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Fetch a match together with its (visible) tournament.
async fn fetch_match_for(
    db: &Database,
    claims: Option<&Claims>,
    match_id: i64,
) -> Result<(crate::db::Match, Tournament), Error> {
    let m = db
        .get_match(match_id)
        .await?
        .ok_or(Error::NotFound("match"))?;
    let tournament = fetch_visible(db, claims, m.tournament_id).await?;
    Ok((m, tournament))
}

async fn get_match(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match fetch_match_for(&state.db, auth.0.as_ref(), id).await {
        Ok((m, _)) => (StatusCode::OK, Json(json!(m))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_match(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<MatchPatch>,
) -> impl IntoResponse {
    let tournament = match fetch_match_for(&state.db, Some(&claims), id).await {
        Ok((_, t)) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match ledger::update_match(&state.db, id, patch).await {
        Ok(m) => (StatusCode::OK, Json(json!(m))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_match(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let tournament = match fetch_match_for(&state.db, Some(&claims), id).await {
        Ok((_, t)) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match ledger::delete_match(&state.db, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn record_result(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RecordResultRequest>,
) -> impl IntoResponse {
    let tournament = match fetch_match_for(&state.db, Some(&claims), id).await {
        Ok((_, t)) => t,
        Err(e) => return error_response(e),
    };
    if let Err(e) = authz::require_operator(&state.db, &claims, &tournament).await {
        return error_response(e);
    }
    match ledger::record_result(
        &state.db,
        id,
        req.winner_id,
        req.score.as_deref(),
        req.replay_ref.as_deref(),
    )
    .await
    {
        Ok(m) => (StatusCode::OK, Json(json!(m))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Projection handlers ───────────────────────────────────────────────

async fn get_standings(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, auth.0.as_ref(), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    if BracketKind::from_str_name(&tournament.bracket_kind) != Some(BracketKind::RoundRobin) {
        return json_error(
            StatusCode::BAD_REQUEST,
            "standings are only available for round_robin tournaments",
        )
        .into_response();
    }

    let participants = match state.db.list_participants(id).await {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    let approved: Vec<_> = participants
        .into_iter()
        .filter(|p| p.status == ParticipantStatus::Approved.to_str_name())
        .collect();
    let matches = match state.db.list_matches_by_tournament(id).await {
        Ok(m) => m,
        Err(e) => return internal_error(e),
    };

    let start = Instant::now();
    let table = compute_standings(&approved, &matches);
    metrics::PROJECTION_DURATION_SECONDS
        .with_label_values(&["standings"])
        .observe(start.elapsed().as_secs_f64());

    let user_ids: Vec<i64> = table.iter().map(|r| r.user_id).collect();
    let identities = match identity::resolve_many(&state.db, &user_ids).await {
        Ok(map) => map,
        Err(e) => return internal_error(e),
    };

    let rows: Vec<_> = table
        .iter()
        .map(|r| {
            let display_name = identities
                .get(&r.user_id)
                .map(|i| i.display_name.clone())
                .unwrap_or_else(|| identity::UNKNOWN_PLAYER.to_string());
            json!({
                "user_id": r.user_id,
                "display_name": display_name,
                "played": r.played,
                "won": r.won,
                "lost": r.lost,
                "points": r.points,
            })
        })
        .collect();

    (StatusCode::OK, Json(json!(rows))).into_response()
}

async fn get_bracket(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let tournament = match fetch_visible(&state.db, auth.0.as_ref(), id).await {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    let is_elimination = BracketKind::from_str_name(&tournament.bracket_kind)
        .map(|k| k.is_elimination())
        .unwrap_or(false);
    if !is_elimination {
        return json_error(
            StatusCode::BAD_REQUEST,
            "bracket view is only available for elimination tournaments",
        )
        .into_response();
    }

    let matches = match state.db.list_matches_by_tournament(id).await {
        Ok(m) => m,
        Err(e) => return internal_error(e),
    };

    let start = Instant::now();
    let rounds = project_bracket(&matches);
    metrics::PROJECTION_DURATION_SECONDS
        .with_label_values(&["bracket"])
        .observe(start.elapsed().as_secs_f64());

    // Resolve every referenced player once for display. Users who are no
    // longer participants of the tournament (removed after playing) get
    // the placeholder, keeping their match history renderable.
    let mut user_ids: Vec<i64> = Vec::new();
    for m in &matches {
        user_ids.push(m.player1_id);
        if let Some(p2) = m.player2_id {
            user_ids.push(p2);
        }
    }
    user_ids.sort_unstable();
    user_ids.dedup();

    let current: std::collections::HashSet<i64> = match state.db.list_participants(id).await {
        Ok(rows) => rows.into_iter().map(|p| p.user_id).collect(),
        Err(e) => return internal_error(e),
    };
    let still_here: Vec<i64> = user_ids
        .iter()
        .copied()
        .filter(|uid| current.contains(uid))
        .collect();
    let identities = match identity::resolve_many(&state.db, &still_here).await {
        Ok(map) => map,
        Err(e) => return internal_error(e),
    };
    let players: serde_json::Map<String, serde_json::Value> = user_ids
        .iter()
        .map(|uid| {
            let (display_name, avatar_ref) = match identities.get(uid) {
                Some(ident) => (ident.display_name.clone(), ident.avatar_ref.clone()),
                None => (identity::UNKNOWN_PLAYER.to_string(), None),
            };
            (
                uid.to_string(),
                json!({
                    "display_name": display_name,
                    "avatar_ref": avatar_ref,
                }),
            )
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "rounds": rounds,
            "players": players,
        })),
    )
        .into_response()
}
