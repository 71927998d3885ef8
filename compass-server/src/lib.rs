use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warp::Filter;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::auth::bearer_token;
use crate::backend::IdentityBackend;
use crate::config::Config;
use crate::game_runner::{WriteBehindStore, WriteSender};
use crate::guards::{GuardState, LANDING_ROUTE, RecordingNavigator, RouteGuard};
use crate::session::{ResolvedSession, SessionResolver};
use crate::websocket::ConnectionManager;
use compass_core::load_high_score;
use compass_persistence::repositories::{KeyValueRepository, RoleRepository};
use compass_types::{RoleTag, VaultSection};

pub mod auth;
pub mod backend;
pub mod config;
pub mod game_runner;
pub mod guards;
pub mod session;
pub mod websocket;

/// Everything a request handler or socket needs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn IdentityBackend>,
    pub connection_manager: Arc<ConnectionManager>,
    pub roles: RoleRepository,
    pub key_values: KeyValueRepository,
    pub writes: WriteSender,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighScoreResponse {
    pub high_score: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: RoleTag,
}

pub fn partner_vault_sections() -> Vec<VaultSection> {
    [
        ("Digital Goodies", "Wallpapers and exclusive downloads"),
        ("Preview Gallery", "See new artworks before public release"),
        ("Early Access", "First access to new merchandise"),
    ]
    .into_iter()
    .map(|(title, description)| VaultSection {
        title: title.to_string(),
        description: description.to_string(),
    })
    .collect()
}

pub fn create_routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let token_filter = warp::header::optional::<String>("authorization")
        .map(|header: Option<String>| bearer_token(header.as_deref()));

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(state_filter.clone())
        .map(|ws: warp::ws::Ws, state: AppState| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, state))
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let session = warp::path!("api" / "session")
        .and(warp::get())
        .and(token_filter.clone())
        .and(state_filter.clone())
        .and_then(handle_session_request);

    let sign_out = warp::path!("api" / "session" / "sign-out")
        .and(warp::post())
        .and(token_filter.clone())
        .and(state_filter.clone())
        .and_then(handle_sign_out_request);

    let partner_vault = warp::path!("api" / "partner-vault")
        .and(warp::get())
        .and(token_filter.clone())
        .and(state_filter.clone())
        .and_then(handle_partner_vault_request);

    let high_score = warp::path!("api" / "color-compass" / "high-score")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_high_score_request);

    let admin_users = warp::path!("api" / "admin" / "users")
        .and(warp::get())
        .and(token_filter.clone())
        .and(state_filter.clone())
        .and_then(handle_admin_users_request);

    let admin_role = warp::path!("api" / "admin" / "users" / Uuid / "role")
        .and(warp::put())
        .and(token_filter.clone())
        .and(warp::body::json::<RoleUpdateRequest>())
        .and(state_filter.clone())
        .and_then(handle_role_update_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT"]);

    websocket
        .or(health)
        .or(session)
        .or(sign_out)
        .or(partner_vault)
        .or(high_score)
        .or(admin_users)
        .or(admin_role)
        .with(cors)
        .with(warp::log("color_compass"))
}

fn json_error(message: &str, status: StatusCode) -> Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
    .into_response()
}

fn see_other(path: &str) -> Response {
    warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        "location",
        path,
    )
    .into_response()
}

/// Resolve the caller and run `guard` over the result. Denied callers get a
/// redirect to wherever the guard navigated.
async fn authorize(
    state: &AppState,
    token: Option<String>,
    mut guard: RouteGuard,
) -> Result<ResolvedSession, Response> {
    let resolver = SessionResolver::new(state.backend.clone(), token);
    let navigator = RecordingNavigator::new();

    guard.observe(&resolver.status(), &navigator);
    let session = resolver.resolve().await;

    match (guard.observe(&resolver.status(), &navigator), session) {
        (GuardState::Authorized, Some(session)) => Ok(session),
        _ => {
            let target = navigator.last().unwrap_or_else(|| LANDING_ROUTE.to_string());
            tracing::debug!("Redirecting unauthorized caller to {}", target);
            Err(see_other(&target))
        }
    }
}

async fn handle_session_request(
    token: Option<String>,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let resolver = SessionResolver::new(state.backend.clone(), token);
    match resolver.resolve().await {
        Some(session) => Ok(warp::reply::json(&session.info()).into_response()),
        None => Ok(json_error("Not signed in", StatusCode::UNAUTHORIZED)),
    }
}

async fn handle_sign_out_request(
    token: Option<String>,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let resolver = SessionResolver::new(state.backend.clone(), token);
    resolver.sign_out().await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn handle_partner_vault_request(
    token: Option<String>,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    match authorize(&state, token, RouteGuard::partner_vault()).await {
        Ok(_) => Ok(warp::reply::json(&partner_vault_sections()).into_response()),
        Err(redirect) => Ok(redirect),
    }
}

async fn handle_high_score_request(state: AppState) -> Result<Response, warp::Rejection> {
    let store = WriteBehindStore::load(&state.key_values, state.writes.clone()).await;
    let high_score = load_high_score(&store);
    Ok(warp::reply::json(&HighScoreResponse { high_score }).into_response())
}

async fn handle_admin_users_request(
    token: Option<String>,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    if let Err(redirect) = authorize(&state, token, RouteGuard::admin()).await {
        return Ok(redirect);
    }

    match state.roles.list_profiles_with_roles().await {
        Ok(profiles) => Ok(warp::reply::json(&profiles).into_response()),
        Err(err) => {
            tracing::error!("Failed to fetch users: {}", err);
            Ok(json_error(
                "Failed to fetch users",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_role_update_request(
    user_id: Uuid,
    token: Option<String>,
    request: RoleUpdateRequest,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let admin = match authorize(&state, token, RouteGuard::admin()).await {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect),
    };

    match state.roles.replace_role(user_id, request.role).await {
        Ok(()) => {
            tracing::info!(
                "{} set role of {} to {}",
                admin.identity.email,
                user_id,
                request.role
            );
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(err) => {
            tracing::error!("Failed to update role for {}: {}", user_id, err);
            Ok(json_error(
                "Failed to update role",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
