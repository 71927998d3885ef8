
use std::sync::Arc;
use std::time::Duration;

use compass_core::HIGH_SCORE_KEY;
use compass_server::{HighScoreResponse, create_routes, partner_vault_sections};
use compass_types::{Profile, RoleTag, SessionInfo, VaultSection};
use test_helpers::{StaticBackend, create_identity, setup_app_state};
use warp::http::StatusCode;

fn backend_with_roles() -> (StaticBackend, compass_types::Identity) {
    let standard = create_identity("Sam");
    let backend = StaticBackend::new()
        .with_user("admin-token", create_identity("Ada"), &[RoleTag::Admin])
        .with_user("partner-token", create_identity("Pat"), &[RoleTag::Partner])
        .with_user("standard-token", standard.clone(), &[]);
    (backend, standard)
}

#[tokio::test]
async fn test_health() {
    let state = setup_app_state(Arc::new(StaticBackend::new())).await;
    let routes = create_routes(state);

    let res = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.body(), "OK");
}

#[tokio::test]
async fn test_session_endpoint() {
    let (backend, _) = backend_with_roles();
    let routes = create_routes(setup_app_state(Arc::new(backend)).await);

    let res = warp::test::request()
        .path("/api/session")
        .header("authorization", "Bearer partner-token")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let info: SessionInfo = serde_json::from_slice(res.body()).unwrap();
    assert!(info.is_partner);
    assert!(!info.is_admin);
    assert_eq!(info.effective_role, RoleTag::Partner);

    let res = warp::test::request()
        .path("/api/session")
        .header("authorization", "Bearer unknown")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = warp::test::request().path("/api/session").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_partner_vault_guard() {
    let (backend, _) = backend_with_roles();
    let routes = create_routes(setup_app_state(Arc::new(backend)).await);

    let res = warp::test::request()
        .path("/api/partner-vault")
        .header("authorization", "Bearer partner-token")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let sections: Vec<VaultSection> = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(sections.len(), partner_vault_sections().len());

    for token in ["standard-token", "admin-token"] {
        let res = warp::test::request()
            .path("/api/partner-vault")
            .header("authorization", format!("Bearer {}", token))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/");
    }

    let res = warp::test::request()
        .path("/api/partner-vault")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_admin_role_management() {
    let (backend, standard) = backend_with_roles();
    let state = setup_app_state(Arc::new(backend)).await;
    state.roles.add_role(standard.user_id, RoleTag::Standard).await.unwrap();
    let routes = create_routes(state.clone());

    // Non-admins are redirected
    let res = warp::test::request()
        .method("PUT")
        .path(&format!("/api/admin/users/{}/role", standard.user_id))
        .header("authorization", "Bearer standard-token")
        .json(&serde_json::json!({ "role": "admin" }))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = warp::test::request()
        .method("PUT")
        .path(&format!("/api/admin/users/{}/role", standard.user_id))
        .header("authorization", "Bearer admin-token")
        .json(&serde_json::json!({ "role": "partner" }))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let roles = state.roles.roles_for_user(standard.user_id).await.unwrap();
    assert!(roles.is_partner());
    assert_eq!(roles.iter().count(), 1);

    let res = warp::test::request()
        .path("/api/admin/users")
        .header("authorization", "Bearer admin-token")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let _profiles: Vec<Profile> = serde_json::from_slice(res.body()).unwrap();

    let res = warp::test::request()
        .path("/api/admin/users")
        .header("authorization", "Bearer partner-token")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_sign_out() {
    let (backend, _) = backend_with_roles();
    let backend = Arc::new(backend);
    let routes = create_routes(setup_app_state(backend.clone()).await);

    let res = warp::test::request()
        .method("POST")
        .path("/api/session/sign-out")
        .header("authorization", "Bearer partner-token")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(backend.signed_out(), vec!["partner-token".to_string()]);
}

#[tokio::test]
async fn test_high_score_endpoint() {
    let state = setup_app_state(Arc::new(StaticBackend::new())).await;
    let routes = create_routes(state.clone());

    let res = warp::test::request()
        .path("/api/color-compass/high-score")
        .reply(&routes)
        .await;
    let body: HighScoreResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.high_score, 0);

    state.key_values.set(HIGH_SCORE_KEY, "120").await.unwrap();
    let res = warp::test::request()
        .path("/api/color-compass/high-score")
        .reply(&routes)
        .await;
    let body: HighScoreResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.high_score, 120);

    state.key_values.set(HIGH_SCORE_KEY, "garbage").await.unwrap();
    let res = warp::test::request()
        .path("/api/color-compass/high-score")
        .reply(&routes)
        .await;
    let body: HighScoreResponse = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body.high_score, 0);
}

#[tokio::test]
async fn test_websocket_game_flow() {
    let (backend, _) = backend_with_roles();
    let mut state = setup_app_state(Arc::new(backend)).await;
    let mut config = (*state.config).clone();
    config.game_duration_seconds = 1;
    state.config = Arc::new(config);
    let routes = create_routes(state.clone());

    let mut client = warp::test::ws().path("/ws").handshake(routes).await.unwrap();

    // Playing before signing in is refused
    client.send_text(r#""StartGame""#).await;
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("Authentication required"));

    client
        .send_text(r#"{"Authenticate":{"token":"standard-token"}}"#)
        .await;
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("AuthenticationSuccess"));
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("GameStateUpdate"));

    client.send_text(r#""StartGame""#).await;
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("RoundStarted"));
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("\"Playing\""));

    // Not a valid color at all
    client
        .send_text(r##"{"SelectColor":{"color":"#zzzzzz"}}"##)
        .await;
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("Invalid color: #zzzzzz"));

    // A well-formed color that is not on the board costs points like any miss
    client
        .send_text(r##"{"SelectColor":{"color":"#000001"}}"##)
        .await;
    let reply = client.recv().await.unwrap();
    assert!(reply.to_str().unwrap().contains("SelectionResult"));
    assert!(reply.to_str().unwrap().contains("Miss"));

    // A one-second game ends on the first tick
    let game_over = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let reply = client.recv().await.unwrap();
            if reply.to_str().unwrap().contains("GameOver") {
                return reply;
            }
        }
    })
    .await
    .unwrap();
    assert!(game_over.to_str().unwrap().contains("\"final_score\":0"));
    assert_eq!(state.connection_manager.authenticated_count().await, 1);
}
