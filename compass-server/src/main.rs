use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use compass_persistence::{
    connection::connect_and_migrate,
    repositories::{KeyValueRepository, ProfileRepository, RoleRepository},
};
use compass_server::{
    AppState,
    auth::AuthService,
    backend::{DatabaseIdentityBackend, HostedIdentityBackend, IdentityBackend},
    config::Config,
    create_routes,
    game_runner::spawn_persister,
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Color Compass server...");

    let config = Arc::new(Config::from_env().inspect_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
    })?);

    // Initialize database connection and run migrations
    let db = connect_and_migrate(&config.database_url)
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
        })?;

    let roles = RoleRepository::new(db.clone());
    let key_values = KeyValueRepository::new(db.clone());

    let backend: Arc<dyn IdentityBackend> = match (&config.backend_url, config.auth_dev_mode) {
        (Some(url), _) => {
            info!("Using hosted identity backend at {}", url);
            Arc::new(HostedIdentityBackend::new(
                url,
                config.backend_anon_key.as_deref().unwrap_or_default(),
            ))
        }
        (None, true) => {
            info!("Starting in development authentication mode - JWT validation disabled");
            Arc::new(DatabaseIdentityBackend::new(
                Arc::new(AuthService::new_dev_mode()),
                roles.clone(),
                ProfileRepository::new(db.clone()),
            ))
        }
        (None, false) => {
            let secret = config
                .jwt_secret
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?;
            Arc::new(DatabaseIdentityBackend::new(
                Arc::new(AuthService::new(secret, config.jwt_audience.clone())),
                roles.clone(),
                ProfileRepository::new(db.clone()),
            ))
        }
    };

    let (writes, persister) = spawn_persister(key_values.clone());
    let connection_manager = Arc::new(ConnectionManager::new());

    let routes = create_routes(AppState {
        config: config.clone(),
        backend,
        connection_manager: connection_manager.clone(),
        roles,
        key_values,
        writes,
    });

    // Start cleanup task
    let cleanup_connection_manager = connection_manager.clone();
    let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            cleanup_connection_manager
                .cleanup_inactive_connections(connection_timeout)
                .await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (config.host.parse::<std::net::IpAddr>()?, config.port);

    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let signals = (
                signal::unix::signal(signal::unix::SignalKind::interrupt()),
                signal::unix::signal(signal::unix::SignalKind::terminate()),
            );
            match signals {
                (Ok(mut sigint), Ok(mut sigterm)) => {
                    tokio::select! {
                        _ = sigint.recv() => {
                            info!("Received SIGINT, shutting down gracefully...");
                        }
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM, shutting down gracefully...");
                        }
                    }
                }
                _ => {
                    tracing::warn!("Signal handlers unavailable, falling back to Ctrl+C");
                    let _ = signal::ctrl_c().await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl+c: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    })?;

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;

    // Routes own the last write sender, so the persister drains once they drop
    if tokio::time::timeout(Duration::from_secs(5), persister).await.is_err() {
        tracing::warn!("Persister did not finish flushing in time");
    }
    info!("Server shutdown complete.");
    Ok(())
}
