use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tmail_server::{
    app,
    auth::{AppState, GithubClient},
    cleanup,
    config::ServerConfig,
    db::PgStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Refuse to start without a usable GitHub OAuth application
    let provider = GithubClient::new(&config.github).expect("GitHub OAuth is not configured");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let app_state = Arc::new(AppState::new(
        Arc::new(PgStore::new(db_pool)),
        Arc::new(provider),
        config.auth,
    ));

    // Purge expired login states now, then periodically
    let login_states = Arc::new(app_state.login_states());
    cleanup::purge_login_states(&login_states).await;
    cleanup::spawn_login_state_cleanup(
        login_states,
        Duration::from_secs(app_state.settings.cleanup_interval_seconds),
    );

    let app = app::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
