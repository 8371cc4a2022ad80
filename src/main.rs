use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wrytix::{
    AppState,
    audit::action,
    config::{AppConfig, Env},
    create_router,
    jobs::JobScheduler,
    storage::{JsonFileStore, StoreState},
    workflow::accounts,
};

/// main
///
/// Entry point: configuration, logging, the document store, background jobs and
/// the HTTP server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup. RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wrytix=debug,tower_http=info".into());

    // 3. Pretty logs locally, JSON for log aggregators in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Document store. Opening replays any commit interrupted by a crash.
    let store = JsonFileStore::open(config.data_dir.clone())
        .await
        .expect("FATAL: Failed to open the data directory. Check DATA_DIR.");
    tracing::info!("Document store opened at {}", store.root().display());
    let store = Arc::new(store) as StoreState;

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(store, config);

    if let Some(admin) = app_state.config.bootstrap_admin.clone() {
        match accounts::bootstrap_admin(&app_state.repo, &admin, app_state.config.bcrypt_cost).await {
            Ok(Some(user)) => {
                tracing::info!("Bootstrapped admin account '{}'", user.username);
                app_state
                    .audit
                    .record_system(action::ADMIN_BOOTSTRAPPED, user.username.as_str(), json!({ "userId": user.id }))
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Admin bootstrap failed: {}", e),
        }
    }

    // 6. Background jobs
    Arc::new(JobScheduler::new(app_state.clone())).start();

    // 7. Router and Server Startup
    let app = create_router(app_state.clone());

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    app_state
        .audit
        .record_system(action::SERVER_STARTED, bind_addr.as_str(), json!({}))
        .await;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
