#![allow(non_snake_case)]

mod config;

use axum::Router;
use portal_api::middleware::auth::AppState;
use portal_auth::{hash_password, resolve_secret, RunMode, StaticAccounts, TokenService};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // PHC string for an `[[auth.accounts]]` entry
    if let Some(idx) = args.iter().position(|a| a == "--hash-password") {
        match args.get(idx + 1).map(|p| hash_password(p)) {
            Some(Ok(hash)) => println!("{hash}"),
            Some(Err(e)) => {
                eprintln!("failed to hash password: {e}");
                std::process::exit(1);
            }
            None => eprintln!("usage: portal-server --hash-password <password>"),
        }
        return;
    }

    let Some(configPath) = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|idx| args.get(idx + 1))
        .cloned()
    else {
        eprintln!("usage: portal-server --config <path> | --hash-password <password>");
        std::process::exit(2);
    };

    let mut appConfig = config::load(&configPath);
    config::apply_env(&mut appConfig, |key| std::env::var(key).ok());
    tracing::info!(
        "loaded config from {configPath}: bind={}:{} mode={:?}",
        appConfig.server.bind,
        appConfig.server.port,
        appConfig.auth.mode
    );

    let secret = match resolve_secret(appConfig.auth.secret.as_deref(), appConfig.auth.mode) {
        Ok(secret) => secret,
        Err(e) => {
            tracing::error!("refusing to start: {e}");
            std::process::exit(1);
        }
    };

    let accounts = StaticAccounts::new(appConfig.auth.accounts.clone());
    if accounts.is_empty() {
        tracing::warn!("no accounts configured, every login will be rejected");
    }

    let mut appState = AppState::new(TokenService::new(secret), accounts);
    appState.secure_cookies = appConfig.auth.mode == RunMode::Production;

    let app = Router::new()
        .merge(portal_api::api_router(appState))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", appConfig.server.bind, appConfig.server.port);
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server exited with error");
}
