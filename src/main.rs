use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod models;
mod services;
mod storage;

use config::Config;
use services::{
    auth::AuthService,
    otp::{OtpRecorder, PgOtpRequestLog},
    token::{TokenIssuer, TokenValidator},
    users::{PgUserDirectory, UserDirectory},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub auth: Arc<AuthService>,
    pub validator: Arc<TokenValidator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load();
    tracing::info!("Starting server in {} mode", config.server.environment);

    // Initialize database pool
    let db = storage::postgres::connect(&config.database).await?;
    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    storage::postgres::migrate(&db).await?;
    tracing::info!("Database migrations completed");

    // Wire services with explicit configuration
    let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(db.clone()));
    let recorder = OtpRecorder::new(Arc::new(PgOtpRequestLog::new(db)), &config.otp)?;
    let issuer = TokenIssuer::new(&config.auth)?;
    let auth = AuthService::new(users.clone(), recorder, issuer, &config.otp);

    let state = AppState {
        users,
        auth: Arc::new(auth),
        validator: Arc::new(TokenValidator::new(&config.auth)),
    };

    let app = api::router::build_app(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server exiting");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
