//! Gatehouse - Authentication backend for the site admin area

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::Config;
use gatehouse_api::{create_router, AppState};
use gatehouse_auth::{
    Authenticator, BypassCredential, CookieSettings, EdgeGuard, GuardConfig, RateLimiter,
    RateLimiterConfig, SessionManager,
};
use gatehouse_db::Database;

/// Gatehouse - Authentication backend for the site admin area
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "GATEHOUSE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "GATEHOUSE_PORT")]
    port: Option<u16>,

    /// Emergency bypass account email
    #[arg(long, env = "GATEHOUSE_BYPASS_EMAIL", hide_env_values = true)]
    bypass_email: Option<String>,

    /// Emergency bypass account password
    #[arg(long, env = "GATEHOUSE_BYPASS_PASSWORD", hide_env_values = true)]
    bypass_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level);

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    if config.auth.jwt_secret == "change-me-in-production" {
        warn!("Using the default JWT secret; set [auth].jwt_secret before going live");
    }

    // Create the data directory for the database file
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Initialize database
    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path).await?;

    // Create default super-admin if no accounts exist
    if !db.has_users().await? {
        info!("Creating default super-admin account");
        let password_hash = gatehouse_auth::hash_password("admin")?;
        db.insert_user(gatehouse_db::NewUser {
            email: "admin@localhost".to_string(),
            name: Some("Administrator".to_string()),
            password_hash: Some(password_hash),
            role: gatehouse_db::Role::SuperAdmin,
        })
        .await?;
        warn!("Default account created (admin@localhost / admin); change the password immediately");
    }

    // Initialize the login rate limiter and its background sweep
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        max_attempts: config.rate_limit.max_attempts,
        lockout_secs: config.rate_limit.lockout_secs,
        window_secs: config.rate_limit.window_secs,
    }));
    let _reclaimer =
        limiter.spawn_reclaimer(Duration::from_secs(config.rate_limit.cleanup_interval_secs));

    // Initialize session management
    let sessions = Arc::new(SessionManager::new(
        &config.auth.jwt_secret,
        config.auth.session_max_age_secs,
        config.auth.session_update_age_secs,
    ));
    let cookie = CookieSettings {
        secure: config.auth.cookie_secure,
        max_age_secs: config.auth.session_max_age_secs,
    };

    // Optional emergency bypass account, supplied via environment
    let bypass = match (args.bypass_email, args.bypass_password) {
        (Some(email), Some(password)) => Some(BypassCredential { email, password }),
        (Some(_), None) | (None, Some(_)) => {
            warn!("Ignoring partial bypass credential; both email and password are required");
            None
        }
        (None, None) => None,
    };

    let authenticator = Arc::new(Authenticator::new(db.clone(), limiter, bypass));

    // Create application state
    let state = AppState::new(db, authenticator, sessions.clone(), cookie);

    // Edge guard for the protected path prefixes
    let guard = EdgeGuard {
        sessions,
        config: GuardConfig {
            protected_prefixes: config.auth.protected_prefixes.clone(),
            sign_in_path: config.auth.sign_in_path.clone(),
            public_landing_path: config.auth.public_landing_path.clone(),
        },
        cookie,
    };

    // Create router
    let app = create_router(state, guard).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
