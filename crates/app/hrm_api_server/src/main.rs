//! HRM mobile auth API server binary.

use std::sync::Arc;

use clap::Parser;
use hrm_api::config::ApiConfig;
use hrm_core::mobile::{MobileAuthService, MobileStores, PgMobileStore};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server. Flags override the environment.
#[derive(Parser, Debug)]
#[command(name = "hrm_api_server", about = "HRM mobile auth API server")]
struct Args {
    /// Address to listen on, as host:port (port 0 = ephemeral).
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hrm_api=debug,hrm_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    // A missing signing secret stops the process here, before any request.
    let mut config = ApiConfig::from_env()?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }
    info!(mobile = ?config.mobile, "mobile auth configured");

    info!(
        max_connections = args.max_connections,
        "configuring connection pool"
    );
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    hrm_api::migrate(&pool).await?;

    let store = Arc::new(PgMobileStore::new(pool));
    let mobile = MobileAuthService::new(config.mobile.clone(), MobileStores::shared(store))?;

    let state = hrm_api::AppState {
        config: config.clone(),
        mobile,
    };
    let app = hrm_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
