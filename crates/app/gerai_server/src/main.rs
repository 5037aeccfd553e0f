//! Gerai API server binary.
//!
//! Resolves configuration from CLI/env, runs migrations, and serves the
//! API. In production every token and setup secret must be configured
//! or startup fails.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "gerai_server", about = "Gerai storefront auth API server")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3400")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/gerai"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gerai_api=debug,gerai_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!(database_url = %args.database_url, bind = %args.bind, "starting gerai_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    gerai_api::migrate(&pool).await?;

    // Fatal here when production secrets are missing or malformed.
    let mut config = gerai_api::config::ApiConfig::from_env()?;
    config.bind_addr = args.bind;
    config.database_url = args.database_url;

    let state = gerai_api::AppState {
        pool,
        config: config.clone(),
    };
    let app = gerai_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "gerai API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
