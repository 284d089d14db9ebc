use anyhow::Context;
use termin::{config::Config, db, router, state::AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = db::connect(&config.database_url)
        .await
        .context("failed to connect to db")?;
    db::init_schema(&pool)
        .await
        .context("failed to create tables")?;

    let addr = format!("0.0.0.0:{}", config.port);
    let app = router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
