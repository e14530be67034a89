use anyhow::Context;

use flagplane_infra::Config;
use flagplane_infra::storage::PgDatabase;
use flagplane_observability::LogConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flagplane_observability::init(&LogConfig::from_env());

    let config = Config::from_env();
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;

    let db = PgDatabase::connect(url, config.max_connections)
        .await
        .context("failed to connect to postgres")?;
    flagplane_infra::ensure_schema(db.pool())
        .await
        .context("failed to create schema")?;

    tracing::info!("schema is up to date");
    Ok(())
}
