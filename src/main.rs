use medrx::api::{api_router, ApiContext};
use medrx::config::{self, Settings};
use medrx::db::repository::backfill_all_missing_uuids;
use medrx::db::sqlite::open_database;

/// Prescription records REST service.
///
/// # Environment Variables
/// - `MEDRX_DB_PATH`: SQLite database file (default: platform data dir)
/// - `MEDRX_BIND`: listen address (default: "127.0.0.1:8300")
/// - `RUST_LOG`: tracing filter (default: "medrx=info,tower_http=info")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medrx::init_tracing();

    let settings = Settings::from_env()?;
    tracing::info!(
        "{} v{} starting, database {}",
        config::APP_NAME,
        config::APP_VERSION,
        settings.database_path.display()
    );

    // Migrate and backfill once up front so a broken schema fails at startup.
    let conn = open_database(&settings.database_path)?;
    let backfilled = backfill_all_missing_uuids(&conn)?;
    if backfilled > 0 {
        tracing::info!(backfilled, "Assigned UUIDs to existing rows");
    }
    drop(conn);

    let app = api_router(ApiContext::new(settings.database_path.clone()));
    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!("Listening on {}", settings.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
