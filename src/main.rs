use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendsync::api::router;
use attendsync::client::{ApiConfig, AttendanceHttpClient};
use attendsync::notify;
use attendsync::queue::LocalQueue;
use attendsync::services::{ReconcileScheduler, Reconciler};
use attendsync::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "attendsync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://attendsync.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let (notifier, rx) = notify::channel(256);
    tokio::spawn(notify::run_outbox_worker(pool.clone(), rx));

    // Device mode: when an upstream API is configured, this process also
    // owns a local scan queue and reconciles it on a schedule.
    if std::env::var("ATTENDANCE_API_URL").is_ok() {
        let config = ApiConfig::new_from_env()?;
        let queue_url = std::env::var("QUEUE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://device_queue.db".to_string());
        let teacher_id = std::env::var("TEACHER_ID")?;
        let interval_secs = std::env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let queue_pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&queue_url)
            .await?;
        let queue = LocalQueue::new(queue_pool);
        queue.init().await?;

        let api = Arc::new(AttendanceHttpClient::new(config)?);
        let reconciler = Reconciler::new(api, queue, teacher_id);
        tokio::spawn(ReconcileScheduler::new(reconciler, interval_secs).start());
    }

    let state = AppState {
        db: pool.clone(),
        notifier,
    };

    let app = router(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
