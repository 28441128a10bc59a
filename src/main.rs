use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediadock::backup::scheduler::BackupSchedule;
use mediadock::db;
use mediadock::db::services::{settings_service, template_service};
use mediadock::docker::DockerManager;
use mediadock::server::config::ServerConfig;
use mediadock::version::VERSION;
use mediadock::web::{create_router, AppState};

#[derive(Parser)]
#[command(name = "mediadock", version = VERSION, about = "Self-hosted server management dashboard backend")]
struct Args {
    /// Listen address, overriding LISTEN_ADDRESS.
    #[arg(long)]
    listen: Option<String>,
}

fn init_logging() {
    // JSON to a daily-rotated file, human-readable on stdout.
    let file_appender = tracing_appender::rolling::daily("logs", "mediadock.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for the shutdown signal.");
        return;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let mut config = ServerConfig::from_env();
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }
    let config = Arc::new(config);

    info!(version = VERSION, "Starting MediaDock.");

    let db = db::connect(&config.database_url).await?;
    db::init_schema(&db).await?;
    template_service::seed_templates(&db).await?;

    let docker = match DockerManager::connect() {
        Ok(manager) => match manager.ping().await {
            Ok(()) => {
                info!("Connected to the container engine.");
                Some(Arc::new(manager))
            }
            Err(e) => {
                warn!(error = %e, "Container engine is unreachable, container features disabled.");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "Could not create an engine client, container features disabled.");
            None
        }
    };

    let state = AppState::new(db, docker, config.clone());

    let schedule: BackupSchedule =
        settings_service::get(&state.db, settings_service::BACKUP_SCHEDULE_KEY).await?;
    if schedule.enabled {
        state.scheduler.start(schedule).await;
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, "Listening for dashboard requests.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
