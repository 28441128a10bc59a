use std::env;
use std::path::PathBuf;

use tracing::warn;

const DEFAULT_DATABASE_URL: &str = "sqlite://mediadock.db?mode=rwc";
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct ServerConfig {
    pub listen_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub backup_dir: PathBuf,
    pub monitor_interval_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET is not set, using an insecure development default.");
            "mediadock-dev-secret".to_string()
        });

        let monitor_interval_secs = env::var("MONITOR_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MONITOR_INTERVAL_SECS);

        ServerConfig {
            listen_address: env::var("LISTEN_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDRESS.to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            backup_dir: env::var("BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKUP_DIR)),
            monitor_interval_secs,
        }
    }

    /// Filesystem path of the SQLite database file, for backup and restore.
    pub fn database_file_path(&self) -> PathBuf {
        let trimmed = self
            .database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.database_url);
        let without_params = trimmed.split('?').next().unwrap_or(trimmed);
        PathBuf::from(without_params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_file_path_strips_scheme_and_params() {
        let config = ServerConfig {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            database_url: "sqlite:///data/mediadock.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            backup_dir: PathBuf::from("backups"),
            monitor_interval_secs: 30,
        };
        assert_eq!(
            config.database_file_path(),
            PathBuf::from("/data/mediadock.db")
        );
    }
}
