//! Backup and restore: whole-archive `.tar.gz` snapshots of the database
//! file, storage volumes and container configurations.
//!
//! Archives are self-describing: a `manifest.json` at the root records what
//! was included and where each volume came from, so restore never guesses
//! paths. No lock is held while the archive is written; a snapshot taken
//! under concurrent writes may be torn.

pub mod scheduler;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode backup manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Restore I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backup archive is invalid: {0}")]
    InvalidArchive(String),
}

/// One completed archive, derived from the filesystem on every listing.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    pub created: DateTime<Utc>,
}

/// A directory to snapshot under `volumes/<name>` in the archive.
#[derive(Debug, Clone)]
pub struct VolumeSource {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct BackupRequest {
    pub include_database: bool,
    pub include_volumes: bool,
    pub include_containers: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    created_at: DateTime<Utc>,
    database_file: Option<String>,
    volumes: Vec<ManifestVolume>,
    containers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestVolume {
    name: String,
    origin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreSummary {
    pub database_restored: bool,
    pub volumes_restored: usize,
}

/// Owns the backup directory and the database file location. All methods are
/// blocking; callers run them on a blocking task.
#[derive(Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    database_path: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: PathBuf, database_path: PathBuf) -> Self {
        Self {
            backup_dir,
            database_path,
        }
    }

    /// Same database file, different target directory.
    pub fn with_backup_dir(&self, backup_dir: PathBuf) -> Self {
        Self {
            backup_dir,
            database_path: self.database_path.clone(),
        }
    }

    /// Writes one `backup_<timestamp>.tar.gz` into the backup directory.
    /// `container_configs` are `(container_id, inspect JSON)` pairs stored
    /// under `configs/` so a lost host can be rebuilt by hand.
    pub fn create_backup(
        &self,
        request: &BackupRequest,
        volumes: &[VolumeSource],
        container_configs: &[(String, serde_json::Value)],
    ) -> Result<BackupRecord, BackupError> {
        fs::create_dir_all(&self.backup_dir)?;
        let created_at = Utc::now();
        let filename = format!("backup_{}.tar.gz", created_at.format("%Y%m%d_%H%M%S"));
        let archive_path = self.backup_dir.join(&filename);

        let file = File::create(&archive_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut manifest = Manifest {
            created_at,
            database_file: None,
            volumes: Vec::new(),
            containers: Vec::new(),
        };

        if request.include_database && self.database_path.is_file() {
            let db_name = self
                .database_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "database.db".to_string());
            builder.append_path_with_name(&self.database_path, format!("database/{db_name}"))?;
            manifest.database_file = Some(db_name);
        }

        if request.include_volumes {
            for volume in volumes {
                if !volume.path.is_dir() {
                    warn!(volume = %volume.name, path = %volume.path.display(), "Skipping missing volume directory.");
                    continue;
                }
                builder.append_dir_all(format!("volumes/{}", volume.name), &volume.path)?;
                manifest.volumes.push(ManifestVolume {
                    name: volume.name.clone(),
                    origin: volume.path.to_string_lossy().to_string(),
                });
            }
        }

        if request.include_containers {
            for (id, config) in container_configs {
                let bytes = serde_json::to_vec_pretty(config)?;
                let mut header = tar::Header::new_gnu();
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(
                    &mut header,
                    format!("configs/{id}.json"),
                    bytes.as_slice(),
                )?;
                manifest.containers.push(id.clone());
            }
        }

        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest_bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "manifest.json", manifest_bytes.as_slice())?;

        let encoder = builder.into_inner()?;
        let mut file = encoder.finish()?;
        file.flush()?;

        let size_bytes = fs::metadata(&archive_path)?.len();
        info!(archive = %archive_path.display(), size_bytes, "Backup archive written.");
        Ok(BackupRecord {
            filename,
            path: archive_path.to_string_lossy().to_string(),
            size_bytes,
            created: created_at,
        })
    }

    /// Scans the backup directory for `backup_*.tar.gz`, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("backup_") || !name.ends_with(".tar.gz") {
                continue;
            }
            let metadata = entry.metadata()?;
            let created = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            records.push(BackupRecord {
                filename: name,
                path: entry.path().to_string_lossy().to_string(),
                size_bytes: metadata.len(),
                created,
            });
        }
        records.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(records)
    }

    /// Deletes archives older than `retention_days`, returning how many were
    /// removed. Age comes from the timestamp baked into the filename, not
    /// from file metadata, so copied archives keep their real age.
    pub fn prune_backups(&self, retention_days: i64) -> Result<usize, BackupError> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let mut removed = 0;
        for record in self.list_backups()? {
            let Some(created) = archive_timestamp(&record.filename) else {
                continue;
            };
            if created < cutoff {
                fs::remove_file(&record.path)?;
                info!(archive = %record.filename, "Pruned expired backup archive.");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Unpacks an archive and overwrites the database file and every volume
    /// directory at the origin recorded in the manifest. Destructive and
    /// irreversible; whole-archive only.
    pub fn restore_backup(&self, archive_path: &Path) -> Result<RestoreSummary, RestoreError> {
        if !archive_path.is_file() {
            return Err(RestoreError::InvalidArchive(format!(
                "No such backup archive: {}",
                archive_path.display()
            )));
        }

        let staging = std::env::temp_dir().join(format!("mediadock-restore-{}", Uuid::new_v4()));
        fs::create_dir_all(&staging)?;
        let result = self.restore_from_staging(archive_path, &staging);
        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %e, "Failed to clean restore staging directory.");
        }
        result
    }

    fn restore_from_staging(
        &self,
        archive_path: &Path,
        staging: &Path,
    ) -> Result<RestoreSummary, RestoreError> {
        let file = File::open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.unpack(staging)?;

        let manifest_path = staging.join("manifest.json");
        let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).map_err(
            |_| RestoreError::InvalidArchive("Archive has no manifest.json".to_string()),
        )?)
        .map_err(|e| RestoreError::InvalidArchive(e.to_string()))?;

        let mut database_restored = false;
        if let Some(db_name) = &manifest.database_file {
            let staged_db = staging.join("database").join(db_name);
            if !staged_db.is_file() {
                return Err(RestoreError::InvalidArchive(format!(
                    "Manifest names database file '{db_name}' but the archive lacks it"
                )));
            }
            if let Some(parent) = self.database_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&staged_db, &self.database_path)?;
            database_restored = true;
        }

        let mut volumes_restored = 0;
        for volume in &manifest.volumes {
            let staged = staging.join("volumes").join(&volume.name);
            if !staged.is_dir() {
                return Err(RestoreError::InvalidArchive(format!(
                    "Manifest names volume '{}' but the archive lacks it",
                    volume.name
                )));
            }
            let origin = PathBuf::from(&volume.origin);
            copy_dir_all(&staged, &origin)?;
            volumes_restored += 1;
        }

        info!(archive = %archive_path.display(), database_restored, volumes_restored, "Backup restored.");
        Ok(RestoreSummary {
            database_restored,
            volumes_restored,
        })
    }
}

/// Parses `backup_YYYYmmdd_HHMMSS.tar.gz` back into its creation time.
fn archive_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename
        .strip_prefix("backup_")?
        .strip_suffix(".tar.gz")?;
    chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> BackupRequest {
        BackupRequest {
            include_database: true,
            include_volumes: true,
            include_containers: true,
        }
    }

    fn fixture() -> (tempfile::TempDir, BackupManager, VolumeSource) {
        let root = tempfile::tempdir().expect("tempdir");
        let db_path = root.path().join("mediadock.db");
        fs::write(&db_path, b"sqlite-bytes-v1").expect("db file");

        let volume_dir = root.path().join("media");
        fs::create_dir_all(volume_dir.join("movies")).expect("volume dirs");
        fs::write(volume_dir.join("movies/list.txt"), b"heat\n").expect("volume file");

        let manager = BackupManager::new(root.path().join("backups"), db_path);
        let volume = VolumeSource {
            name: "media".to_string(),
            path: volume_dir,
        };
        (root, manager, volume)
    }

    #[test]
    fn backup_then_list_finds_the_archive() {
        let (_root, manager, volume) = fixture();
        let configs = vec![(
            "abc123def456".to_string(),
            serde_json::json!({"Name": "/jellyfin"}),
        )];
        let record = manager
            .create_backup(&full_request(), &[volume], &configs)
            .expect("backup");
        assert!(record.filename.starts_with("backup_"));
        assert!(record.size_bytes > 0);

        let listed = manager.list_backups().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, record.filename);
    }

    #[test]
    fn restore_overwrites_database_and_volumes() {
        let (root, manager, volume) = fixture();
        let record = manager
            .create_backup(&full_request(), &[volume.clone()], &[])
            .expect("backup");

        // Corrupt the live state, then restore the snapshot.
        fs::write(root.path().join("mediadock.db"), b"corrupted").expect("overwrite db");
        fs::remove_dir_all(&volume.path).expect("drop volume");

        let summary = manager
            .restore_backup(Path::new(&record.path))
            .expect("restore");
        assert!(summary.database_restored);
        assert_eq!(summary.volumes_restored, 1);

        let db = fs::read(root.path().join("mediadock.db")).expect("db");
        assert_eq!(db, b"sqlite-bytes-v1");
        let listing = fs::read(volume.path.join("movies/list.txt")).expect("volume file");
        assert_eq!(listing, b"heat\n");
    }

    #[test]
    fn empty_backup_dir_lists_nothing() {
        let (_root, manager, _volume) = fixture();
        assert!(manager.list_backups().expect("list").is_empty());
    }

    #[test]
    fn restoring_a_missing_archive_is_invalid() {
        let (_root, manager, _volume) = fixture();
        assert!(matches!(
            manager.restore_backup(Path::new("/no/such/backup.tar.gz")),
            Err(RestoreError::InvalidArchive(_))
        ));
    }

    #[test]
    fn pruning_removes_only_expired_archives() {
        let (_root, manager, volume) = fixture();
        let fresh = manager
            .create_backup(&full_request(), &[volume], &[])
            .expect("backup");

        // An archive dated well past any sane retention window.
        let stale = manager.backup_dir.join("backup_20200101_020000.tar.gz");
        fs::write(&stale, b"gz-bytes").expect("stale archive");
        // Unrecognized names are never touched.
        let foreign = manager.backup_dir.join("notes.txt");
        fs::write(&foreign, b"keep me").expect("foreign file");

        let removed = manager.prune_backups(7).expect("prune");
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());

        let listed = manager.list_backups().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, fresh.filename);
    }

    #[test]
    fn archive_timestamps_parse_from_filenames() {
        let ts = archive_timestamp("backup_20260829_143000.tar.gz").expect("timestamp");
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2026-08-29 14:30");
        assert!(archive_timestamp("backup_garbage.tar.gz").is_none());
        assert!(archive_timestamp("snapshot.tar.gz").is_none());
    }

    #[test]
    fn database_can_be_excluded() {
        let (_root, manager, volume) = fixture();
        let request = BackupRequest {
            include_database: false,
            include_volumes: true,
            include_containers: false,
        };
        let record = manager
            .create_backup(&request, &[volume.clone()], &[])
            .expect("backup");

        let summary = manager
            .restore_backup(Path::new(&record.path))
            .expect("restore");
        assert!(!summary.database_restored);
        assert_eq!(summary.volumes_restored, 1);
    }
}
