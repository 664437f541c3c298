//! JSON snapshot backups: manual and scheduled creation, listing,
//! retention, upload/download and destructive restore.
//!
//! Backup files live flat in one directory and are named
//! `<prefix>_backup_<YYYYmmdd_HHMMSS>.json`, with a `_<n>` counter added
//! when that name is taken. Scheduled runs use the `auto` prefix, and only
//! those are subject to retention. Existing files are never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use stockroom_core::access::Principal;
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::backup::{BackupInfo, BackupSnapshot, SNAPSHOT_FORMAT_VERSION};
use stockroom_core::repository::BackupRepository;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::gate::StoreGate;
use crate::guard::require_admin;

pub const AUTO_PREFIX: &str = "auto";
pub const MANUAL_PREFIX: &str = "manual";
const EXTENSION: &str = ".json";

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// When automatic backups run. All times are UTC; `weekday` 0 is Monday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum BackupSchedule {
    #[default]
    Disabled,
    Hourly { minute: u32 },
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: u32, hour: u32, minute: u32 },
}

impl BackupSchedule {
    pub fn validate(&self) -> StockroomResult<()> {
        let (weekday, hour, minute) = match *self {
            BackupSchedule::Disabled => return Ok(()),
            BackupSchedule::Hourly { minute } => (0, 0, minute),
            BackupSchedule::Daily { hour, minute } => (0, hour, minute),
            BackupSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => (weekday, hour, minute),
        };
        if weekday > 6 || hour > 23 || minute > 59 {
            return Err(StockroomError::Validation {
                message: format!(
                    "invalid backup schedule: weekday {weekday}, hour {hour}, minute {minute}"
                ),
            });
        }
        Ok(())
    }

    /// The first firing time strictly after `now`. `None` when disabled
    /// or out of range.
    pub fn next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let at = |date: NaiveDate, hour: u32, minute: u32| {
            date.and_hms_opt(hour, minute, 0).map(|t| t.and_utc())
        };

        match *self {
            BackupSchedule::Disabled => None,
            BackupSchedule::Hourly { minute } => {
                let candidate = at(today, now.hour(), minute)?;
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::hours(1)
                })
            }
            BackupSchedule::Daily { hour, minute } => {
                let candidate = at(today, hour, minute)?;
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::days(1)
                })
            }
            BackupSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => {
                if weekday > 6 {
                    return None;
                }
                let current = today.weekday().num_days_from_monday();
                let ahead = (weekday + 7 - current) % 7;
                let candidate = at(today, hour, minute)? + ChronoDuration::days(ahead.into());
                Some(if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::days(7)
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// Number of automatic backups kept after each scheduled run.
    pub retention: usize,
    pub schedule: BackupSchedule,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
            retention: 10,
            schedule: BackupSchedule::Disabled,
        }
    }
}

fn io_error(context: &str, path: &Path, err: std::io::Error) -> StockroomError {
    StockroomError::Backup(format!("{context} {}: {err}", path.display()))
}

/// A backup name must be a bare `*.json` file name.
pub fn validate_backup_name(name: &str) -> StockroomResult<()> {
    let stem = name.strip_suffix(EXTENSION).unwrap_or_default();
    let valid = !stem.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..");
    if !valid {
        return Err(StockroomError::Validation {
            message: format!("invalid backup file name: {name}"),
        });
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> StockroomResult<()> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(StockroomError::Validation {
            message: format!("invalid backup prefix: {prefix}"),
        });
    }
    Ok(())
}

pub fn backup_file_name(prefix: &str, at: DateTime<Utc>, attempt: u32) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    match attempt {
        0 => format!("{prefix}_backup_{stamp}{EXTENSION}"),
        n => format!("{prefix}_backup_{stamp}_{n}{EXTENSION}"),
    }
}

async fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn write_all(mut file: File, path: &Path, bytes: &[u8]) -> StockroomResult<()> {
    file.write_all(bytes)
        .await
        .map_err(|e| io_error("cannot write", path, e))?;
    file.flush()
        .await
        .map_err(|e| io_error("cannot write", path, e))
}

/// Backup files in `BackupConfig::dir` and restores from them.
pub struct BackupService<B> {
    backups: B,
    config: BackupConfig,
    gate: StoreGate,
}

impl<B: BackupRepository> BackupService<B> {
    pub fn new(backups: B, config: BackupConfig, gate: StoreGate) -> Self {
        Self {
            backups,
            config,
            gate,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn path_of(&self, name: &str) -> StockroomResult<PathBuf> {
        validate_backup_name(name)?;
        Ok(self.config.dir.join(name))
    }

    /// Write a snapshot of the whole store to a new file.
    pub async fn create_backup(
        &self,
        principal: &Principal,
        prefix: &str,
    ) -> StockroomResult<BackupInfo> {
        require_admin(principal)?;
        self.write_backup(prefix).await
    }

    /// A scheduled run: write an `auto` backup, then apply retention.
    pub async fn run_auto_backup(&self) -> StockroomResult<BackupInfo> {
        let info = self.write_backup(AUTO_PREFIX).await?;
        self.cleanup_old_backups(self.config.retention).await?;
        Ok(info)
    }

    async fn write_backup(&self, prefix: &str) -> StockroomResult<BackupInfo> {
        validate_prefix(prefix)?;
        let snapshot = {
            let _store = self.gate.shared().await;
            self.backups.export_snapshot().await?
        };

        let dir = &self.config.dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error("cannot create", dir, e))?;

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StockroomError::Backup(format!("cannot encode snapshot: {e}")))?;

        let mut attempt = 0;
        let (filename, path, file) = loop {
            let filename = backup_file_name(prefix, snapshot.taken_at, attempt);
            let path = dir.join(&filename);
            match create_new(&path).await {
                Ok(file) => break (filename, path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(io_error("cannot create", &path, e)),
            }
        };
        write_all(file, &path, &bytes).await?;

        info!(
            file = %filename,
            users = snapshot.users.len(),
            resources = snapshot.resources.len(),
            items = snapshot.items.len(),
            "Backup written"
        );
        self.info_for(&path, filename).await
    }

    async fn info_for(&self, path: &Path, filename: String) -> StockroomResult<BackupInfo> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error("cannot stat", path, e))?;
        let modified = meta
            .modified()
            .map_err(|e| io_error("cannot stat", path, e))?;
        Ok(BackupInfo {
            filename,
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        })
    }

    /// Every backup file, newest first.
    async fn scan(&self) -> StockroomResult<Vec<BackupInfo>> {
        let dir = &self.config.dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("cannot read", dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("cannot read", dir, e))?
        {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !filename.ends_with(EXTENSION) {
                continue;
            }
            let path = entry.path();
            if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                continue;
            }
            found.push(self.info_for(&path, filename).await?);
        }

        found.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(found)
    }

    pub async fn list_backups(&self, principal: &Principal) -> StockroomResult<Vec<BackupInfo>> {
        require_admin(principal)?;
        self.scan().await
    }

    pub async fn delete_backup(&self, principal: &Principal, name: &str) -> StockroomResult<()> {
        require_admin(principal)?;
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %name, by = %principal.username, "Backup deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StockroomError::not_found("backup", name))
            }
            Err(e) => Err(io_error("cannot delete", &path, e)),
        }
    }

    async fn read_snapshot(&self, name: &str) -> StockroomResult<BackupSnapshot> {
        let path = self.path_of(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StockroomError::not_found("backup", name));
            }
            Err(e) => return Err(io_error("cannot read", &path, e)),
        };
        decode_snapshot(&bytes)
    }

    /// Raw contents of a backup file.
    pub async fn download_backup(
        &self,
        principal: &Principal,
        name: &str,
    ) -> StockroomResult<Vec<u8>> {
        require_admin(principal)?;
        let path = self.path_of(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StockroomError::not_found("backup", name))
            }
            Err(e) => Err(io_error("cannot read", &path, e)),
        }
    }

    /// Store an externally produced snapshot so it can be restored later.
    /// The contents must decode as a snapshot this build understands, and
    /// the name must not already be taken.
    pub async fn upload_backup(
        &self,
        principal: &Principal,
        name: &str,
        bytes: &[u8],
    ) -> StockroomResult<BackupInfo> {
        require_admin(principal)?;
        let path = self.path_of(name)?;
        decode_snapshot(bytes)?;

        let dir = &self.config.dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error("cannot create", dir, e))?;
        let file = match create_new(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StockroomError::AlreadyExists {
                    entity: format!("backup {name}"),
                });
            }
            Err(e) => return Err(io_error("cannot create", &path, e)),
        };
        write_all(file, &path, bytes).await?;
        info!(file = %name, by = %principal.username, "Backup uploaded");
        self.info_for(&path, name.to_string()).await
    }

    /// Replace the store's contents with a backup.
    ///
    /// Every other request waits until the restore has finished. The
    /// reserved admin account survives.
    pub async fn restore_backup(&self, principal: &Principal, name: &str) -> StockroomResult<()> {
        require_admin(principal)?;
        let snapshot = self.read_snapshot(name).await?;

        let _exclusive = self.gate.exclusive().await;
        warn!(file = %name, by = %principal.username, "Restoring backup");
        self.backups.restore_snapshot(snapshot).await?;
        info!(file = %name, "Backup restored");
        Ok(())
    }

    /// Keep the newest `keep` automatic backups and delete the rest.
    /// Returns how many files were removed.
    pub async fn cleanup_old_backups(&self, keep: usize) -> StockroomResult<usize> {
        let auto = format!("{AUTO_PREFIX}_");
        let expired: Vec<BackupInfo> = self
            .scan()
            .await?
            .into_iter()
            .filter(|b| b.filename.starts_with(&auto))
            .skip(keep)
            .collect();

        for backup in &expired {
            let path = self.config.dir.join(&backup.filename);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| io_error("cannot delete", &path, e))?;
            info!(file = %backup.filename, "Expired backup removed");
        }
        Ok(expired.len())
    }
}

fn decode_snapshot(bytes: &[u8]) -> StockroomResult<BackupSnapshot> {
    let snapshot: BackupSnapshot = serde_json::from_slice(bytes)
        .map_err(|e| StockroomError::Backup(format!("not a valid snapshot: {e}")))?;
    if snapshot.version > SNAPSHOT_FORMAT_VERSION {
        return Err(StockroomError::Validation {
            message: format!(
                "snapshot format {} is newer than supported format {SNAPSHOT_FORMAT_VERSION}",
                snapshot.version
            ),
        });
    }
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Job {
    schedule: BackupSchedule,
    handle: Option<JoinHandle<()>>,
}

/// Runs automatic backups in a background task. At most one job is
/// active; starting a new schedule replaces the old one.
pub struct BackupScheduler<B> {
    service: Arc<BackupService<B>>,
    job: Mutex<Job>,
    last_run: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl<B> BackupScheduler<B>
where
    B: BackupRepository + 'static,
{
    pub fn new(service: Arc<BackupService<B>>) -> Self {
        Self {
            service,
            job: Mutex::new(Job {
                schedule: BackupSchedule::Disabled,
                handle: None,
            }),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the job for `schedule`, replacing any running one.
    pub async fn start(&self, schedule: BackupSchedule) -> StockroomResult<()> {
        schedule.validate()?;
        let mut job = self.job.lock().await;
        if let Some(handle) = job.handle.take() {
            handle.abort();
        }
        job.schedule = schedule;

        if schedule == BackupSchedule::Disabled {
            info!("Automatic backups disabled");
            return Ok(());
        }

        let service = Arc::clone(&self.service);
        let last_run = Arc::clone(&self.last_run);
        job.handle = Some(tokio::spawn(async move {
            while let Some(next) = schedule.next_run(Utc::now()) {
                info!(next_run = %next, "Next automatic backup scheduled");
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;
                run_once(&service, &last_run).await;
            }
        }));
        info!(?schedule, "Backup scheduler started");
        Ok(())
    }

    /// Admin-facing change of schedule.
    pub async fn reschedule(
        &self,
        principal: &Principal,
        schedule: BackupSchedule,
    ) -> StockroomResult<()> {
        require_admin(principal)?;
        self.start(schedule).await
    }

    /// Run one automatic backup right away, outside the schedule.
    pub async fn trigger_now(&self, principal: &Principal) -> StockroomResult<BackupInfo> {
        require_admin(principal)?;
        let info = self.service.run_auto_backup().await?;
        *self.last_run.lock().await = Some(Utc::now());
        Ok(info)
    }

    pub async fn schedule(&self) -> BackupSchedule {
        self.job.lock().await.schedule
    }

    pub async fn next_run(&self) -> Option<DateTime<Utc>> {
        self.schedule().await.next_run(Utc::now())
    }

    pub async fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock().await
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.job.lock().await.handle.take() {
            handle.abort();
            info!("Backup scheduler stopped");
        }
    }
}

async fn run_once<B: BackupRepository>(
    service: &BackupService<B>,
    last_run: &Mutex<Option<DateTime<Utc>>>,
) {
    info!("Automatic backup started");
    match service.run_auto_backup().await {
        Ok(backup) => {
            *last_run.lock().await = Some(Utc::now());
            info!(file = %backup.filename, size = backup.size, "Automatic backup completed");
        }
        Err(e) => error!(error = %e, "Automatic backup failed"),
    }
}
