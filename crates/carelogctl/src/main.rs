//! carelogctl - operator CLI for carelog attendance records
//!
//! Wires configuration, the selected store adapter and the day protocols
//! together, runs one command and prints the result as JSON.

use anyhow::{Context, Result, bail};
use carelog_config::{Settings, StorageKind, load_config};
use carelog_core::{AttendanceBoard, BulkEdit, StaffMember, WriteOutcome, build_staff_attendance_rows};
use carelog_store::{
    AttendanceRecord, AttendanceStatus, AttendanceStore, DEFAULT_RANGE_TOP, HttpListClient, ListClient, MemoryStore,
    RemoteStore, StaticToken, StoreError, TokenProvider,
};
use carelog_util::{default_config_path, parse_date, today};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// carelogctl - Read and edit staff attendance records
#[derive(Parser, Debug)]
#[command(name = "carelogctl")]
#[command(about = "Read and edit staff attendance records", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/carelog/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Storage kind override: local or remote (or set CARELOG_STORAGE)
    #[arg(long, env = "CARELOG_STORAGE")]
    storage: Option<StorageKind>,

    /// Write gate override (or set CARELOG_WRITES_ENABLED)
    #[arg(long, env = "CARELOG_WRITES_ENABLED")]
    writes_enabled: Option<bool>,

    /// Bearer token for the remote store
    #[arg(long, env = "CARELOG_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON file backing the local store; written back after each write
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one day's records
    List {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// List records between two dates, inclusive
    Range {
        #[arg(long, value_parser = date_arg)]
        from: NaiveDate,
        #[arg(long, value_parser = date_arg)]
        to: NaiveDate,
        /// Page size (default: remote.page_size)
        #[arg(long)]
        top: Option<u32>,
    },
    /// Head count per status for one day
    Count {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// Join a roster file against one day's records
    Rows {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// JSON array of {"staffId", "name"}
        #[arg(long)]
        roster: PathBuf,
    },
    /// Create or update one staff member's record
    Set {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        staff: String,
        #[arg(long)]
        status: AttendanceStatus,
        #[arg(long)]
        note: Option<String>,
        /// RFC 3339 timestamp
        #[arg(long)]
        check_in: Option<DateTime<Utc>>,
    },
    /// Apply one status to many staff members
    Bulk {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// Comma-separated staff ids
        #[arg(long, value_delimiter = ',', required = true)]
        staff: Vec<String>,
        #[arg(long)]
        status: AttendanceStatus,
        /// Blank leaves existing notes alone
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        check_in: Option<DateTime<Utc>>,
    },
    /// Finalize a day
    Finalize {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        by: String,
    },
    /// Clear a day's finalization
    Unfinalize {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// Whether a day is finalized
    Status {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// Delete one record by key (`YYYY-MM-DD#staffId`)
    Remove {
        key: String,
    },
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("Invalid date (expected YYYY-MM-DD): {}", s))
}

/// Local store plus the file it persists to
struct LocalData {
    memory: Arc<MemoryStore>,
    path: PathBuf,
}

impl LocalData {
    fn load(path: &Path) -> Result<Self> {
        let records: Vec<AttendanceRecord> = if path.exists() {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
            serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), count = records.len(), "Local data loaded");
        Ok(Self {
            memory: Arc::new(MemoryStore::with_records(records)),
            path: path.to_path_buf(),
        })
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.memory.snapshot())?;
        std::fs::write(&self.path, json).with_context(|| format!("Failed to write {:?}", self.path))?;
        debug!(path = %self.path.display(), "Local data saved");
        Ok(())
    }
}

/// Load settings, falling back to defaults when the file does not exist
fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        info!(config_path = %path.display(), "No config file, using defaults");
        return Ok(Settings::default());
    }
    let settings = load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    info!(
        config_path = %path.display(),
        storage = %settings.storage.kind,
        writes_enabled = settings.storage.writes_enabled,
        "Configuration loaded"
    );
    Ok(settings)
}

/// Environment and flag overrides win over the file
fn apply_overrides(settings: &mut Settings, storage: Option<StorageKind>, writes_enabled: Option<bool>) {
    if let Some(kind) = storage {
        settings.storage.kind = kind;
    }
    if let Some(enabled) = writes_enabled {
        settings.storage.writes_enabled = enabled;
    }
}

fn open_store(
    settings: &Settings,
    token: Option<String>,
    data: Option<&Path>,
) -> Result<(Arc<dyn AttendanceStore>, Option<LocalData>)> {
    match settings.storage.kind {
        StorageKind::Local => match data {
            Some(path) => {
                let local = LocalData::load(path)?;
                let store: Arc<dyn AttendanceStore> = local.memory.clone();
                Ok((store, Some(local)))
            }
            None => {
                warn!("Local store without --data; changes are discarded on exit");
                Ok((Arc::new(MemoryStore::new()), None))
            }
        },
        StorageKind::Remote => {
            let Some(remote) = &settings.remote else {
                bail!("storage kind is remote but no [remote] section is configured");
            };
            let tokens: Arc<dyn TokenProvider> = Arc::new(match token {
                Some(token) => StaticToken::new(token),
                None => StaticToken::none(),
            });
            let client: Arc<dyn ListClient> =
                Arc::new(HttpListClient::new(&remote.site_url, remote.timeout, tokens)?);
            let store = RemoteStore::new(client, &remote.list_title).with_max_pages(remote.max_pages);

            info!(site = %remote.site_url, list = store.list_title(), "Remote store ready");
            Ok((Arc::new(store), None))
        }
    }
}

/// Attach the user-facing hint to a store error
fn explain(e: StoreError) -> anyhow::Error {
    let hint = e.kind().hint();
    anyhow::Error::new(e).context(hint)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_roster(path: &Path) -> Result<Vec<StaffMember>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read roster {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse roster {:?}", path))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteReport {
    outcome: WriteOutcome,
    board: carelog_core::BoardSnapshot,
}

async fn report_write(board: &AttendanceBoard, outcome: WriteOutcome) -> Result<()> {
    if outcome == WriteOutcome::Skipped {
        warn!(date = %board.date(), "Write skipped: writes disabled or store is read-only");
    }
    print_json(&WriteReport {
        outcome,
        board: board.snapshot().await,
    })
}

async fn run(args: Args) -> Result<()> {
    let mut settings = load_settings(&args.config)?;
    apply_overrides(&mut settings, args.storage, args.writes_enabled);

    let (store, local) = open_store(&settings, args.token, args.data.as_deref())?;
    let writes_enabled = settings.storage.writes_enabled;
    let board_for = |date: Option<NaiveDate>| {
        AttendanceBoard::new(Arc::clone(&store), date.unwrap_or_else(today), writes_enabled)
    };

    let wrote = match args.command {
        Command::List { date } => {
            let records = store.list_by_date(date.unwrap_or_else(today)).await.map_err(explain)?;
            print_json(&records)?;
            false
        }
        Command::Range { from, to, top } => {
            let top = top
                .or(settings.remote.as_ref().map(|r| r.page_size))
                .unwrap_or(DEFAULT_RANGE_TOP);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let records = store
                .list_by_date_range_cancellable(from, to, top, &cancel)
                .await
                .map_err(explain)?;
            print_json(&records)?;
            false
        }
        Command::Count { date } => {
            let counts = store.count_by_date(date.unwrap_or_else(today)).await.map_err(explain)?;
            print_json(&counts)?;
            false
        }
        Command::Rows { date, roster } => {
            let roster = load_roster(&roster)?;
            let records = store.list_by_date(date.unwrap_or_else(today)).await.map_err(explain)?;
            print_json(&build_staff_attendance_rows(&roster, &records))?;
            false
        }
        Command::Set {
            date,
            staff,
            status,
            note,
            check_in,
        } => {
            let board = board_for(date);
            board.reload().await;

            let mut record = board
                .items()
                .await
                .into_iter()
                .find(|r| r.staff_id.as_str() == staff)
                .unwrap_or_else(|| AttendanceRecord::new(staff.as_str(), board.date(), status));
            record.status = status;
            if let Some(note) = note {
                record.note = Some(note);
            }
            if check_in.is_some() {
                record.check_in_at = check_in;
            }

            let outcome = board.upsert_one(&record).await.map_err(explain)?;
            report_write(&board, outcome).await?;
            outcome == WriteOutcome::Saved
        }
        Command::Bulk {
            date,
            staff,
            status,
            note,
            check_in,
        } => {
            let board = board_for(date);
            let mut edit = BulkEdit::new(staff, status).check_in_at(check_in);
            if let Some(note) = note {
                edit = edit.note(note);
            }

            let result = board.apply_bulk(&edit).await;
            // Partial success still persists whatever landed
            if let Some(local) = &local {
                local.save()?;
            }
            let outcome = result.map_err(explain)?;
            report_write(&board, outcome).await?;
            false
        }
        Command::Finalize { date, by } => {
            let board = board_for(date);
            let outcome = board.finalize(&by).await.map_err(explain)?;
            report_write(&board, outcome).await?;
            outcome == WriteOutcome::Saved
        }
        Command::Unfinalize { date } => {
            let board = board_for(date);
            let outcome = board.unfinalize().await.map_err(explain)?;
            report_write(&board, outcome).await?;
            outcome == WriteOutcome::Saved
        }
        Command::Status { date } => {
            let board = board_for(date);
            let finalized = board.is_finalized().await.map_err(explain)?;
            print_json(&serde_json::json!({
                "date": board.date(),
                "finalized": finalized,
            }))?;
            false
        }
        Command::Remove { key } => {
            let date = key
                .split_once(carelog_util::RECORD_KEY_SEPARATOR)
                .and_then(|(date, _)| parse_date(date));
            let board = board_for(date);
            let outcome = board.remove(&key).await.map_err(explain)?;
            report_write(&board, outcome).await?;
            outcome == WriteOutcome::Saved
        }
    };

    if wrote && let Some(local) = &local {
        local.save()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "carelogctl starting");
    if carelog_util::is_mock_time_active() {
        warn!(today = %today(), "Mock time is active; default dates follow CARELOG_MOCK_TIME");
    }

    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, Some(StorageKind::Remote), Some(false));
        assert_eq!(settings.storage.kind, StorageKind::Remote);
        assert!(!settings.storage.writes_enabled);

        let mut untouched = Settings::default();
        apply_overrides(&mut untouched, None, None);
        assert_eq!(untouched.storage.kind, StorageKind::Local);
        assert!(untouched.storage.writes_enabled);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.storage.kind, StorageKind::Local);
        assert!(settings.remote.is_none());
    }

    #[test]
    fn remote_without_section_is_an_error() {
        let mut settings = Settings::default();
        settings.storage.kind = StorageKind::Remote;
        assert!(open_store(&settings, None, None).is_err());
    }

    #[test]
    fn date_arg_accepts_timestamp_prefix() {
        assert_eq!(
            date_arg("2025-04-01T09:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
        assert!(date_arg("April 1st").is_err());
    }

    #[tokio::test]
    async fn local_data_survives_a_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();

        let local = LocalData::load(&path).unwrap();
        local
            .memory
            .upsert(&AttendanceRecord::new("S001", date, AttendanceStatus::OnDuty))
            .await
            .unwrap();
        local.save().unwrap();

        let reloaded = LocalData::load(&path).unwrap();
        let records = reloaded.memory.list_by_date(date).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].staff_id.as_str(), "S001");
    }
}
