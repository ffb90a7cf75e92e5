//! Day-rotated audit log writer (`spec.md` §6). The event stream this
//! produces is consumed by separate tooling, so the on-disk format is
//! fixed, not an implementation detail: `<log_name>-YYYY-MM-DD`, one file
//! per UTC day, a `SchemaVersion=<n>` header, `<event_type> <event_name>
//! <agent_version> HH:MM:SS` body lines, and an `AuditSent=<offset>`
//! footer appended once the file has been shipped.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use sa_domain::config::AuditConfig;
use sa_domain::{Error, Result};

pub const EVENT_TELEMETRY: &str = "agent_telemetry";
pub const EVENT_UPDATE_RESULT: &str = "agent_update_result";

pub struct AuditLog {
    dir: PathBuf,
    log_name: String,
    schema_version: u32,
    retention_days: u32,
    agent_version: String,
}

impl AuditLog {
    pub fn new(config: &AuditConfig, agent_version: impl Into<String>) -> Result<Self> {
        std::fs::create_dir_all(&config.dir).map_err(Error::Io)?;
        Ok(Self {
            dir: config.dir.clone(),
            log_name: config.log_name.clone(),
            schema_version: config.schema_version,
            retention_days: config.retention_days,
            agent_version: agent_version.into(),
        })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}", self.log_name, date.format("%Y-%m-%d")))
    }

    fn today_path(&self) -> PathBuf {
        self.path_for(Utc::now().date_naive())
    }

    /// Append one event line to today's file, creating it (with the
    /// `SchemaVersion` header) on first write of the day.
    pub fn record(&self, event_type: &str, event_name: &str) -> Result<()> {
        let path = self.today_path();
        let is_new = !path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;

        if is_new {
            writeln!(file, "SchemaVersion={}", self.schema_version).map_err(Error::Io)?;
        }

        let now = Utc::now();
        writeln!(
            file,
            "{event_type} {event_name} {} {}",
            self.agent_version,
            now.format("%H:%M:%S")
        )
        .map_err(Error::Io)?;
        Ok(())
    }

    pub fn record_telemetry(&self, event_name: &str) -> Result<()> {
        self.record(EVENT_TELEMETRY, event_name)
    }

    pub fn record_update_result(&self, event_name: &str) -> Result<()> {
        self.record(EVENT_UPDATE_RESULT, event_name)
    }

    /// Append an `AuditSent=<9-digit zero-padded byte offset>` footer to
    /// `path`, marking the file shipped up to `bytes_sent`. Called by the
    /// (external) shipping collaborator after a successful upload.
    pub fn mark_sent(path: &Path, bytes_sent: u64) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(Error::Io)?;
        writeln!(file, "AuditSent={bytes_sent:09}").map_err(Error::Io)?;
        Ok(())
    }

    /// Read the last `AuditSent=` offset recorded in `path`, if any.
    pub fn last_sent_offset(path: &Path) -> Result<Option<u64>> {
        let mut contents = String::new();
        let mut file = File::open(path).map_err(Error::Io)?;
        file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
        file.read_to_string(&mut contents).map_err(Error::Io)?;

        Ok(contents
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix("AuditSent="))
            .and_then(|digits| digits.parse::<u64>().ok()))
    }

    /// Delete audit files older than `retention_days`, keyed off the date
    /// encoded in the file name rather than filesystem mtime (the name is
    /// the source of truth for "which UTC day does this belong to").
    pub fn prune_expired(&self) -> Result<usize> {
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(self.retention_days as i64);
        let mut removed = 0usize;
        let prefix = format!("{}-", self.log_name);

        for entry in std::fs::read_dir(&self.dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(date_str) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                std::fs::remove_file(entry.path()).map_err(Error::Io)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
