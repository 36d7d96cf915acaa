// Snapshot file naming: one write-once baseline per host, then numbered migrated captures

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::CaptureKind;
use crate::error::{AppError, AppResult};

/// Serialization format, which also fixes the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Csv,
    Json,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Option<SnapshotFormat> {
        match path.extension()?.to_str()? {
            "csv" => Some(SnapshotFormat::Csv),
            "json" => Some(SnapshotFormat::Json),
            _ => None,
        }
    }
}

/// Where the next capture for a host goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSlot {
    pub path: PathBuf,
    pub kind: CaptureKind,
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SnapshotNamer {
    root: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotNamer {
    pub fn new(root: impl Into<PathBuf>, format: SnapshotFormat) -> Self {
        SnapshotNamer {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Directory holding every capture for `host`
    pub fn host_dir(&self, host: &str) -> PathBuf {
        self.root.join(host)
    }

    pub fn baseline_path(&self, host: &str) -> PathBuf {
        self.host_dir(host)
            .join(format!("{}_original_routes.{}", host, self.format.extension()))
    }

    pub fn migrated_path(&self, host: &str, sequence: u32) -> PathBuf {
        self.host_dir(host).join(format!(
            "{}_migrated_{:03}.{}",
            host,
            sequence,
            self.format.extension()
        ))
    }

    /// Choose the file for the next capture of `host`, creating its directory.
    ///
    /// The baseline is returned only while it does not exist; afterwards the
    /// first unused migrated sequence number (starting at 1) is returned.
    pub fn decide_filename(&self, host: &str) -> AppResult<SnapshotSlot> {
        check_host(host)?;
        std::fs::create_dir_all(self.host_dir(host))?;

        let baseline = self.baseline_path(host);
        if !baseline.is_file() {
            return Ok(SnapshotSlot {
                path: baseline,
                kind: CaptureKind::Original,
                sequence: None,
            });
        }

        let mut sequence = 1;
        while self.migrated_path(host, sequence).is_file() {
            sequence += 1;
        }

        Ok(SnapshotSlot {
            path: self.migrated_path(host, sequence),
            kind: CaptureKind::Migrated,
            sequence: Some(sequence),
        })
    }

    /// Highest migrated capture reachable without gaps from sequence 1
    pub fn latest_migrated(&self, host: &str) -> Option<(PathBuf, u32)> {
        let mut sequence = 0;
        while self.migrated_path(host, sequence + 1).is_file() {
            sequence += 1;
        }
        (sequence > 0).then(|| (self.migrated_path(host, sequence), sequence))
    }

    /// Hosts that have a capture directory under the root, sorted by name
    pub fn hosts(&self) -> AppResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut hosts = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    hosts.push(name.to_string());
                }
            }
        }
        hosts.sort();
        Ok(hosts)
    }
}

/// A host identifier must name a single directory directly under the root
pub fn check_host(host: &str) -> AppResult<()> {
    if host.trim().is_empty() {
        return Err(AppError::Config("host identifier is empty".to_string()));
    }
    if host == "." || host.contains("..") || host.contains(['/', '\\']) {
        return Err(AppError::Config(format!(
            "host identifier {:?} is not a plain directory name",
            host
        )));
    }
    Ok(())
}
