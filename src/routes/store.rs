// Snapshot persistence: schema validation, CSV/JSON writing and reading

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::namer::{SnapshotFormat, SnapshotNamer};
use super::{Platform, RouteRecord, Snapshot};
use crate::error::{AppError, AppResult};

/// A snapshot that has been written, with the file it went to
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub path: PathBuf,
    pub snapshot: Snapshot,
}

/// Routes read back from a snapshot file
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSnapshot {
    pub path: PathBuf,
    /// Unknown only for an empty JSON array
    pub platform: Option<Platform>,
    pub routes: Vec<RouteRecord>,
}

pub struct SnapshotStore {
    namer: SnapshotNamer,
}

impl SnapshotStore {
    pub fn new(namer: SnapshotNamer) -> Self {
        SnapshotStore { namer }
    }

    pub fn namer(&self) -> &SnapshotNamer {
        &self.namer
    }

    /// Validate `routes`, pick the next file for `hostname` and write it.
    ///
    /// Nothing is created on disk when a record does not match the platform schema.
    pub fn save(
        &self,
        hostname: &str,
        platform: Platform,
        routes: Vec<RouteRecord>,
    ) -> AppResult<StoredSnapshot> {
        validate_schema(platform, &routes)?;

        let slot = self.namer.decide_filename(hostname)?;
        write_snapshot(&slot.path, self.namer.format(), platform, &routes)?;

        if routes.is_empty() {
            tracing::warn!(
                "{} contains no routes (header only); check the device output",
                slot.path.display()
            );
        }

        Ok(StoredSnapshot {
            path: slot.path,
            snapshot: Snapshot {
                hostname: hostname.to_string(),
                platform,
                kind: slot.kind,
                sequence: slot.sequence,
                captured_at: chrono::Utc::now().to_rfc3339(),
                routes,
            },
        })
    }
}

/// Every record must carry exactly the platform's fields
pub fn validate_schema(platform: Platform, routes: &[RouteRecord]) -> AppResult<()> {
    match routes.iter().find(|r| !r.matches_schema(platform)) {
        None => Ok(()),
        Some(record) => Err(AppError::SchemaMismatch {
            platform: platform.to_string(),
            expected: platform.fields().iter().map(|f| f.to_string()).collect(),
            found: record.field_names(),
        }),
    }
}

/// Write routes to `path` in `format`. Callers validate the schema first.
pub fn write_snapshot(
    path: &Path,
    format: SnapshotFormat,
    platform: Platform,
    routes: &[RouteRecord],
) -> AppResult<()> {
    match format {
        SnapshotFormat::Csv => write_csv(path, platform, routes),
        SnapshotFormat::Json => write_json(path, routes),
    }
}

fn write_csv(path: &Path, platform: Platform, routes: &[RouteRecord]) -> AppResult<()> {
    let fields = platform.fields();
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(fields)?;
    for route in routes {
        wtr.write_record(fields.iter().map(|f| route.get(f).unwrap_or_default()))?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_json(path: &Path, routes: &[RouteRecord]) -> AppResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, routes)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Load a snapshot, choosing the reader from the file extension (CSV when unknown)
pub fn load_snapshot(path: &Path) -> AppResult<LoadedSnapshot> {
    match SnapshotFormat::from_path(path).unwrap_or_default() {
        SnapshotFormat::Csv => load_csv(path),
        SnapshotFormat::Json => load_json(path),
    }
}

fn parse_error(path: &Path, reason: impl ToString) -> AppError {
    AppError::SnapshotParse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_csv(path: &Path) -> AppResult<LoadedSnapshot> {
    let bytes = std::fs::read(path).map_err(|e| parse_error(path, e))?;
    // Every row written by the csv writer ends in a newline
    if bytes.last().is_some_and(|b| *b != b'\n') {
        return Err(parse_error(path, "truncated final row"));
    }
    let mut rdr = csv::Reader::from_reader(bytes.as_slice());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| parse_error(path, e))?
        .iter()
        .map(String::from)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(parse_error(path, "missing header row"));
    }

    let platform = Platform::from_fields(&headers)
        .ok_or_else(|| parse_error(path, format!("unrecognised header {:?}", headers)))?;

    let mut routes: Vec<RouteRecord> = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(|e| parse_error(path, e))?;
        let record: RouteRecord = headers
            .iter()
            .cloned()
            .zip(row.iter().map(String::from))
            .collect();
        if !record.matches_schema(platform) {
            return Err(parse_error(path, "records do not share one field set"));
        }
        routes.push(record);
    }

    Ok(LoadedSnapshot {
        path: path.to_path_buf(),
        platform: Some(platform),
        routes,
    })
}

fn load_json(path: &Path) -> AppResult<LoadedSnapshot> {
    let reader = BufReader::new(File::open(path).map_err(|e| parse_error(path, e))?);
    let routes: Vec<RouteRecord> =
        serde_json::from_reader(reader).map_err(|e| parse_error(path, e))?;

    let platform = match routes.first() {
        None => None,
        Some(first) => {
            let names = first.field_names();
            let platform = Platform::from_fields(&names)
                .ok_or_else(|| parse_error(path, format!("unrecognised fields {:?}", names)))?;
            if routes.iter().any(|r| !r.matches_schema(platform)) {
                return Err(parse_error(path, "records do not share one field set"));
            }
            Some(platform)
        }
    };

    Ok(LoadedSnapshot {
        path: path.to_path_buf(),
        platform,
        routes,
    })
}
