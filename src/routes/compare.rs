// Route comparison between a baseline snapshot and a migrated snapshot

use std::path::{Path, PathBuf};

use super::namer::{self, SnapshotFormat, SnapshotNamer};
use super::store::{load_snapshot, write_snapshot};
use super::{Platform, RouteRecord};
use crate::error::{AppError, AppResult};

/// Baseline routes with no identical route in the migrated snapshot
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub baseline: PathBuf,
    pub migrated: PathBuf,
    pub platform: Option<Platform>,
    pub missing: Vec<RouteRecord>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn len(&self) -> usize {
        self.missing.len()
    }

    /// Write the missing routes with the baseline's schema
    pub fn write_to(&self, path: &Path) -> AppResult<()> {
        let platform = self
            .platform
            .or_else(|| self.missing.first().and_then(|r| Platform::from_fields(&r.field_names())))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "cannot infer route schema from {}",
                    self.baseline.display()
                ))
            })?;
        let format = SnapshotFormat::from_path(path).unwrap_or_default();
        write_snapshot(path, format, platform, &self.missing)
    }

    /// Plain-text table of the missing routes, one line per route
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} route(s) in {} missing from {}\n",
            self.len(),
            self.baseline.display(),
            self.migrated.display()
        );
        for route in &self.missing {
            let vrf = route.get("vrf").map(|v| format!("[{}] ", v)).unwrap_or_default();
            out.push_str(&format!(
                "  {}{:<20} {:<3} {:<3} [{}/{}] via {} {}\n",
                vrf,
                route.prefix(),
                route.get("protocol").unwrap_or_default(),
                route.get("type").unwrap_or_default(),
                route.get("distance").unwrap_or_default(),
                route.get("metric").unwrap_or_default(),
                route.get("nexthop_ip").unwrap_or_default(),
                route.get("nexthop_if").unwrap_or_default(),
            ));
        }
        out
    }
}

/// Baseline records not present (by full-record equality) in `migrated`, baseline order kept
pub fn missing_routes(baseline: &[RouteRecord], migrated: &[RouteRecord]) -> Vec<RouteRecord> {
    baseline
        .iter()
        .filter(|route| !migrated.contains(route))
        .cloned()
        .collect()
}

pub struct RouteComparator;

impl RouteComparator {
    /// Compare two snapshot files. Fails if either file is missing.
    pub fn compare(baseline: &Path, migrated: &Path) -> AppResult<DiffReport> {
        let absent: Vec<PathBuf> = [baseline, migrated]
            .into_iter()
            .filter(|p| !p.is_file())
            .map(Path::to_path_buf)
            .collect();
        if !absent.is_empty() {
            return Err(AppError::SnapshotsNotFound(absent));
        }

        let original = load_snapshot(baseline)?;
        let current = load_snapshot(migrated)?;

        tracing::debug!(
            "Comparing {} baseline route(s) against {} migrated route(s)",
            original.routes.len(),
            current.routes.len()
        );

        Ok(DiffReport {
            baseline: baseline.to_path_buf(),
            migrated: migrated.to_path_buf(),
            platform: original.platform,
            missing: missing_routes(&original.routes, &current.routes),
        })
    }

    /// Compare a host's baseline against its most recent migrated capture
    pub fn compare_host(namer: &SnapshotNamer, host: &str) -> AppResult<DiffReport> {
        namer::check_host(host)?;
        let baseline = namer.baseline_path(host);
        let migrated = match namer.latest_migrated(host) {
            Some((path, _)) => path,
            None => namer.migrated_path(host, 1),
        };
        Self::compare(&baseline, &migrated)
    }
}
