// Error types for route snapshot collection and comparison

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Host {0} did not respond to ping")]
    Unreachable(String),

    #[error("Authentication failed for {0}")]
    AuthenticationFailed(String),

    #[error("Connection timed out for {0}")]
    ConnectionTimeout(String),

    #[error("Failed to enter privilege mode on {0}")]
    PrivilegeEscalationFailed(String),

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Malformed device list line {line}: {content:?}")]
    MalformedDeviceLine { line: usize, content: String },

    #[error("No template for platform {platform} and command {command:?}")]
    TemplateNotFound { platform: String, command: String },

    #[error("Route fields do not match {platform} schema: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        platform: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Snapshot file(s) not found: {}", display_paths(.0))]
    SnapshotsNotFound(Vec<PathBuf>),

    #[error("Failed to parse snapshot {}: {reason}", .path.display())]
    SnapshotParse { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Broad failure classes, used when logging per-device and per-host outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Connectivity,
    Configuration,
    Template,
    Schema,
    SnapshotLookup,
    SnapshotParse,
    Environment,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Connectivity => "connectivity",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Template => "template",
            ErrorClass::Schema => "schema",
            ErrorClass::SnapshotLookup => "snapshot-lookup",
            ErrorClass::SnapshotParse => "snapshot-parse",
            ErrorClass::Environment => "environment",
        };
        f.write_str(name)
    }
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Unreachable(_)
            | AppError::AuthenticationFailed(_)
            | AppError::ConnectionTimeout(_)
            | AppError::PrivilegeEscalationFailed(_)
            | AppError::Ssh(_) => ErrorClass::Connectivity,
            AppError::Config(_)
            | AppError::InvalidAddress(_)
            | AppError::UnknownPlatform(_)
            | AppError::MalformedDeviceLine { .. } => ErrorClass::Configuration,
            AppError::TemplateNotFound { .. } => ErrorClass::Template,
            AppError::SchemaMismatch { .. } => ErrorClass::Schema,
            AppError::SnapshotsNotFound(_) => ErrorClass::SnapshotLookup,
            AppError::SnapshotParse { .. } => ErrorClass::SnapshotParse,
            AppError::Io(_) | AppError::Serialization(_) | AppError::Csv(_) => {
                ErrorClass::Environment
            }
        }
    }

    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unreachable(host) => {
                format!("{} is not responding to ping. Check that the device is up and ICMP is allowed.", host)
            }
            AppError::AuthenticationFailed(host) => {
                format!("Authentication failed for {}. Please verify your credentials.", host)
            }
            AppError::ConnectionTimeout(host) => {
                format!("Connection to {} timed out.", host)
            }
            AppError::PrivilegeEscalationFailed(host) => {
                format!("Failed to enter privilege mode on {}. Please check the enable password.", host)
            }
            AppError::Ssh(_) => "SSH session error. Check that SSH is enabled on the device.".to_string(),
            AppError::Config(_) | AppError::MalformedDeviceLine { .. } => {
                "Configuration error. Check your config file, device list or command-line arguments.".to_string()
            }
            AppError::InvalidAddress(addr) => {
                format!("{} is not a valid IP address or resolvable hostname.", addr)
            }
            AppError::UnknownPlatform(tag) => {
                format!("Platform {} is not supported. Use cisco_ios or cisco_nxos.", tag)
            }
            AppError::TemplateNotFound { .. } => {
                "No parsing template matches this platform and command.".to_string()
            }
            AppError::SchemaMismatch { .. } => {
                "Parsed routes do not match the platform's field names; nothing was written.".to_string()
            }
            AppError::SnapshotsNotFound(paths) => {
                format!("Snapshot file(s) missing: {}", display_paths(paths))
            }
            AppError::SnapshotParse { path, .. } => {
                format!("Snapshot {} is corrupt or truncated.", path.display())
            }
            AppError::Io(_) | AppError::Csv(_) => {
                "File system error. Check permissions and disk space.".to_string()
            }
            AppError::Serialization(_) => {
                "Data format error. This might be a bug, please report it.".to_string()
            }
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class() {
        assert_eq!(
            AppError::AuthenticationFailed("r1".to_string()).class(),
            ErrorClass::Connectivity
        );
        assert_eq!(
            AppError::UnknownPlatform("juniper".to_string()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            AppError::SnapshotsNotFound(vec![]).class(),
            ErrorClass::SnapshotLookup
        );
    }

    #[test]
    fn test_snapshots_not_found_lists_paths() {
        let err = AppError::SnapshotsNotFound(vec![
            PathBuf::from("a.csv"),
            PathBuf::from("b.csv"),
        ]);
        assert_eq!(err.to_string(), "Snapshot file(s) not found: a.csv, b.csv");
    }
}
