// Configuration management for route-snapshot
// Supports CLI arguments, config file (TOML), and environment variables

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::devices::ping::PingSettings;
use crate::error::{AppError, AppResult};
use crate::routes::namer::SnapshotFormat;

/// Capture device routing tables before and after a migration and report lost routes
#[derive(Parser, Debug, Clone)]
#[command(name = "route-snapshot")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, env = "ROUTE_SNAPSHOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "ROUTE_SNAPSHOT_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Append logs to this file instead of the configured one
    #[arg(long, env = "ROUTE_SNAPSHOT_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Directory holding one sub-directory of snapshots per host
    #[arg(short, long, env = "ROUTE_SNAPSHOT_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Snapshot file format
    #[arg(long, value_enum, global = true)]
    pub format: Option<SnapshotFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Poll every device in the device list and save its routing table
    Collect {
        /// Device list file, one `address,platform` per line
        #[arg(short, long)]
        devices: Option<PathBuf>,

        /// SSH username
        #[arg(long, env = "NETLAB_USER")]
        username: Option<String>,

        /// SSH password
        #[arg(long, env = "NETLAB_PASSWD", hide_env_values = true)]
        password: Option<String>,

        /// Enable secret (defaults to the SSH password)
        #[arg(long, env = "NETLAB_ENABLE", hide_env_values = true)]
        secret: Option<String>,

        /// SSH port
        #[arg(long)]
        port: Option<u16>,

        /// Connection and read timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip the ping check before connecting
        #[arg(long)]
        no_ping: bool,
    },

    /// Report routes from a baseline snapshot that are missing from a migrated snapshot
    Compare {
        /// Baseline snapshot file
        #[arg(long, requires = "migrated")]
        baseline: Option<PathBuf>,

        /// Migrated snapshot file
        #[arg(long, requires = "baseline")]
        migrated: Option<PathBuf>,

        /// Compare this host's baseline with its latest migrated capture
        #[arg(long, conflicts_with_all = ["baseline", "migrated"])]
        host: Option<String>,

        /// Also write the missing routes to this file (.csv or .json)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write a default configuration file if none exists
    InitConfig {
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Device list settings
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Snapshot output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// SSH session settings
    #[serde(default)]
    pub ssh: SshConfig,

    /// Reachability check settings
    #[serde(default)]
    pub ping: PingConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Device list file
    #[serde(default = "default_devices_file")]
    pub devices_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for snapshots
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// Snapshot file format (csv or json)
    #[serde(default)]
    pub format: SnapshotFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Connection and read timeout in seconds
    #[serde(default = "default_ssh_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    /// Ping each device before connecting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Echo requests per device
    #[serde(default = "default_ping_count")]
    pub count: u16,

    /// Delay between echo requests in milliseconds
    #[serde(default = "default_ping_interval")]
    pub interval_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_ping_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file, appended to on every run
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_devices_file() -> PathBuf {
    PathBuf::from("devices.txt")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("routes")
}
fn default_ssh_port() -> u16 {
    22
}
fn default_ssh_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_ping_count() -> u16 {
    2
}
fn default_ping_interval() -> u64 {
    500
}
fn default_ping_timeout() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("application.log"))
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            devices_file: default_devices_file(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_output_dir(),
            format: SnapshotFormat::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            port: default_ssh_port(),
            timeout_seconds: default_ssh_timeout(),
        }
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            enabled: default_true(),
            count: default_ping_count(),
            interval_ms: default_ping_interval(),
            timeout_ms: default_ping_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    /// Config file that was read, if any
    pub source: Option<PathBuf>,
    pub log_level: Level,
    pub log_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub format: SnapshotFormat,
    pub devices_file: PathBuf,
    pub ssh_port: u16,
    pub ssh_timeout: Duration,
    /// None when the ping check is disabled
    pub ping: Option<PingSettings>,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Config file > Defaults
    pub fn from_args(cli_args: &CliArgs) -> anyhow::Result<Self> {
        let (source, config_file) = match &cli_args.config {
            Some(config_path) => (Some(config_path.clone()), read_config_file(config_path)?),
            None => {
                // Try loading from default locations
                let default_paths = [
                    PathBuf::from("config.toml"),
                    PathBuf::from("route-snapshot.toml"),
                ];

                match default_paths.into_iter().find(|p| p.exists()) {
                    Some(path) => {
                        let config_file = read_config_file(&path)?;
                        (Some(path), config_file)
                    }
                    None => (None, ConfigFile::default()),
                }
            }
        };

        Self::merge(cli_args, source, config_file)
    }

    fn merge(
        cli_args: &CliArgs,
        source: Option<PathBuf>,
        config_file: ConfigFile,
    ) -> anyhow::Result<Self> {
        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;
        let log_file = cli_args.log_file.clone().or(config_file.logging.file);

        let output_dir = cli_args
            .output_dir
            .clone()
            .unwrap_or(config_file.output.directory);
        let format = cli_args.format.unwrap_or(config_file.output.format);

        let mut devices_file = config_file.inventory.devices_file;
        let mut ssh_port = config_file.ssh.port;
        let mut timeout_seconds = config_file.ssh.timeout_seconds;
        let mut ping_enabled = config_file.ping.enabled;

        if let Command::Collect {
            devices,
            port,
            timeout,
            no_ping,
            ..
        } = &cli_args.command
        {
            if let Some(devices) = devices {
                devices_file = devices.clone();
            }
            ssh_port = port.unwrap_or(ssh_port);
            timeout_seconds = timeout.unwrap_or(timeout_seconds);
            ping_enabled = ping_enabled && !no_ping;
        }

        let ping = ping_enabled.then(|| PingSettings {
            count: config_file.ping.count.max(1),
            interval: Duration::from_millis(config_file.ping.interval_ms),
            timeout: Duration::from_millis(config_file.ping.timeout_ms),
        });

        Ok(Config {
            source,
            log_level,
            log_file,
            output_dir,
            format,
            devices_file,
            ssh_port,
            ssh_timeout: Duration::from_secs(timeout_seconds),
            ping,
        })
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let config_content = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<ConfigFile>(&config_content)?)
}

/// Write a fully-populated default config file. Returns false if the file already exists.
pub fn write_default_config(path: &Path) -> anyhow::Result<bool> {
    if path.is_file() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&ConfigFile::default())?)?;
    Ok(true)
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}

/// Device login credentials, read once at startup
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Enable secret
    pub secret: String,
}

impl Credentials {
    /// Username and password are required; the enable secret falls back to the password
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        secret: Option<String>,
    ) -> AppResult<Self> {
        let username = username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Config("missing username (set NETLAB_USER)".to_string()))?;
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Config("missing password (set NETLAB_PASSWD)".to_string()))?;
        let secret = secret
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| password.clone());

        Ok(Credentials {
            username,
            password,
            secret,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("route-snapshot").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.output.directory, PathBuf::from("routes"));
        assert_eq!(config.output.format, SnapshotFormat::Csv);
        assert!(config.ping.enabled);
        assert_eq!(config.logging.file, Some(PathBuf::from("application.log")));
    }

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("DEBUG"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: ConfigFile = toml::from_str(
            r#"
            [output]
            format = "json"

            [ping]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.output.format, SnapshotFormat::Json);
        assert_eq!(config.output.directory, PathBuf::from("routes"));
        assert!(!config.ping.enabled);
        assert_eq!(config.ping.count, 2);
        assert_eq!(config.ssh.timeout_seconds, 30);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = ConfigFile::default();
        file.ssh.port = 2222;
        file.output.directory = PathBuf::from("from-file");

        let args = cli(&[
            "--output-dir",
            "from-cli",
            "collect",
            "--port",
            "8022",
            "--no-ping",
            "--devices",
            "lab.txt",
        ]);
        let config = Config::merge(&args, None, file).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("from-cli"));
        assert_eq!(config.ssh_port, 8022);
        assert_eq!(config.devices_file, PathBuf::from("lab.txt"));
        assert!(config.ping.is_none());
    }

    #[test]
    fn test_compare_args() {
        let args = cli(&["compare", "--host", "R1", "--report", "missing.csv"]);
        match args.command {
            Command::Compare { host, report, .. } => {
                assert_eq!(host.as_deref(), Some("R1"));
                assert_eq!(report, Some(PathBuf::from("missing.csv")));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let conflicting = CliArgs::try_parse_from([
            "route-snapshot",
            "compare",
            "--host",
            "R1",
            "--baseline",
            "a.csv",
            "--migrated",
            "b.csv",
        ]);
        assert!(conflicting.is_err());
    }

    #[test]
    fn test_write_default_config_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        assert!(write_default_config(&path).unwrap());
        let written: ConfigFile = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.ssh.port, 22);

        std::fs::write(&path, "[ssh]\nport = 2200\n").unwrap();
        assert!(!write_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[ssh]\nport = 2200\n");
    }

    #[test]
    fn test_credentials() {
        let creds = Credentials::new(Some("netops".into()), Some("pw".into()), None).unwrap();
        assert_eq!(creds.secret, "pw");

        let creds =
            Credentials::new(Some("netops".into()), Some("pw".into()), Some("en".into())).unwrap();
        assert_eq!(creds.secret, "en");

        assert!(matches!(
            Credentials::new(None, Some("pw".into()), None),
            Err(AppError::Config(_))
        ));
        assert!(!format!("{:?}", creds).contains("pw"));
    }
}
