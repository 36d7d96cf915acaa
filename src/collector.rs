// Sequential device polling: resolve, ping, fetch, parse and store one device at a time

use std::path::PathBuf;

use crate::devices::ping::{self, PingSettings};
use crate::devices::{self, DeviceEntry, DeviceTransport};
use crate::error::{AppError, AppResult, ErrorClass};
use crate::routes::parser::{self, SHOW_ROUTES};
use crate::routes::store::SnapshotStore;
use crate::routes::CaptureKind;

#[derive(Debug)]
pub struct CapturedDevice {
    pub address: String,
    pub hostname: String,
    pub path: PathBuf,
    pub kind: CaptureKind,
    pub sequence: Option<u32>,
    pub captured_at: String,
    pub routes: usize,
}

#[derive(Debug)]
pub struct FailedDevice {
    pub address: String,
    pub error: AppError,
}

/// Outcome of one pass over the device list
#[derive(Debug, Default)]
pub struct RunSummary {
    pub captured: Vec<CapturedDevice>,
    pub failed: Vec<FailedDevice>,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            "Captured {} device(s), {} failed",
            self.captured.len(),
            self.failed.len()
        );
        for captured in &self.captured {
            tracing::info!(
                "  {} ({}) -> {} at {}",
                captured.address,
                captured.hostname,
                captured.path.display(),
                captured.captured_at
            );
        }
        for failure in &self.failed {
            tracing::warn!(
                "  {} skipped ({} error): {}",
                failure.address,
                failure.error.class(),
                failure.error.user_message()
            );
        }
    }
}

pub struct Collector<T: DeviceTransport> {
    transport: T,
    store: SnapshotStore,
    ssh_port: u16,
    ping: Option<PingSettings>,
}

impl<T: DeviceTransport> Collector<T> {
    pub fn new(transport: T, store: SnapshotStore, ssh_port: u16, ping: Option<PingSettings>) -> Self {
        Collector {
            transport,
            store,
            ssh_port,
            ping,
        }
    }

    /// Poll every device in order. A failing device is logged and skipped.
    pub async fn run(&self, devices: &[DeviceEntry]) -> RunSummary {
        let mut summary = RunSummary::default();

        for device in devices {
            match self.collect_device(device).await {
                Ok(captured) => {
                    let label = match captured.sequence {
                        Some(seq) => format!("{} #{}", captured.kind, seq),
                        None => captured.kind.to_string(),
                    };
                    tracing::info!(
                        "Created {} ({}, {} routes) for {}",
                        captured.path.display(),
                        label,
                        captured.routes,
                        captured.hostname
                    );
                    summary.captured.push(captured);
                }
                Err(error) => {
                    match error.class() {
                        ErrorClass::Schema => tracing::error!(
                            "Could not write routes for {}: {}. Check the field names produced by the parser",
                            device.address,
                            error
                        ),
                        _ => tracing::error!("{}: {}", device.address, error),
                    }
                    summary.failed.push(FailedDevice {
                        address: device.address.clone(),
                        error,
                    });
                }
            }
        }

        summary
    }

    async fn collect_device(&self, device: &DeviceEntry) -> AppResult<CapturedDevice> {
        let addr = devices::resolve(&device.address, self.ssh_port).await?;

        if let Some(settings) = &self.ping {
            ping::ensure_reachable(addr.ip(), settings).await?;
        }

        let output = self.transport.fetch(device, addr, SHOW_ROUTES).await?;
        let routes = parser::parse_output(device.platform, SHOW_ROUTES, &output.raw_output)?;
        let stored = self.store.save(&output.hostname, device.platform, routes)?;

        Ok(CapturedDevice {
            address: device.address.clone(),
            hostname: stored.snapshot.hostname,
            path: stored.path,
            kind: stored.snapshot.kind,
            sequence: stored.snapshot.sequence,
            captured_at: stored.snapshot.captured_at,
            routes: stored.snapshot.routes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceOutput;
    use crate::routes::namer::{SnapshotFormat, SnapshotNamer};
    use crate::routes::Platform;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use tempfile::TempDir;

    enum Reply {
        Output { hostname: &'static str, raw: &'static str },
        AuthFailure,
        Timeout,
    }

    /// Transport that answers from a table and records which addresses were contacted
    struct FakeTransport {
        replies: HashMap<String, Reply>,
        contacted: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(replies: Vec<(&str, Reply)>) -> Self {
            FakeTransport {
                replies: replies
                    .into_iter()
                    .map(|(addr, reply)| (addr.to_string(), reply))
                    .collect(),
                contacted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DeviceTransport for FakeTransport {
        async fn fetch(
            &self,
            device: &DeviceEntry,
            _addr: SocketAddr,
            _command: &str,
        ) -> AppResult<DeviceOutput> {
            self.contacted.lock().unwrap().push(device.address.clone());
            match self.replies.get(&device.address) {
                Some(Reply::Output { hostname, raw }) => Ok(DeviceOutput {
                    hostname: hostname.to_string(),
                    raw_output: raw.to_string(),
                }),
                Some(Reply::AuthFailure) => Err(AppError::AuthenticationFailed(device.address.clone())),
                Some(Reply::Timeout) | None => Err(AppError::ConnectionTimeout(device.address.clone())),
            }
        }
    }

    const IOS_ROUTES: &str = "S*    0.0.0.0/0 [1/0] via 10.0.0.1\n\
                              C        10.0.0.0/24 is directly connected, GigabitEthernet0/0\n";

    fn device(address: &str, platform: Platform) -> DeviceEntry {
        DeviceEntry {
            address: address.to_string(),
            platform,
        }
    }

    #[tokio::test]
    async fn test_failing_devices_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(SnapshotNamer::new(temp_dir.path(), SnapshotFormat::Csv));
        let transport = FakeTransport::new(vec![
            ("127.0.0.1", Reply::AuthFailure),
            ("127.0.0.2", Reply::Output { hostname: "R2", raw: IOS_ROUTES }),
            ("127.0.0.3", Reply::Timeout),
        ]);
        let collector = Collector::new(transport, store, 22, None);

        let devices = vec![
            device("127.0.0.1", Platform::CiscoIos),
            device("bad host!", Platform::CiscoIos),
            device("127.0.0.2", Platform::CiscoIos),
            device("127.0.0.3", Platform::CiscoIos),
        ];
        let summary = collector.run(&devices).await;

        assert_eq!(summary.captured.len(), 1);
        assert_eq!(summary.captured[0].hostname, "R2");
        assert_eq!(summary.captured[0].address, "127.0.0.2");
        assert!(chrono::DateTime::parse_from_rfc3339(&summary.captured[0].captured_at).is_ok());
        assert_eq!(summary.captured[0].routes, 2);
        assert_eq!(summary.captured[0].kind, CaptureKind::Original);
        assert!(summary.captured[0].path.ends_with("R2/R2_original_routes.csv"));

        let classes: Vec<ErrorClass> = summary.failed.iter().map(|f| f.error.class()).collect();
        assert_eq!(
            classes,
            vec![
                ErrorClass::Connectivity,
                ErrorClass::Configuration,
                ErrorClass::Connectivity
            ]
        );

        // The unresolvable address never reaches the transport
        let contacted = collector.transport.contacted.lock().unwrap().clone();
        assert_eq!(contacted, vec!["127.0.0.1", "127.0.0.2", "127.0.0.3"]);
    }

    #[tokio::test]
    async fn test_second_run_is_migrated_capture() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(SnapshotNamer::new(temp_dir.path(), SnapshotFormat::Csv));
        let transport = FakeTransport::new(vec![(
            "127.0.0.1",
            Reply::Output { hostname: "edge-01", raw: IOS_ROUTES },
        )]);
        let collector = Collector::new(transport, store, 22, None);
        let devices = vec![device("127.0.0.1", Platform::CiscoIos)];

        collector.run(&devices).await;
        let summary = collector.run(&devices).await;

        assert_eq!(summary.captured[0].kind, CaptureKind::Migrated);
        assert_eq!(summary.captured[0].sequence, Some(1));
        assert!(summary.captured[0].path.ends_with("edge-01_migrated_001.csv"));
    }

    #[tokio::test]
    async fn test_unparseable_output_writes_header_only_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(SnapshotNamer::new(temp_dir.path(), SnapshotFormat::Csv));
        let transport = FakeTransport::new(vec![(
            "127.0.0.1",
            Reply::Output { hostname: "N1", raw: "% Invalid input detected at '^' marker." },
        )]);
        let collector = Collector::new(transport, store, 22, None);

        let summary = collector.run(&[device("127.0.0.1", Platform::CiscoNxos)]).await;
        assert_eq!(summary.captured[0].routes, 0);

        let content = std::fs::read_to_string(&summary.captured[0].path).unwrap();
        assert_eq!(
            content.trim_end(),
            "vrf,protocol,type,network,mask,distance,metric,nexthop_ip,nexthop_if"
        );
    }
}
