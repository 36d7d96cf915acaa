// Devices module - device inventory, address resolution, reachability and transport

pub mod ping;
pub mod ssh;

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::routes::Platform;

/// One line of the device list: where to connect and how to parse the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub address: String,
    pub platform: Platform,
}

/// What a device session hands back
#[derive(Debug, Clone)]
pub struct DeviceOutput {
    /// Hostname taken from the device prompt
    pub hostname: String,
    pub raw_output: String,
}

/// Runs a command on a device and returns its output
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn fetch(
        &self,
        device: &DeviceEntry,
        addr: SocketAddr,
        command: &str,
    ) -> AppResult<DeviceOutput>;
}

/// Parsed device list. Bad lines are kept as errors so the operator can be told.
#[derive(Debug, Default)]
pub struct Inventory {
    pub devices: Vec<DeviceEntry>,
    pub rejected: Vec<AppError>,
}

impl Inventory {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Unable to open the device list {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&content))
    }

    /// One `address,platform_tag` pair per line; blank lines and `#` comments are ignored
    pub fn parse(content: &str) -> Self {
        let mut inventory = Inventory::default();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_line(idx + 1, line) {
                Ok(device) => inventory.devices.push(device),
                Err(e) => inventory.rejected.push(e),
            }
        }

        inventory
    }
}

fn parse_line(line_no: usize, line: &str) -> AppResult<DeviceEntry> {
    let malformed = || AppError::MalformedDeviceLine {
        line: line_no,
        content: line.to_string(),
    };

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let [address, tag] = parts.as_slice() else {
        return Err(malformed());
    };
    if address.is_empty() || tag.is_empty() {
        return Err(malformed());
    }

    Ok(DeviceEntry {
        address: address.to_string(),
        platform: tag.parse()?,
    })
}

/// Turn an IP literal or hostname into a socket address
pub async fn resolve(address: &str, port: u16) -> AppResult<SocketAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    tokio::net::lookup_host(format!("{}:{}", address, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| AppError::InvalidAddress(address.to_string()))
}
