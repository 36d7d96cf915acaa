// ICMP reachability check run before a device session is opened

use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct PingSettings {
    pub count: u16,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PingSettings {
    fn default() -> Self {
        PingSettings {
            count: 2,
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Replies collected from one round of echo requests
#[derive(Debug, Clone, PartialEq)]
pub struct PingReport {
    pub address: IpAddr,
    pub sent: u16,
    pub rtts_ms: Vec<f64>,
}

impl PingReport {
    pub fn received(&self) -> usize {
        self.rtts_ms.len()
    }

    pub fn is_reachable(&self) -> bool {
        !self.rtts_ms.is_empty()
    }

    pub fn avg_rtt_ms(&self) -> Option<f64> {
        if self.rtts_ms.is_empty() {
            return None;
        }
        Some(self.rtts_ms.iter().sum::<f64>() / self.rtts_ms.len() as f64)
    }
}

/// Send `settings.count` echo requests; a device is reachable if any reply arrives
pub async fn probe(address: IpAddr, settings: &PingSettings) -> AppResult<PingReport> {
    let config = match address {
        IpAddr::V4(_) => Config::default(),
        IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
    };

    let client = Client::new(&config)
        .map_err(|e| AppError::Config(format!("Failed to create ping client: {}", e)))?;

    let payload = [0; 56];
    let mut pinger = client.pinger(address, PingIdentifier(rand::random())).await;
    pinger.timeout(settings.timeout);

    let mut rtts_ms = Vec::new();
    for seq in 0..settings.count {
        if seq > 0 {
            tokio::time::sleep(settings.interval).await;
        }
        match pinger.ping(PingSequence(seq), &payload).await {
            Ok((_, duration)) => rtts_ms.push(duration.as_secs_f64() * 1000.0),
            Err(e) => tracing::debug!("Ping {} to {} failed: {}", seq, address, e),
        }
    }

    Ok(PingReport {
        address,
        sent: settings.count,
        rtts_ms,
    })
}

/// Fail with `Unreachable` unless the address answers at least one ping
pub async fn ensure_reachable(address: IpAddr, settings: &PingSettings) -> AppResult<()> {
    let report = probe(address, settings).await?;

    if !report.is_reachable() {
        tracing::info!(
            "{} is not responding to ping. Received {} of {} packets sent",
            report.address,
            report.received(),
            report.sent
        );
        return Err(AppError::Unreachable(report.address.to_string()));
    }

    tracing::info!(
        "{} responded to ping and is reachable. Avg. response time: {:.2} ms",
        report.address,
        report.avg_rtt_ms().unwrap_or_default()
    );
    Ok(())
}
