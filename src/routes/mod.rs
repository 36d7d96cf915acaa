// Routes module - route records, snapshot naming, persistence and comparison

pub mod compare;
pub mod namer;
pub mod parser;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

const NXOS_FIELDS: &[&str] = &[
    "vrf",
    "protocol",
    "type",
    "network",
    "mask",
    "distance",
    "metric",
    "nexthop_ip",
    "nexthop_if",
];

const IOS_FIELDS: &[&str] = &[
    "protocol",
    "type",
    "network",
    "mask",
    "distance",
    "metric",
    "nexthop_ip",
    "nexthop_if",
];

/// Device platform, taken from the device list's platform tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    CiscoIos,
    CiscoNxos,
}

impl Platform {
    /// Field names for this platform's routes, in column order
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIos => IOS_FIELDS,
            Platform::CiscoNxos => NXOS_FIELDS,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Platform::CiscoIos => "cisco_ios",
            Platform::CiscoNxos => "cisco_nxos",
        }
    }

    /// Identify the platform whose field set is exactly `fields` (order-insensitive)
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Platform> {
        [Platform::CiscoIos, Platform::CiscoNxos]
            .into_iter()
            .find(|platform| {
                let expected = platform.fields();
                fields.len() == expected.len()
                    && expected
                        .iter()
                        .all(|e| fields.iter().any(|f| f.as_ref() == *e))
            })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cisco_ios" => Ok(Platform::CiscoIos),
            "cisco_nxos" => Ok(Platform::CiscoNxos),
            other => Err(AppError::UnknownPlatform(other.to_string())),
        }
    }
}

/// One routing-table entry: field name to string value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteRecord {
    fields: BTreeMap<String, String>,
}

impl RouteRecord {
    pub fn new() -> Self {
        RouteRecord::default()
    }

    /// Record with every field of `platform` set to the empty string
    pub fn for_platform(platform: Platform) -> Self {
        let mut record = RouteRecord::new();
        for field in platform.fields() {
            record.set(field, "");
        }
        record
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// True when the record carries exactly the platform's fields
    pub fn matches_schema(&self, platform: Platform) -> bool {
        let expected = platform.fields();
        self.fields.len() == expected.len()
            && expected.iter().all(|f| self.fields.contains_key(*f))
    }

    /// "network/mask" for display
    pub fn prefix(&self) -> String {
        let network = self.get("network").unwrap_or_default();
        match self.get("mask") {
            Some(mask) if !mask.is_empty() => format!("{}/{}", network, mask),
            _ => network.to_string(),
        }
    }
}

impl FromIterator<(String, String)> for RouteRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        RouteRecord {
            fields: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Original,
    Migrated,
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureKind::Original => f.write_str("original"),
            CaptureKind::Migrated => f.write_str("migrated"),
        }
    }
}

/// A host's routing table at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub hostname: String,
    pub platform: Platform,
    pub kind: CaptureKind,
    pub sequence: Option<u32>,
    pub captured_at: String,
    pub routes: Vec<RouteRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_tag() {
        assert_eq!("cisco_ios".parse::<Platform>().unwrap(), Platform::CiscoIos);
        assert_eq!(" cisco_nxos ".parse::<Platform>().unwrap(), Platform::CiscoNxos);
        assert!(matches!(
            "cisco_ios_telnet".parse::<Platform>(),
            Err(AppError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_platform_from_fields() {
        assert_eq!(Platform::from_fields(IOS_FIELDS), Some(Platform::CiscoIos));
        assert_eq!(Platform::from_fields(NXOS_FIELDS), Some(Platform::CiscoNxos));
        assert_eq!(Platform::from_fields(&["network", "mask"]), None);

        let mut repeated = IOS_FIELDS.to_vec();
        repeated[1] = "protocol";
        assert_eq!(Platform::from_fields(&repeated), None);
    }

    #[test]
    fn test_record_schema() {
        let record = RouteRecord::for_platform(Platform::CiscoIos).with("network", "10.0.0.0");
        assert!(record.matches_schema(Platform::CiscoIos));
        assert!(!record.matches_schema(Platform::CiscoNxos));

        let extra = record.clone().with("vrf", "default");
        assert!(extra.matches_schema(Platform::CiscoNxos));
        assert!(!extra.matches_schema(Platform::CiscoIos));
    }

    #[test]
    fn test_record_prefix() {
        let record = RouteRecord::new()
            .with("network", "10.1.0.0")
            .with("mask", "16");
        assert_eq!(record.prefix(), "10.1.0.0/16");
        assert_eq!(RouteRecord::new().with("network", "10.1.0.0").prefix(), "10.1.0.0");
    }
}
