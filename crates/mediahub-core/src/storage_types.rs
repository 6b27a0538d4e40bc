use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Disk driver types
///
/// Selects which backend implementation serves a named disk. Defined in core
/// because configuration refers to it before any backend is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskDriver {
    Local,
    S3,
}

impl FromStr for DiskDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(DiskDriver::Local),
            "s3" => Ok(DiskDriver::S3),
            _ => Err(anyhow::anyhow!("Invalid disk driver: {}", s)),
        }
    }
}

impl Display for DiskDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DiskDriver::Local => write!(f, "local"),
            DiskDriver::S3 => write!(f, "s3"),
        }
    }
}
