//! Volume Quota - Per-volume disk quotas through the OS quota service
//!
//! Configures and reads quota limits kept by the File Server Resource
//! Manager. Each operation opens its own quota session, works on a single
//! quota record and releases everything before returning, whichever step
//! failed. Enforcement itself is left to the operating system.

pub mod ffi;
pub mod quota;
pub mod subsystem;

pub use quota::{
    ErrorKind, QuotaError, QuotaManager, QuotaSnapshot, QuotaUsage, StatusCode, Step,
};
pub use subsystem::{QuotaRecord, QuotaSession, QuotaSubsystem, ServerContext, ThreadingModel};

#[cfg(windows)]
pub use subsystem::FsrmSubsystem;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Main error type for volume quota operations
#[derive(Error, Debug)]
pub enum VolumeQuotaError {
    #[error("Quota error: {0}")]
    Quota(#[from] quota::QuotaError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VolumeQuotaError>;

/// How to reach the quota manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Class id of the quota manager object
    pub manager_class_id: String,

    /// Management interface requested from the quota manager
    pub manager_interface_id: String,

    /// Threading model for the per-call subsystem context
    pub threading: ThreadingModel,

    /// Where the quota manager is hosted
    pub server_context: ServerContext,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            manager_class_id: "{90dcab7f-347c-4bfc-b543-540326305fbe}".to_string(),
            manager_interface_id: "{4846cb01-d430-494f-abb4-b1054999fb09}".to_string(),
            threading: ThreadingModel::Apartment,
            server_context: ServerContext::LocalServer,
        }
    }
}

impl QuotaConfig {
    /// Parse a JSON config; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Install a fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. Does nothing if a
/// global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(windows)]
pub(crate) fn fsrm_manager() -> QuotaManager<FsrmSubsystem> {
    QuotaManager::new(FsrmSubsystem::new(), QuotaConfig::default())
}

/// Set the FSRM quota limit for a volume
#[cfg(windows)]
pub fn set_quota(volume: &str, limit: u64) -> quota::Result<()> {
    fsrm_manager().set_quota(volume, limit)
}

/// Read the FSRM used byte count for a volume; zero without a quota
#[cfg(windows)]
pub fn get_quota_used(volume: &str) -> quota::Result<u64> {
    fsrm_manager().get_quota_used(volume)
}
