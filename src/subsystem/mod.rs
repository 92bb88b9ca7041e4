//! Subsystem Module - Handle-based interface to the OS quota service
//!
//! The quota core only talks to the service through these traits. Handles
//! release themselves on drop; callers decide the order by owning them.

#[cfg(windows)]
mod fsrm;

#[cfg(windows)]
pub use fsrm::FsrmSubsystem;

use crate::quota::StatusCode;
use serde::{Deserialize, Serialize};

/// Threading model requested when the subsystem context is initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingModel {
    #[default]
    Apartment,
    Multithreaded,
}

/// Where the quota manager object is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerContext {
    #[default]
    LocalServer,
    InProcess,
    Any,
}

/// Entry point of the quota service: context setup and session creation.
///
/// `uninitialize_context` is called exactly once for every acquisition
/// attempt, whether or not `initialize_context` ran or succeeded.
/// Implementations that need strict pairing must track that themselves.
pub trait QuotaSubsystem {
    type Identifier;
    type Session: QuotaSession;

    /// Parse a textual class or interface identifier
    fn resolve_identifier(&self, text: &str) -> Result<Self::Identifier, StatusCode>;

    fn initialize_context(&self, threading: ThreadingModel) -> Result<(), StatusCode>;

    /// Create the quota manager session bound to the given interface
    fn instantiate(
        &self,
        class: &Self::Identifier,
        interface: &Self::Identifier,
        context: ServerContext,
    ) -> Result<Self::Session, StatusCode>;

    fn uninitialize_context(&self);
}

/// A live quota manager session. Dropping it releases the session.
pub trait QuotaSession {
    type Record: QuotaRecord;

    /// Create the quota record for a volume, with whatever semantics the
    /// service gives creation over an existing record.
    fn create_quota(&self, volume: &str) -> Result<Self::Record, StatusCode>;

    /// Fetch the existing record for a volume; `Ok(None)` when the service
    /// reports that no quota is configured.
    fn get_quota(&self, volume: &str) -> Result<Option<Self::Record>, StatusCode>;
}

/// Quota configuration and usage of one volume. Dropping it releases the
/// record; uncommitted changes are discarded.
pub trait QuotaRecord {
    fn set_limit(&mut self, limit: u64) -> Result<(), StatusCode>;

    fn limit(&self) -> Result<u64, StatusCode>;

    fn used(&self) -> Result<u64, StatusCode>;

    /// Persist pending changes
    fn commit(&mut self) -> Result<(), StatusCode>;
}
