//! Quota Manager - set limits and read usage for a volume
//!
//! Each call runs its own acquire/use/release cycle. Nothing is cached
//! between calls; all state lives in the quota subsystem.

use serde::{Deserialize, Serialize};

use super::session::{self, SessionScope};
use super::{step_failed, Result, Step};
use crate::subsystem::{QuotaRecord, QuotaSession, QuotaSubsystem};
use crate::QuotaConfig;

/// Result of a usage query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaUsage {
    /// The subsystem has no quota record for the volume
    NotConfigured,
    /// Bytes currently charged against the volume's quota
    Used(u64),
}

impl QuotaUsage {
    /// Used bytes; zero when no quota is configured
    pub fn bytes(self) -> u64 {
        match self {
            QuotaUsage::NotConfigured => 0,
            QuotaUsage::Used(bytes) => bytes,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, QuotaUsage::Used(_))
    }
}

/// Limit and usage of a configured quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub volume: String,
    pub limit: u64,
    pub used: u64,
}

impl QuotaSnapshot {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

/// Quota Manager - handles all quota operations against one subsystem
pub struct QuotaManager<S: QuotaSubsystem> {
    subsystem: S,
    config: QuotaConfig,
}

impl<S: QuotaSubsystem> QuotaManager<S> {
    pub fn new(subsystem: S, config: QuotaConfig) -> Self {
        Self { subsystem, config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    fn open(&self) -> Result<SessionScope<'_, S>> {
        session::acquire(&self.subsystem, &self.config)
    }

    /// Set the quota limit for a volume, creating the quota if needed.
    ///
    /// The change becomes durable at commit; a failure before that leaves
    /// the subsystem's committed state untouched.
    pub fn set_quota(&self, volume: &str, limit: u64) -> Result<()> {
        let span = tracing::debug_span!("set_quota", volume, limit);
        let _enter = span.enter();

        let mut scope = self.open()?;
        let record = scope
            .session()
            .create_quota(volume)
            .map_err(|code| step_failed(Step::CreateRecord, code))?;
        let record = scope.hold(record);

        record
            .set_limit(limit)
            .map_err(|code| step_failed(Step::SetLimit, code))?;
        record
            .commit()
            .map_err(|code| step_failed(Step::Commit, code))?;

        tracing::debug!("quota committed");
        Ok(())
    }

    /// Read the used byte count for a volume. Zero when no quota exists.
    pub fn get_quota_used(&self, volume: &str) -> Result<u64> {
        self.query_usage(volume).map(QuotaUsage::bytes)
    }

    /// Read usage, keeping "no quota configured" distinct from zero usage
    pub fn query_usage(&self, volume: &str) -> Result<QuotaUsage> {
        let span = tracing::debug_span!("query_usage", volume);
        let _enter = span.enter();

        let mut scope = self.open()?;
        let found = scope
            .session()
            .get_quota(volume)
            .map_err(|code| step_failed(Step::GetRecord, code))?;
        let record = match found {
            Some(record) => scope.hold(record),
            None => {
                tracing::debug!("no quota configured");
                return Ok(QuotaUsage::NotConfigured);
            }
        };

        let used = record
            .used()
            .map_err(|code| step_failed(Step::ReadUsed, code))?;
        Ok(QuotaUsage::Used(used))
    }

    /// Read limit and usage of an existing quota
    pub fn describe_quota(&self, volume: &str) -> Result<Option<QuotaSnapshot>> {
        let span = tracing::debug_span!("describe_quota", volume);
        let _enter = span.enter();

        let mut scope = self.open()?;
        let found = scope
            .session()
            .get_quota(volume)
            .map_err(|code| step_failed(Step::GetRecord, code))?;
        let Some(record) = found else {
            tracing::debug!("no quota configured");
            return Ok(None);
        };
        let record = scope.hold(record);

        let limit = record
            .limit()
            .map_err(|code| step_failed(Step::ReadLimit, code))?;
        let used = record
            .used()
            .map_err(|code| step_failed(Step::ReadUsed, code))?;

        Ok(Some(QuotaSnapshot {
            volume: volume.to_string(),
            limit,
            used,
        }))
    }
}
