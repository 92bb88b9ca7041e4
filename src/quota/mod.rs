//! Quota Module - Session lifecycle over the quota subsystem
//!
//! Every public operation acquires its own session, works on at most one
//! quota record, and releases record, session and subsystem context on
//! every exit path.

mod manager;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use manager::{QuotaManager, QuotaSnapshot, QuotaUsage};

use std::fmt;
use thiserror::Error;

/// Opaque 32-bit status code reported by the quota subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const S_OK: StatusCode = StatusCode(0);
    pub const E_NOINTERFACE: StatusCode = StatusCode(0x8000_4002);
    pub const E_POINTER: StatusCode = StatusCode(0x8000_4003);
    pub const E_FAIL: StatusCode = StatusCode(0x8000_4005);
    pub const E_ACCESSDENIED: StatusCode = StatusCode(0x8007_0005);
    pub const E_INVALIDARG: StatusCode = StatusCode(0x8007_0057);
    pub const FSRM_E_NOT_FOUND: StatusCode = StatusCode(0x8004_5301);
    pub const FSRM_E_ALREADY_EXISTS: StatusCode = StatusCode(0x8004_5303);

    /// Symbolic name for the codes this crate knows about
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::S_OK => Some("S_OK"),
            Self::E_NOINTERFACE => Some("E_NOINTERFACE"),
            Self::E_POINTER => Some("E_POINTER"),
            Self::E_FAIL => Some("E_FAIL"),
            Self::E_ACCESSDENIED => Some("E_ACCESSDENIED"),
            Self::E_INVALIDARG => Some("E_INVALIDARG"),
            Self::FSRM_E_NOT_FOUND => Some("FSRM_E_NOT_FOUND"),
            Self::FSRM_E_ALREADY_EXISTS => Some("FSRM_E_ALREADY_EXISTS"),
            _ => None,
        }
    }

    /// Native signed representation (HRESULT layout)
    pub fn as_i32(&self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08x} ({})", self.0, name),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

/// A single call into the quota subsystem that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ResolveManagerClass,
    ResolveManagerInterface,
    InitializeContext,
    InstantiateSession,
    CreateRecord,
    GetRecord,
    SetLimit,
    Commit,
    ReadLimit,
    ReadUsed,
}

impl Step {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Step::ResolveManagerClass
            | Step::ResolveManagerInterface
            | Step::InitializeContext
            | Step::InstantiateSession => ErrorKind::Acquisition,
            Step::CreateRecord | Step::GetRecord => ErrorKind::RecordResolution,
            Step::SetLimit | Step::Commit => ErrorKind::Mutation,
            Step::ReadLimit | Step::ReadUsed => ErrorKind::Read,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ResolveManagerClass => "resolving quota manager class id",
            Step::ResolveManagerInterface => "resolving quota manager interface id",
            Step::InitializeContext => "initializing subsystem context",
            Step::InstantiateSession => "instantiating quota manager",
            Step::CreateRecord => "creating quota record",
            Step::GetRecord => "getting quota record",
            Step::SetLimit => "setting quota limit",
            Step::Commit => "committing quota record",
            Step::ReadLimit => "reading quota limit",
            Step::ReadUsed => "reading quota used",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Acquisition,
    RecordResolution,
    Mutation,
    Read,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Session acquisition failed while {step}: {code}")]
    Acquisition { step: Step, code: StatusCode },

    #[error("Quota record resolution failed while {step}: {code}")]
    RecordResolution { step: Step, code: StatusCode },

    #[error("Quota record mutation failed while {step}: {code}")]
    Mutation { step: Step, code: StatusCode },

    #[error("Quota record read failed while {step}: {code}")]
    Read { step: Step, code: StatusCode },
}

impl QuotaError {
    /// Build the error variant matching the step that failed
    pub fn at(step: Step, code: StatusCode) -> Self {
        match step.kind() {
            ErrorKind::Acquisition => QuotaError::Acquisition { step, code },
            ErrorKind::RecordResolution => QuotaError::RecordResolution { step, code },
            ErrorKind::Mutation => QuotaError::Mutation { step, code },
            ErrorKind::Read => QuotaError::Read { step, code },
        }
    }

    pub fn step(&self) -> Step {
        match self {
            QuotaError::Acquisition { step, .. }
            | QuotaError::RecordResolution { step, .. }
            | QuotaError::Mutation { step, .. }
            | QuotaError::Read { step, .. } => *step,
        }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            QuotaError::Acquisition { code, .. }
            | QuotaError::RecordResolution { code, .. }
            | QuotaError::Mutation { code, .. }
            | QuotaError::Read { code, .. } => *code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.step().kind()
    }
}

pub type Result<T> = std::result::Result<T, QuotaError>;

/// Log the failing step, then turn it into a `QuotaError`.
///
/// Called before the session guard goes out of scope, so the diagnostic
/// always precedes cleanup.
pub(crate) fn step_failed(step: Step, code: StatusCode) -> QuotaError {
    tracing::error!(%step, %code, "quota subsystem call failed");
    QuotaError::at(step, code)
}
