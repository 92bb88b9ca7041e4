//! Recording quota subsystem for tests
//!
//! Logs every call and release in order, stores committed limits per
//! volume, and fails on demand at any step.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{StatusCode, Step};
use crate::subsystem::{QuotaRecord, QuotaSession, QuotaSubsystem, ServerContext, ThreadingModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ResolveIdentifier(String),
    InitializeContext(ThreadingModel),
    Instantiate(ServerContext),
    CreateQuota(String),
    GetQuota(String),
    SetLimit(u64),
    ReadLimit,
    ReadUsed,
    Commit,
    ReleaseRecord,
    ReleaseSession,
    UninitializeContext,
}

#[derive(Debug, Clone, Copy)]
struct StoredQuota {
    limit: u64,
    used: u64,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    failure: Option<(Step, StatusCode)>,
    reject_existing: bool,
    resolved_in_attempt: usize,
    quotas: HashMap<String, StoredQuota>,
}

impl State {
    fn check(&self, step: Step) -> Result<(), StatusCode> {
        match self.failure {
            Some((failing, code)) if failing == step => Err(code),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingSubsystem {
    state: Rc<RefCell<State>>,
}

impl RecordingSubsystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_at(self, step: Step, code: StatusCode) -> Self {
        self.state.borrow_mut().failure = Some((step, code));
        self
    }

    /// Make `create_quota` on an existing volume fail like FSRM does
    pub(crate) fn reject_existing(self) -> Self {
        self.state.borrow_mut().reject_existing = true;
        self
    }

    pub(crate) fn with_quota(self, volume: &str, limit: u64, used: u64) -> Self {
        self.state
            .borrow_mut()
            .quotas
            .insert(volume.to_string(), StoredQuota { limit, used });
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == call).count()
    }

    pub(crate) fn stored_limit(&self, volume: &str) -> Option<u64> {
        self.state.borrow().quotas.get(volume).map(|q| q.limit)
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl QuotaSubsystem for RecordingSubsystem {
    type Identifier = String;
    type Session = RecordingSession;

    fn resolve_identifier(&self, text: &str) -> Result<String, StatusCode> {
        self.record(Call::ResolveIdentifier(text.to_string()));
        let mut state = self.state.borrow_mut();
        let step = if state.resolved_in_attempt == 0 {
            Step::ResolveManagerClass
        } else {
            Step::ResolveManagerInterface
        };
        state.resolved_in_attempt += 1;
        state.check(step)?;
        Ok(text.to_string())
    }

    fn initialize_context(&self, threading: ThreadingModel) -> Result<(), StatusCode> {
        self.record(Call::InitializeContext(threading));
        self.state.borrow().check(Step::InitializeContext)
    }

    fn instantiate(
        &self,
        _class: &String,
        _interface: &String,
        context: ServerContext,
    ) -> Result<RecordingSession, StatusCode> {
        self.record(Call::Instantiate(context));
        self.state.borrow().check(Step::InstantiateSession)?;
        Ok(RecordingSession {
            state: Rc::clone(&self.state),
        })
    }

    fn uninitialize_context(&self) {
        self.record(Call::UninitializeContext);
        self.state.borrow_mut().resolved_in_attempt = 0;
    }
}

pub(crate) struct RecordingSession {
    state: Rc<RefCell<State>>,
}

impl RecordingSession {
    fn open(&self, volume: &str) -> RecordingRecord {
        RecordingRecord {
            state: Rc::clone(&self.state),
            volume: volume.to_string(),
            pending_limit: None,
        }
    }
}

impl QuotaSession for RecordingSession {
    type Record = RecordingRecord;

    fn create_quota(&self, volume: &str) -> Result<RecordingRecord, StatusCode> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::CreateQuota(volume.to_string()));
            state.check(Step::CreateRecord)?;
            if state.reject_existing && state.quotas.contains_key(volume) {
                return Err(StatusCode::FSRM_E_ALREADY_EXISTS);
            }
        }
        Ok(self.open(volume))
    }

    fn get_quota(&self, volume: &str) -> Result<Option<RecordingRecord>, StatusCode> {
        let exists = {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::GetQuota(volume.to_string()));
            state.check(Step::GetRecord)?;
            state.quotas.contains_key(volume)
        };
        Ok(exists.then(|| self.open(volume)))
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::ReleaseSession);
    }
}

pub(crate) struct RecordingRecord {
    state: Rc<RefCell<State>>,
    volume: String,
    pending_limit: Option<u64>,
}

impl RecordingRecord {
    fn stored(&self) -> StoredQuota {
        self.state
            .borrow()
            .quotas
            .get(&self.volume)
            .copied()
            .unwrap_or(StoredQuota { limit: 0, used: 0 })
    }
}

impl QuotaRecord for RecordingRecord {
    fn set_limit(&mut self, limit: u64) -> Result<(), StatusCode> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::SetLimit(limit));
            state.check(Step::SetLimit)?;
        }
        self.pending_limit = Some(limit);
        Ok(())
    }

    fn limit(&self) -> Result<u64, StatusCode> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::ReadLimit);
            state.check(Step::ReadLimit)?;
        }
        Ok(self.pending_limit.unwrap_or(self.stored().limit))
    }

    fn used(&self) -> Result<u64, StatusCode> {
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::ReadUsed);
            state.check(Step::ReadUsed)?;
        }
        Ok(self.stored().used)
    }

    fn commit(&mut self) -> Result<(), StatusCode> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Commit);
        state.check(Step::Commit)?;

        let existing = state.quotas.get(&self.volume).copied();
        let used = existing.map_or(0, |q| q.used);
        let limit = self
            .pending_limit
            .take()
            .unwrap_or(existing.map_or(0, |q| q.limit));
        state
            .quotas
            .insert(self.volume.clone(), StoredQuota { limit, used });
        Ok(())
    }
}

impl Drop for RecordingRecord {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::ReleaseRecord);
    }
}
