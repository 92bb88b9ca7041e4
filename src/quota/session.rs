//! Session acquisition and scoped cleanup

use std::marker::PhantomData;

use super::{step_failed, Result, Step};
use crate::subsystem::{QuotaSession, QuotaSubsystem};
use crate::QuotaConfig;

type RecordOf<S> = <<S as QuotaSubsystem>::Session as QuotaSession>::Record;

/// Tears the subsystem context down when dropped.
///
/// Armed before anything is resolved or initialized, so teardown runs once
/// per acquisition attempt no matter which step failed.
struct ContextGuard<'a, S: QuotaSubsystem> {
    subsystem: &'a S,
}

impl<'a, S: QuotaSubsystem> Drop for ContextGuard<'a, S> {
    fn drop(&mut self) {
        tracing::trace!("tearing down quota subsystem context");
        self.subsystem.uninitialize_context();
    }
}

/// Owned quota session plus the record obtained from it.
///
/// Release order on drop: record (if any), session, subsystem context.
/// Fields drop in declaration order after `Drop::drop` runs.
pub(crate) struct SessionScope<'a, S: QuotaSubsystem> {
    record: Option<RecordOf<S>>,
    session: S::Session,
    _context: ContextGuard<'a, S>,
    // Sessions are bound to the thread that initialized the context
    _not_send: PhantomData<*const ()>,
}

impl<'a, S: QuotaSubsystem> SessionScope<'a, S> {
    pub(crate) fn session(&self) -> &S::Session {
        &self.session
    }

    /// Take ownership of a record so it is released with the session
    pub(crate) fn hold(&mut self, record: RecordOf<S>) -> &mut RecordOf<S> {
        self.record.insert(record)
    }
}

impl<'a, S: QuotaSubsystem> Drop for SessionScope<'a, S> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            tracing::trace!("releasing quota record");
            drop(record);
        }
        tracing::trace!("releasing quota session");
    }
}

/// Acquire a ready-to-use quota session.
///
/// On failure nothing is returned and the context guard has already run.
pub(crate) fn acquire<'a, S: QuotaSubsystem>(
    subsystem: &'a S,
    config: &QuotaConfig,
) -> Result<SessionScope<'a, S>> {
    let context = ContextGuard { subsystem };

    let class = subsystem
        .resolve_identifier(&config.manager_class_id)
        .map_err(|code| step_failed(Step::ResolveManagerClass, code))?;
    let interface = subsystem
        .resolve_identifier(&config.manager_interface_id)
        .map_err(|code| step_failed(Step::ResolveManagerInterface, code))?;

    subsystem
        .initialize_context(config.threading)
        .map_err(|code| step_failed(Step::InitializeContext, code))?;

    let session = subsystem
        .instantiate(&class, &interface, config.server_context)
        .map_err(|code| step_failed(Step::InstantiateSession, code))?;

    tracing::debug!("quota session acquired");
    Ok(SessionScope {
        record: None,
        session,
        _context: context,
        _not_send: PhantomData,
    })
}
