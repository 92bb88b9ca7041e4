//! File Server Resource Manager backend
//!
//! COM session objects from `IFsrmQuotaManagerEx`. Interface pointers are
//! released by their `Drop` impls; the apartment is torn down through
//! `uninitialize_context`.

use std::cell::Cell;

use windows::core::{ComInterface, BSTR, GUID, HRESULT, HSTRING};
use windows::Win32::Storage::FileServerResourceManager::{IFsrmQuota, IFsrmQuotaManagerEx};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, IIDFromString, CLSCTX, CLSCTX_ALL,
    CLSCTX_INPROC_SERVER, CLSCTX_LOCAL_SERVER, COINIT, COINIT_APARTMENTTHREADED,
    COINIT_MULTITHREADED,
};
use windows::Win32::System::Variant::{VariantClear, VARIANT, VT_UI8};

use super::{QuotaRecord, QuotaSession, QuotaSubsystem, ServerContext, ThreadingModel};
use crate::quota::StatusCode;

impl From<HRESULT> for StatusCode {
    fn from(hr: HRESULT) -> Self {
        StatusCode(hr.0 as u32)
    }
}

impl From<windows::core::Error> for StatusCode {
    fn from(err: windows::core::Error) -> Self {
        err.code().into()
    }
}

impl From<ThreadingModel> for COINIT {
    fn from(threading: ThreadingModel) -> Self {
        match threading {
            ThreadingModel::Apartment => COINIT_APARTMENTTHREADED,
            ThreadingModel::Multithreaded => COINIT_MULTITHREADED,
        }
    }
}

impl From<ServerContext> for CLSCTX {
    fn from(context: ServerContext) -> Self {
        match context {
            ServerContext::LocalServer => CLSCTX_LOCAL_SERVER,
            ServerContext::InProcess => CLSCTX_INPROC_SERVER,
            ServerContext::Any => CLSCTX_ALL,
        }
    }
}

/// Quota subsystem backed by FSRM over COM.
///
/// Only balances `CoInitializeEx` calls that actually succeeded on this
/// thread, so teardown after a failed initialization is a no-op.
#[derive(Debug, Default)]
pub struct FsrmSubsystem {
    initialized: Cell<u32>,
}

impl FsrmSubsystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaSubsystem for FsrmSubsystem {
    type Identifier = GUID;
    type Session = FsrmSession;

    fn resolve_identifier(&self, text: &str) -> Result<GUID, StatusCode> {
        let text = HSTRING::from(text);
        unsafe { IIDFromString(&text) }.map_err(StatusCode::from)
    }

    fn initialize_context(&self, threading: ThreadingModel) -> Result<(), StatusCode> {
        unsafe { CoInitializeEx(None, threading.into()) }.map_err(StatusCode::from)?;
        self.initialized.set(self.initialized.get() + 1);
        Ok(())
    }

    fn instantiate(
        &self,
        class: &GUID,
        interface: &GUID,
        context: ServerContext,
    ) -> Result<FsrmSession, StatusCode> {
        if *interface != IFsrmQuotaManagerEx::IID {
            return Err(StatusCode::E_NOINTERFACE);
        }
        let manager: IFsrmQuotaManagerEx =
            unsafe { CoCreateInstance(class, None, CLSCTX::from(context)) }
                .map_err(StatusCode::from)?;
        Ok(FsrmSession { manager })
    }

    fn uninitialize_context(&self) {
        let count = self.initialized.get();
        if count > 0 {
            self.initialized.set(count - 1);
            unsafe { CoUninitialize() };
        }
    }
}

pub struct FsrmSession {
    manager: IFsrmQuotaManagerEx,
}

/// Run `call` with the volume as a BSTR that is freed as soon as it returns
fn with_bstr<T>(volume: &str, call: impl FnOnce(&BSTR) -> T) -> T {
    let path = BSTR::from(volume);
    let result = call(&path);
    drop(path);
    result
}

impl QuotaSession for FsrmSession {
    type Record = FsrmRecord;

    fn create_quota(&self, volume: &str) -> Result<FsrmRecord, StatusCode> {
        let quota = with_bstr(volume, |path| unsafe { self.manager.CreateQuota(path) })
            .map_err(StatusCode::from)?;
        Ok(FsrmRecord { quota })
    }

    fn get_quota(&self, volume: &str) -> Result<Option<FsrmRecord>, StatusCode> {
        match with_bstr(volume, |path| unsafe { self.manager.GetQuota(path) }) {
            Ok(quota) => Ok(Some(FsrmRecord { quota })),
            Err(err) => match StatusCode::from(err) {
                StatusCode::FSRM_E_NOT_FOUND => Ok(None),
                code => Err(code),
            },
        }
    }
}

pub struct FsrmRecord {
    quota: IFsrmQuota,
}

fn unsigned_variant(value: u64) -> VARIANT {
    let mut variant = VARIANT::default();
    unsafe {
        (*variant.Anonymous.Anonymous).vt = VT_UI8;
        (*variant.Anonymous.Anonymous).Anonymous.ullVal = value;
    }
    variant
}

fn read_unsigned(mut variant: VARIANT) -> u64 {
    let value = unsafe { variant.Anonymous.Anonymous.Anonymous.ullVal };
    let _ = unsafe { VariantClear(&mut variant) };
    value
}

impl QuotaRecord for FsrmRecord {
    fn set_limit(&mut self, limit: u64) -> Result<(), StatusCode> {
        unsafe { self.quota.SetQuotaLimit(unsigned_variant(limit)) }.map_err(StatusCode::from)
    }

    fn limit(&self) -> Result<u64, StatusCode> {
        let variant = unsafe { self.quota.QuotaLimit() }.map_err(StatusCode::from)?;
        Ok(read_unsigned(variant))
    }

    fn used(&self) -> Result<u64, StatusCode> {
        let variant = unsafe { self.quota.QuotaUsed() }.map_err(StatusCode::from)?;
        Ok(read_unsigned(variant))
    }

    fn commit(&mut self) -> Result<(), StatusCode> {
        unsafe { self.quota.Commit() }.map_err(StatusCode::from)
    }
}
