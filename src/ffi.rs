//! C ABI exports
//!
//! `SetQuota` and `GetQuotaUsed` return native status codes: `S_OK` on
//! success, otherwise the code of the step that failed.
#![cfg_attr(not(windows), allow(dead_code))]

use crate::quota::{QuotaManager, StatusCode};
use crate::subsystem::QuotaSubsystem;

/// Copy a NUL-terminated UTF-16 string
unsafe fn read_wide(ptr: *const u16) -> Result<String, StatusCode> {
    if ptr.is_null() {
        return Err(StatusCode::E_POINTER);
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16(std::slice::from_raw_parts(ptr, len))
        .map_err(|_| StatusCode::E_INVALIDARG)
}

pub(crate) unsafe fn set_quota_status<S: QuotaSubsystem>(
    manager: &QuotaManager<S>,
    volume: *const u16,
    limit: u64,
) -> i32 {
    let volume = match read_wide(volume) {
        Ok(volume) => volume,
        Err(code) => return code.as_i32(),
    };
    match manager.set_quota(&volume, limit) {
        Ok(()) => StatusCode::S_OK.as_i32(),
        Err(err) => err.code().as_i32(),
    }
}

pub(crate) unsafe fn get_quota_used_status<S: QuotaSubsystem>(
    manager: &QuotaManager<S>,
    volume: *const u16,
    used: *mut u64,
) -> i32 {
    if used.is_null() {
        return StatusCode::E_POINTER.as_i32();
    }
    let volume = match read_wide(volume) {
        Ok(volume) => volume,
        Err(code) => return code.as_i32(),
    };
    match manager.get_quota_used(&volume) {
        Ok(bytes) => {
            *used = bytes;
            StatusCode::S_OK.as_i32()
        }
        Err(err) => err.code().as_i32(),
    }
}

/// # Safety
///
/// `volume` must be null or point to a NUL-terminated UTF-16 string.
#[cfg(windows)]
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn SetQuota(volume: *const u16, limit: u64) -> i32 {
    set_quota_status(&crate::fsrm_manager(), volume, limit)
}

/// # Safety
///
/// `volume` must be null or point to a NUL-terminated UTF-16 string, and
/// `used` must be null or valid for a `u64` write.
#[cfg(windows)]
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn GetQuotaUsed(volume: *const u16, used: *mut u64) -> i32 {
    get_quota_used_status(&crate::fsrm_manager(), volume, used)
}
