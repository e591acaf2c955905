//! `dlopen` backend.

use std::ffi::{c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

pub(super) struct Handle(NonNull<c_void>);

// dlsym and dlclose may be called from any thread.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

pub(super) fn open(path: &Path) -> Result<Handle, String> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| "path contains an interior NUL byte".to_string())?;
    let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
    NonNull::new(raw).map(Handle).ok_or_else(last_error)
}

pub(super) fn resolve(handle: &Handle, symbol: &str) -> Option<NonNull<c_void>> {
    let c_symbol = CString::new(symbol).ok()?;
    let raw = unsafe { libc::dlsym(handle.0.as_ptr(), c_symbol.as_ptr()) };
    NonNull::new(raw)
}

pub(super) fn close(handle: Handle) {
    unsafe {
        libc::dlclose(handle.0.as_ptr());
    }
}

fn last_error() -> String {
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        "dlopen failed".to_string()
    } else {
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    }
}
