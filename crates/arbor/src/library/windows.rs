//! `LoadLibraryA` backend.

use std::ffi::{c_char, c_void, CString};
use std::path::Path;
use std::ptr::NonNull;

type Module = *mut c_void;

#[link(name = "kernel32")]
unsafe extern "system" {
    fn LoadLibraryA(name: *const c_char) -> Module;
    fn GetProcAddress(module: Module, name: *const c_char) -> *mut c_void;
    fn FreeLibrary(module: Module) -> i32;
    fn GetLastError() -> u32;
}

pub(super) struct Handle(NonNull<c_void>);

// Module handles are process wide and GetProcAddress is thread safe.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

pub(super) fn open(path: &Path) -> Result<Handle, String> {
    let name = path
        .to_str()
        .ok_or_else(|| "path is not valid unicode".to_string())?;
    let c_name = CString::new(name).map_err(|_| "path contains an interior NUL byte".to_string())?;
    let raw = unsafe { LoadLibraryA(c_name.as_ptr()) };
    NonNull::new(raw)
        .map(Handle)
        .ok_or_else(|| format!("LoadLibraryA failed with error code {}", unsafe { GetLastError() }))
}

pub(super) fn resolve(handle: &Handle, symbol: &str) -> Option<NonNull<c_void>> {
    let c_symbol = CString::new(symbol).ok()?;
    let raw = unsafe { GetProcAddress(handle.0.as_ptr(), c_symbol.as_ptr()) };
    NonNull::new(raw)
}

pub(super) fn close(handle: Handle) {
    unsafe {
        FreeLibrary(handle.0.as_ptr());
    }
}
