//! # Library Loader
//!
//! Resolves the entry points of a compiled prediction routine by name.
//!
//! All of the engine is written against the [`SymbolSource`] trait. Two
//! sources ship with the crate:
//!
//! - [`DynamicLibrary`] opens a shared library artifact (`.so`, `.dylib`,
//!   `.dll`). The platform backend is selected at build time: `dlopen` on
//!   unix targets, `LoadLibraryA` on windows.
//! - [`SymbolMap`] serves routines that were linked into the host binary,
//!   registered by name.
//!
//! Loading happens once, before any prediction starts. Resolved addresses are
//! only valid while their source is alive, so the owner of a source must keep
//! it around for as long as any resolved routine may be called.
//!
//! Nothing here can check that an address really is a function with the
//! signature its name promises. That promise is made by whoever vouches for
//! the code: implementing [`SymbolSource`], registering a raw address with
//! [`SymbolMap::with_symbol`], and opening an artifact with
//! [`DynamicLibrary::open`] are all `unsafe`.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use tracing::debug;
use crate::error::LoadError;
use crate::routine::{
    PredictMultiFn,
    PredictSingleFn,
    QueryFn,
    PREDICT_MULTI_SYMBOL,
    PREDICT_SINGLE_SYMBOL,
    QUERY_SYMBOL,
};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as sys;

/// A named collection of exported routines.
///
/// # Safety
///
/// Every address returned by [`symbol`](Self::symbol) for one of the names in
/// [`routine`](crate::routine) must be a function with that name's ABI
/// signature, and must stay callable from any thread for as long as the
/// source is alive. The engine transmutes and calls these addresses without
/// further checks.
///
/// ```compile_fail
/// use std::ffi::c_void;
/// use std::ptr::NonNull;
/// use arbor::{LoadError, SymbolSource};
///
/// struct Anywhere;
///
/// impl SymbolSource for Anywhere {
///     fn name(&self) -> &str {
///         "anywhere"
///     }
///
///     fn symbol(&self, _symbol: &str) -> Result<NonNull<c_void>, LoadError> {
///         Ok(NonNull::dangling())
///     }
/// }
/// ```
pub unsafe trait SymbolSource: Send + Sync {
    /// A human readable name for diagnostics, usually the artifact path.
    fn name(&self) -> &str;

    /// Look up the address of `symbol`.
    ///
    /// Fails with [`LoadError::MissingSymbol`] when the symbol is not exported.
    fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError>;
}

/// A shared library opened from disk.
///
/// The handle is released by [`DynamicLibrary::close`] or on drop, whichever
/// comes first; releasing is idempotent.
pub struct DynamicLibrary {
    name: String,
    handle: Option<sys::Handle>,
}

impl DynamicLibrary {
    /// Open the artifact at `path`.
    ///
    /// # Safety
    ///
    /// Opening runs the artifact's initialization code, and the library is
    /// then trusted as a [`SymbolSource`]. `path` must name a compiled model
    /// whose exported routines match the signatures in
    /// [`routine`](crate::routine).
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let handle = sys::open(path).map_err(|reason| LoadError::Open {
            path: name.clone(),
            reason,
        })?;
        debug!(library = %name, "opened shared library");

        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    /// Whether the library handle is still held.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the library handle. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            sys::close(handle);
            debug!(library = %self.name, "closed shared library");
        }
    }
}

// SAFETY: a `DynamicLibrary` only exists through `open`, whose caller vouches
// for the artifact.
unsafe impl SymbolSource for DynamicLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        self.handle
            .as_ref()
            .and_then(|handle| sys::resolve(handle, symbol))
            .ok_or_else(|| LoadError::MissingSymbol {
                symbol: symbol.to_string(),
                library: self.name.clone(),
            })
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Address of a routine registered in a [`SymbolMap`].
#[derive(Clone, Copy, Debug)]
struct Address(NonNull<c_void>);

// Addresses registered in a map point at code, which is immutable and shared.
unsafe impl Send for Address {}
unsafe impl Sync for Address {}

/// Routines linked into the current binary, looked up by name.
///
/// ```ignore
/// use arbor::{Entry, Predictor, SymbolMap};
///
/// extern "C" fn num_groups() -> usize { 1 }
/// extern "C" fn predict(row: *mut Entry, _margin: i32) -> f32 { 0.5 }
///
/// let symbols = SymbolMap::new("embedded")
///     .with_query(num_groups)
///     .with_predict(predict);
///
/// let mut predictor = Predictor::new();
/// predictor.load_from(symbols)?;
/// ```
#[derive(Clone, Debug)]
pub struct SymbolMap {
    name: String,
    symbols: HashMap<String, Address>,
}

impl SymbolMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    /// Register `address` under `symbol`. Null addresses are ignored.
    ///
    /// Prefer the typed [`with_query`](Self::with_query),
    /// [`with_predict`](Self::with_predict) and
    /// [`with_predict_multiclass`](Self::with_predict_multiclass).
    ///
    /// ```compile_fail
    /// use arbor::SymbolMap;
    ///
    /// let symbols = SymbolMap::new("raw").with_symbol("get_num_output_group", std::ptr::null());
    /// ```
    ///
    /// # Safety
    ///
    /// When `symbol` is one of the names in [`routine`](crate::routine),
    /// `address` must point at a function with that name's signature that
    /// stays valid for the life of the program.
    pub unsafe fn with_symbol(mut self, symbol: impl Into<String>, address: *const c_void) -> Self {
        if let Some(address) = NonNull::new(address.cast_mut()) {
            self.symbols.insert(symbol.into(), Address(address));
        }
        self
    }

    /// Register the output group query.
    pub fn with_query(self, func: QueryFn) -> Self {
        // SAFETY: the signature is enforced by `QueryFn`.
        unsafe { self.with_symbol(QUERY_SYMBOL, func as *const c_void) }
    }

    /// Register the single output prediction routine.
    pub fn with_predict(self, func: PredictSingleFn) -> Self {
        // SAFETY: the signature is enforced by `PredictSingleFn`.
        unsafe { self.with_symbol(PREDICT_SINGLE_SYMBOL, func as *const c_void) }
    }

    /// Register the multi output prediction routine.
    pub fn with_predict_multiclass(self, func: PredictMultiFn) -> Self {
        // SAFETY: the signature is enforced by `PredictMultiFn`.
        unsafe { self.with_symbol(PREDICT_MULTI_SYMBOL, func as *const c_void) }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// SAFETY: addresses under routine names only enter through the typed
// registrations or the `unsafe` `with_symbol`.
unsafe impl SymbolSource for SymbolMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        self.symbols
            .get(symbol)
            .map(|address| address.0)
            .ok_or_else(|| LoadError::MissingSymbol {
                symbol: symbol.to_string(),
                library: self.name.clone(),
            })
    }
}
