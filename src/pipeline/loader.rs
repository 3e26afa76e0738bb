//! Artifact loader.
//!
//! # Responsibilities
//! - Open an artifact with the platform's dynamic loader
//! - Resolve the `H` export
//! - Check the export against the declared handler descriptor
//! - Hand back a callable that keeps its library mapped
//!
//! # Safety
//! This is where submitter-controlled native code enters the process.
//! Opening a library runs its initialisers; reading `H` trusts that the
//! symbol points at readable memory at least one descriptor long. The shape
//! check only rejects exports that do not *declare* the right shape. Nothing
//! bounds what an accepted handler does afterwards.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::http::request::HandlerRequest;
use crate::http::response::ResponseBuffer;
use crate::observability::metrics;
use crate::pipeline::abi::{self, HandlerExport, HandlerFn, ABI_VERSION, HANDLER_MAGIC, HANDLER_SHAPE, HANDLER_SYMBOL};
use crate::pipeline::error::LoadError;
use crate::routing::RouteHandler;

/// A handler resolved from a loaded artifact.
///
/// The library is never unloaded while this value is alive, which keeps the
/// handler's code mapped.
pub struct LoadedHandler {
    artifact: PathBuf,
    handle: HandlerFn,
    _library: Library,
}

impl std::fmt::Debug for LoadedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedHandler")
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl RouteHandler for LoadedHandler {
    fn serve(&self, request: &HandlerRequest, response: &mut ResponseBuffer) {
        // SAFETY: `handle` passed `check_export` and `_library` keeps it mapped.
        unsafe { abi::invoke(self.handle, request, response) }
    }
}

/// Open `path` and resolve its handler. Blocking; run off the async runtime.
pub fn load(path: &Path) -> Result<LoadedHandler, LoadError> {
    let result = load_inner(path);
    metrics::record_load(match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    });
    result
}

fn load_inner(path: &Path) -> Result<LoadedHandler, LoadError> {
    // SAFETY: runs the artifact's initialisers. See module docs.
    let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let export: *const HandlerExport = {
        // SAFETY: the symbol is only read as an address here.
        let symbol = unsafe { library.get::<*const HandlerExport>(HANDLER_SYMBOL.as_bytes()) }
            .map_err(|e| LoadError::SymbolNotFound {
                symbol: HANDLER_SYMBOL,
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        *symbol
    };

    // SAFETY: `export` comes from a symbol in `library`, which is still open.
    let handle = unsafe { check_export(export) }?;

    tracing::info!(artifact = %path.display(), "Handler loaded");
    Ok(LoadedHandler {
        artifact: path.to_path_buf(),
        handle,
        _library: library,
    })
}

/// Validate a descriptor, returning its handler function.
///
/// # Safety
/// `export` must be null or point at readable memory of at least
/// `size_of::<HandlerExport>()` bytes. If the magic and version match, `shape`
/// must be null or a NUL-terminated string.
unsafe fn check_export(export: *const HandlerExport) -> Result<HandlerFn, LoadError> {
    let mismatch = |observed: String| LoadError::TypeMismatch {
        symbol: HANDLER_SYMBOL,
        observed,
    };

    if export.is_null() {
        return Err(mismatch("null pointer".to_string()));
    }

    // Read the leading word alone first: if it is not ours, nothing else is trusted.
    // SAFETY: upheld by the caller.
    let magic = unsafe { std::ptr::read_unaligned(export.cast::<u64>()) };
    if magic != HANDLER_MAGIC {
        return Err(mismatch(format!(
            "<not a handler descriptor; leading word {:#018x}>",
            magic
        )));
    }

    // SAFETY: the magic matched, so the export declares itself a descriptor.
    let descriptor = unsafe { &*export };
    if descriptor.abi_version != ABI_VERSION {
        return Err(mismatch(format!(
            "<handler descriptor ABI v{}; this server speaks v{}>",
            descriptor.abi_version, ABI_VERSION
        )));
    }

    if descriptor.shape.is_null() {
        return Err(mismatch("<handler descriptor without a shape>".to_string()));
    }
    // SAFETY: upheld by the caller.
    let shape = unsafe { CStr::from_ptr(descriptor.shape) }.to_string_lossy();
    if shape != HANDLER_SHAPE {
        return Err(mismatch(shape.into_owned()));
    }

    descriptor
        .handle
        .ok_or_else(|| mismatch(format!("{} (null handler)", HANDLER_SHAPE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::abi::{RawRequest, RawResponseWriter};
    use std::ffi::c_char;

    unsafe extern "C" fn noop(_w: *mut RawResponseWriter, _r: *const RawRequest) {}

    fn descriptor(magic: u64, abi_version: u32, shape: *const c_char, handle: Option<HandlerFn>) -> HandlerExport {
        HandlerExport { magic, abi_version, shape, handle }
    }

    const GOOD_SHAPE: &CStr = c"extern \"C\" fn(*mut ResponseWriter, *const Request)";

    #[test]
    fn test_good_shape_string_matches_constant() {
        assert_eq!(GOOD_SHAPE.to_str().unwrap(), HANDLER_SHAPE);
    }

    #[test]
    fn test_accepts_valid_descriptor() {
        let export = descriptor(HANDLER_MAGIC, ABI_VERSION, GOOD_SHAPE.as_ptr(), Some(noop));
        let handle = unsafe { check_export(&export) }.unwrap();
        assert_eq!(handle as usize, noop as HandlerFn as usize);
    }

    #[test]
    fn test_rejects_wrong_magic_with_observed_word() {
        let export = descriptor(0xdead_beef, ABI_VERSION, GOOD_SHAPE.as_ptr(), Some(noop));
        let err = unsafe { check_export(&export) }.unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { .. }));
        assert!(err.to_string().contains("0x00000000deadbeef"));
    }

    #[test]
    fn test_rejects_other_abi_version() {
        let export = descriptor(HANDLER_MAGIC, 7, GOOD_SHAPE.as_ptr(), Some(noop));
        let err = unsafe { check_export(&export) }.unwrap_err();
        assert!(err.to_string().contains("ABI v7"));
    }

    #[test]
    fn test_rejects_other_shape_and_reports_it() {
        let shape = c"fn(Request) -> Response";
        let export = descriptor(HANDLER_MAGIC, ABI_VERSION, shape.as_ptr(), Some(noop));
        let err = unsafe { check_export(&export) }.unwrap_err();
        match err {
            LoadError::TypeMismatch { observed, .. } => assert_eq!(observed, "fn(Request) -> Response"),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_null_handler_and_null_shape() {
        let export = descriptor(HANDLER_MAGIC, ABI_VERSION, GOOD_SHAPE.as_ptr(), None);
        assert!(unsafe { check_export(&export) }.unwrap_err().to_string().contains("null handler"));

        let export = descriptor(HANDLER_MAGIC, ABI_VERSION, std::ptr::null(), Some(noop));
        assert!(unsafe { check_export(&export) }.unwrap_err().to_string().contains("without a shape"));
    }

    #[test]
    fn test_open_failure_is_load_error() {
        let err = load(Path::new("/no/such/libhandler.so")).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }
}
