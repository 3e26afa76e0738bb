//! Handler calling convention shared by the server and submitted programs.
//!
//! A submitted program is compiled as a `cdylib` and must export a
//! `#[no_mangle] static H: HandlerExport`. The descriptor is checked field by
//! field before the function pointer it carries is ever called:
//!
//! ```text
//! offset 0   magic: u64            == HANDLER_MAGIC
//! offset 8   abi_version: u32      == ABI_VERSION
//! offset 16  shape: *const c_char  == HANDLER_SHAPE (NUL-terminated)
//! offset 24  handle: Option<fn>    != null
//! ```
//!
//! # Safety boundary
//! Nothing here can prove that the exported bytes really are a
//! `HandlerExport`; the magic word and shape string are a declaration by the
//! submitter, not a proof. Once the check passes, the handler is native code
//! running inside this process with every privilege the server has.

use std::ffi::{c_char, c_void};

use crate::http::request::HandlerRequest;
use crate::http::response::ResponseBuffer;

/// Name of the exported descriptor symbol.
pub const HANDLER_SYMBOL: &str = "H";

/// Leading word of every valid descriptor ("ADDHANDL" in ASCII).
pub const HANDLER_MAGIC: u64 = 0x4144_4448_414e_444c;

/// Current descriptor layout version.
pub const ABI_VERSION: u32 = 1;

/// Declared shape a handler must carry.
pub const HANDLER_SHAPE: &str = "extern \"C\" fn(*mut ResponseWriter, *const Request)";

/// Borrowed byte slice passed across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSlice {
    pub ptr: *const u8,
    pub len: usize,
}

impl RawSlice {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { ptr: bytes.as_ptr(), len: bytes.len() }
    }

    /// # Safety
    /// `ptr` must be valid for `len` bytes for the lifetime `'a`.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        // SAFETY: upheld by the caller.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

#[repr(C)]
pub struct RawHeader {
    pub name: RawSlice,
    pub value: RawSlice,
}

/// Request view handed to the handler. Valid only for the duration of one call.
#[repr(C)]
pub struct RawRequest {
    pub method: RawSlice,
    pub path: RawSlice,
    pub query: RawSlice,
    pub headers: *const RawHeader,
    pub header_count: usize,
    pub body: RawSlice,
}

/// Host callbacks through which a handler produces its response.
#[repr(C)]
pub struct RawResponseWriter {
    pub ctx: *mut c_void,
    pub write_header: extern "C" fn(*mut c_void, u16),
    pub set_header: extern "C" fn(*mut c_void, RawSlice, RawSlice),
    pub write: extern "C" fn(*mut c_void, RawSlice) -> usize,
}

pub type HandlerFn = unsafe extern "C" fn(*mut RawResponseWriter, *const RawRequest);

/// Layout of the exported `H` descriptor.
#[repr(C)]
pub struct HandlerExport {
    pub magic: u64,
    pub abi_version: u32,
    pub shape: *const c_char,
    pub handle: Option<HandlerFn>,
}

// The callbacks never unwind: a panic here would cross an `extern "C"` frame.

extern "C" fn write_header_cb(ctx: *mut c_void, status: u16) {
    // SAFETY: ctx is the `&mut ResponseBuffer` installed by `invoke` for this call.
    let buffer = unsafe { &mut *ctx.cast::<ResponseBuffer>() };
    buffer.write_header(status);
}

extern "C" fn set_header_cb(ctx: *mut c_void, name: RawSlice, value: RawSlice) {
    // SAFETY: see `write_header_cb`; the slices are borrowed from the caller's frame.
    let buffer = unsafe { &mut *ctx.cast::<ResponseBuffer>() };
    let (name, value) = unsafe { (name.as_bytes(), value.as_bytes()) };
    buffer.set_header(name, value);
}

extern "C" fn write_cb(ctx: *mut c_void, bytes: RawSlice) -> usize {
    // SAFETY: see `set_header_cb`.
    let buffer = unsafe { &mut *ctx.cast::<ResponseBuffer>() };
    buffer.write(unsafe { bytes.as_bytes() })
}

/// Call a checked handler with `request`, collecting its output into `response`.
///
/// # Safety
/// `handle` must come from a descriptor that passed the loader's checks and
/// whose library is still mapped.
pub unsafe fn invoke(handle: HandlerFn, request: &HandlerRequest, response: &mut ResponseBuffer) {
    let headers: Vec<RawHeader> = request
        .headers
        .iter()
        .map(|(name, value)| RawHeader {
            name: RawSlice::from_bytes(name.as_bytes()),
            value: RawSlice::from_bytes(value),
        })
        .collect();

    let raw_request = RawRequest {
        method: RawSlice::from_bytes(request.method.as_bytes()),
        path: RawSlice::from_bytes(request.path.as_bytes()),
        query: RawSlice::from_bytes(request.query.as_bytes()),
        headers: headers.as_ptr(),
        header_count: headers.len(),
        body: RawSlice::from_bytes(&request.body),
    };

    let mut writer = RawResponseWriter {
        ctx: (response as *mut ResponseBuffer).cast::<c_void>(),
        write_header: write_header_cb,
        set_header: set_header_cb,
        write: write_cb,
    };

    // SAFETY: every pointer in `raw_request` and `writer` outlives this call.
    unsafe { handle(&mut writer, &raw_request) };
}

/// Source that submitted programs paste above their handler.
///
/// It declares the same `#[repr(C)]` layouts as this module and an
/// `export_handler!` macro that emits a correctly shaped `H`:
///
/// ```text
/// fn hello(w: &mut ResponseWriter, _r: &Request) {
///     w.write(b"hi");
/// }
/// export_handler!(hello);
/// ```
pub const PLUGIN_PRELUDE: &str = r##"#![allow(dead_code)]
use std::ffi::{c_char, c_void, CStr};

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Slice {
    pub ptr: *const u8,
    pub len: usize,
}

impl Slice {
    pub fn new(bytes: &[u8]) -> Self {
        Slice { ptr: bytes.as_ptr(), len: bytes.len() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

#[repr(C)]
pub struct Header {
    pub name: Slice,
    pub value: Slice,
}

#[repr(C)]
pub struct Request {
    pub method: Slice,
    pub path: Slice,
    pub query: Slice,
    pub headers: *const Header,
    pub header_count: usize,
    pub body: Slice,
}

impl Request {
    pub fn method(&self) -> &str { self.method.as_str() }
    pub fn path(&self) -> &str { self.path.as_str() }
    pub fn query(&self) -> &str { self.query.as_str() }
    pub fn body(&self) -> &[u8] { self.body.as_bytes() }

    pub fn header(&self, name: &str) -> Option<&str> {
        if self.headers.is_null() {
            return None;
        }
        let headers = unsafe { std::slice::from_raw_parts(self.headers, self.header_count) };
        headers
            .iter()
            .find(|h| h.name.as_str().eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[repr(C)]
pub struct ResponseWriter {
    ctx: *mut c_void,
    write_header_fn: extern "C" fn(*mut c_void, u16),
    set_header_fn: extern "C" fn(*mut c_void, Slice, Slice),
    write_fn: extern "C" fn(*mut c_void, Slice) -> usize,
}

impl ResponseWriter {
    pub fn write_header(&mut self, status: u16) {
        (self.write_header_fn)(self.ctx, status)
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        (self.set_header_fn)(self.ctx, Slice::new(name.as_bytes()), Slice::new(value.as_bytes()))
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        (self.write_fn)(self.ctx, Slice::new(bytes))
    }
}

#[repr(C)]
pub struct HandlerExport {
    pub magic: u64,
    pub abi_version: u32,
    pub shape: *const c_char,
    pub handle: Option<unsafe extern "C" fn(*mut ResponseWriter, *const Request)>,
}

unsafe impl Sync for HandlerExport {}

pub const HANDLER_MAGIC: u64 = 0x4144_4448_414e_444c;
pub const ABI_VERSION: u32 = 1;
pub const HANDLER_SHAPE: &CStr = c"extern \"C\" fn(*mut ResponseWriter, *const Request)";

macro_rules! export_handler {
    ($handler:path) => {
        unsafe extern "C" fn __addhandler_entry(w: *mut ResponseWriter, r: *const Request) {
            let (w, r) = unsafe { (&mut *w, &*r) };
            // A panic must not unwind into the host: it would abort the server.
            let served = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $handler(&mut *w, r)));
            if served.is_err() {
                w.write_header(500);
            }
        }

        #[no_mangle]
        pub static H: HandlerExport = HandlerExport {
            magic: HANDLER_MAGIC,
            abi_version: ABI_VERSION,
            shape: HANDLER_SHAPE.as_ptr(),
            handle: Some(__addhandler_entry),
        };
    };
}
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    unsafe extern "C" fn echo_handler(w: *mut RawResponseWriter, r: *const RawRequest) {
        let (w, r) = unsafe { (&mut *w, &*r) };
        let name = b"x-echo";
        let path = unsafe { r.path.as_bytes() };
        (w.set_header)(w.ctx, RawSlice::from_bytes(name), RawSlice::from_bytes(path));
        (w.write_header)(w.ctx, 201);
        (w.write)(w.ctx, r.body);
    }

    #[test]
    fn test_invoke_round_trips_through_callbacks() {
        let request = HandlerRequest {
            method: "POST".into(),
            path: "/x/libhandler.so".into(),
            query: String::new(),
            headers: vec![("content-type".into(), b"text/plain".to_vec())],
            body: b"payload".to_vec(),
        };
        let mut response = ResponseBuffer::new();

        unsafe { invoke(echo_handler, &request, &mut response) };

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), b"payload");
        assert_eq!(response.headers()["x-echo"], "/x/libhandler.so");
    }

    #[test]
    fn test_prelude_declares_matching_constants() {
        assert!(PLUGIN_PRELUDE.contains(&format!("HANDLER_MAGIC: u64 = 0x{:04x}_{:04x}_{:04x}_{:04x}",
            HANDLER_MAGIC >> 48, (HANDLER_MAGIC >> 32) & 0xffff, (HANDLER_MAGIC >> 16) & 0xffff, HANDLER_MAGIC & 0xffff)));
        assert!(PLUGIN_PRELUDE.contains(&format!("ABI_VERSION: u32 = {};", ABI_VERSION)));
        assert!(PLUGIN_PRELUDE.contains(&format!("pub static {}: HandlerExport", HANDLER_SYMBOL)));
        // The prelude spells the shape as a C string literal with escaped quotes
        assert!(PLUGIN_PRELUDE.contains(&HANDLER_SHAPE.replace('"', "\\\"")));
        // Handler panics are caught on the plugin side of the boundary
        assert!(PLUGIN_PRELUDE.contains("catch_unwind"));
    }
}
