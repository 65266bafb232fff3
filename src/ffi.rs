//! FFI interface for C/C++ callers
//!
//! Inputs and outputs cross the boundary as JSON strings.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde::Serialize;

use crate::config::ExtractionConfig;
use crate::pipeline::{extract_with_config, narrow, ExtractionResult};

/// Result struct returned to C
/// Both pointers are owned by Rust and must be freed via gridsift_free_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized result (null-terminated), or null on failure
    pub json_ptr: *mut c_char,
    /// Error message (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extract every structure from an HTML page.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `source_url` - Page URL (null-terminated), or null
/// * `config_json` - JSON-serialized ExtractionConfig (null-terminated), or null for defaults
///
/// # Returns
/// ExtractionResultFFI with json_ptr set to the ExtractionResult JSON on success
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `source_url` and `config_json` must be null or valid null-terminated C strings
/// - Caller must free the result via `gridsift_free_result`
#[no_mangle]
pub unsafe extern "C" fn gridsift_extract(
    html_ptr: *const c_char,
    html_len: usize,
    source_url: *const c_char,
    config_json: *const c_char,
) -> ExtractionResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(html) => html,
        Err(msg) => return make_error_result(msg),
    };

    let source_url = match read_optional_str(source_url) {
        Ok(url) => url,
        Err(_) => return make_error_result("Invalid UTF-8 in source URL"),
    };

    let config = match read_optional_str(config_json) {
        Ok(None) => ExtractionConfig::default(),
        Ok(Some(json)) => match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => return make_error_result(&format!("Failed to parse config JSON: {}", e)),
        },
        Err(_) => return make_error_result("Invalid UTF-8 in config JSON"),
    };

    let result = extract_with_config(html, source_url, &config);
    make_json_result(&result)
}

/// Narrow a previous extraction result to a question.
///
/// # Arguments
/// * `results_json` - JSON returned by `gridsift_extract` (null-terminated)
/// * `query` - The question (null-terminated)
/// * `top_n` - Maximum rows to return, 0 for all
///
/// # Returns
/// ExtractionResultFFI with json_ptr set to the NarrowResult JSON on success
///
/// # Safety
/// - `results_json` and `query` must be valid null-terminated C strings
/// - Caller must free the result via `gridsift_free_result`
#[no_mangle]
pub unsafe extern "C" fn gridsift_narrow(
    results_json: *const c_char,
    query: *const c_char,
    top_n: usize,
) -> ExtractionResultFFI {
    let results_str = match read_optional_str(results_json) {
        Ok(Some(s)) => s,
        Ok(None) => return make_error_result("Results JSON is null"),
        Err(_) => return make_error_result("Invalid UTF-8 in results JSON"),
    };
    let query = match read_optional_str(query) {
        Ok(Some(q)) => q,
        Ok(None) => return make_error_result("Query is null"),
        Err(_) => return make_error_result("Invalid UTF-8 in query"),
    };

    let results: ExtractionResult = match serde_json::from_str(results_str) {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Failed to parse results JSON: {}", e)),
    };

    make_json_result(&narrow(&results, query, top_n))
}

/// Free an ExtractionResultFFI returned by this library
///
/// # Safety
/// - `result` must have been returned by `gridsift_extract` or `gridsift_narrow`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn gridsift_free_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_html<'a>(html_ptr: *const c_char, html_len: usize) -> Result<&'a str, &'static str> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok("");
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice).map_err(|_| "Invalid UTF-8 in HTML content")
}

unsafe fn read_optional_str<'a>(
    ptr: *const c_char,
) -> Result<Option<&'a str>, std::str::Utf8Error> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr).to_str().map(Some)
}

fn make_json_result<T: Serialize>(value: &T) -> ExtractionResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

fn make_error_result(msg: &str) -> ExtractionResultFFI {
    let error = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error.into_raw(),
    }
}
