//! Purpose: C ABI bridge for bindings (libpluckite).
//! Exports: C-callable document parse/free, typed field getters, and
//! string-array/error helpers.
//! Role: Stable ABI surface for non-Rust bindings in v0.
//! Invariants: Return value is a status code (`to_status_code`); 0 is
//! success and out-parameters are written on success only.
//! Invariants: Owned results have explicit free functions; borrowed
//! results stay valid only while their document handle lives and must
//! never be freed.

use crate::api::{Diagnostics, Doc, DocRef, FieldType, in_range, to_status_code};
use crate::core::error::{Error, ErrorKind};
use crate::json::parse::doc_from_slice;
use serde_json::Value;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(C)]
pub struct plk_doc {
    // First field at offset zero, so a pointer to an interior value
    // doubles as a borrowed plk_doc handle.
    value: Value,
}

#[repr(C)]
pub struct plk_strings {
    pub items: *mut *mut c_char,
    pub len: usize,
}

#[repr(C)]
pub struct plk_error {
    pub status: i32,
    pub message: *mut c_char,
    pub field: *mut c_char,
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_doc_parse(
    bytes: *const u8,
    len: usize,
    out_doc: *mut *mut plk_doc,
    out_err: *mut *mut plk_error,
) -> i32 {
    if out_doc.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_doc is null"),
        );
    }
    if bytes.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("bytes is null"),
        );
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len) };
    let doc = match doc_from_slice(slice) {
        Ok(doc) => doc,
        Err(err) => return fail(out_err, err),
    };
    let handle = Box::new(plk_doc {
        value: doc.into_value(),
    });
    #[cfg(test)]
    LIVE_DOCS.fetch_add(1, Ordering::Relaxed);
    unsafe {
        *out_doc = Box::into_raw(handle);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_doc_free(doc: *mut plk_doc) {
    if doc.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(doc));
    }
    #[cfg(test)]
    LIVE_DOCS.fetch_sub(1, Ordering::Relaxed);
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_string(
    doc: *const plk_doc,
    field: *const c_char,
    out_str: *mut *mut c_char,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_str.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_str is null"),
        );
    }
    let diag = Diagnostics::new();
    let value = match node.fields(&diag).get::<String>(field) {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    write_c_string(field, &value, out_str, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_string_or(
    doc: *const plk_doc,
    field: *const c_char,
    default_value: *const c_char,
    out_str: *mut *mut c_char,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    let default_value = match parse_c_str(default_value, "default_value", out_err) {
        Ok(default_value) => default_value,
        Err(code) => return code,
    };
    if out_str.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_str is null"),
        );
    }
    let diag = Diagnostics::new();
    let value = match node
        .fields(&diag)
        .get_or::<String>(field, default_value.to_owned())
    {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    write_c_string(field, &value, out_str, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_string_free(text: *mut c_char) {
    if text.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(text));
    }
    #[cfg(test)]
    LIVE_STRINGS.fetch_sub(1, Ordering::Relaxed);
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_string_borrowed(
    doc: *const plk_doc,
    field: *const c_char,
    out_ptr: *mut *const u8,
    out_len: *mut usize,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_ptr.is_null() || out_len.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_ptr or out_len is null"),
        );
    }
    let diag = Diagnostics::new();
    // Borrowed bytes are not NUL-terminated; the length travels with
    // the pointer.
    let text = match node.fields(&diag).borrowed_str(field) {
        Ok(text) => text,
        Err(err) => return fail(out_err, err),
    };
    unsafe {
        *out_ptr = text.as_ptr();
        *out_len = text.len();
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_string_fixed(
    doc: *const plk_doc,
    field: *const c_char,
    buf: *mut c_char,
    capacity: usize,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if buf.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("buf is null"),
        );
    }
    let dest = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, capacity) };
    let diag = Diagnostics::new();
    match node.fields(&diag).fixed_str(field, dest) {
        Ok(_) => 0,
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_string_fixed_or(
    doc: *const plk_doc,
    field: *const c_char,
    default_value: *const c_char,
    buf: *mut c_char,
    capacity: usize,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    let default_value = match parse_c_str(default_value, "default_value", out_err) {
        Ok(default_value) => default_value,
        Err(code) => return code,
    };
    if buf.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("buf is null"),
        );
    }
    let dest = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, capacity) };
    let diag = Diagnostics::new();
    match node.fields(&diag).fixed_str_or(field, default_value, dest) {
        Ok(_) => 0,
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_int(
    doc: *const plk_doc,
    field: *const c_char,
    out_val: *mut i64,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    match node.fields(&diag).get::<i64>(field) {
        Ok(value) => {
            unsafe {
                *out_val = value;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_int_or(
    doc: *const plk_doc,
    field: *const c_char,
    default_value: i64,
    out_val: *mut i64,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    match node.fields(&diag).get_or::<i64>(field, default_value) {
        Ok(value) => {
            unsafe {
                *out_val = value;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_uint(
    doc: *const plk_doc,
    field: *const c_char,
    min: u64,
    max: u64,
    has_range: u32,
    out_val: *mut u64,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    let ex = node.fields(&diag);
    let result = if has_range != 0 {
        ex.get_checked::<u64, _>(field, in_range(min, max))
    } else {
        ex.get::<u64>(field)
    };
    match result {
        Ok(value) => {
            unsafe {
                *out_val = value;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_uint_or(
    doc: *const plk_doc,
    field: *const c_char,
    min: u64,
    max: u64,
    has_range: u32,
    default_value: u64,
    out_val: *mut u64,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    let ex = node.fields(&diag);
    let result = if has_range != 0 {
        ex.get_checked_or::<u64, _>(field, in_range(min, max), default_value)
    } else {
        ex.get_or::<u64>(field, default_value)
    };
    match result {
        Ok(value) => {
            unsafe {
                *out_val = value;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_bool(
    doc: *const plk_doc,
    field: *const c_char,
    out_val: *mut u8,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    match node.fields(&diag).get::<bool>(field) {
        Ok(value) => {
            unsafe {
                *out_val = value as u8;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_bool_or(
    doc: *const plk_doc,
    field: *const c_char,
    default_value: u8,
    out_val: *mut u8,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_val.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_val is null"),
        );
    }
    let diag = Diagnostics::new();
    match node.fields(&diag).get_or::<bool>(field, default_value != 0) {
        Ok(value) => {
            unsafe {
                *out_val = value as u8;
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_strings(
    doc: *const plk_doc,
    field: *const c_char,
    out_arr: *mut plk_strings,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_arr.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_arr is null"),
        );
    }
    let diag = Diagnostics::new();
    let values = match node.fields(&diag).get::<Vec<String>>(field) {
        Ok(values) => values,
        Err(err) => return fail(out_err, err),
    };
    let mut items: Vec<*mut c_char> = Vec::with_capacity(values.len());
    for value in &values {
        let raw = to_c_string(value);
        if raw.is_null() {
            for item in items {
                unsafe {
                    drop(CString::from_raw(item));
                }
            }
            return fail(
                out_err,
                Error::new(ErrorKind::Mismatch)
                    .with_field(field)
                    .with_message("string contains an interior NUL byte"),
            );
        }
        items.push(raw);
    }
    #[cfg(test)]
    LIVE_STRINGS.fetch_add(items.len(), Ordering::Relaxed);
    let mut data = items.into_boxed_slice();
    unsafe {
        let arr = &mut *out_arr;
        arr.len = data.len();
        arr.items = data.as_mut_ptr();
        std::mem::forget(data);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_strings_len(arr: *const plk_strings) -> usize {
    if arr.is_null() {
        return 0;
    }
    unsafe { (*arr).len }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_strings_get(arr: *const plk_strings, index: usize) -> *const c_char {
    if arr.is_null() {
        return ptr::null();
    }
    let arr = unsafe { &*arr };
    if arr.items.is_null() || index >= arr.len {
        return ptr::null();
    }
    unsafe { *arr.items.add(index) }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_strings_free(arr: *mut plk_strings) {
    if arr.is_null() {
        return;
    }
    unsafe {
        let arr = &mut *arr;
        if !arr.items.is_null() && arr.len != 0 {
            let items = Vec::from_raw_parts(arr.items, arr.len, arr.len);
            #[cfg(test)]
            LIVE_STRINGS.fetch_sub(items.len(), Ordering::Relaxed);
            for item in items {
                if !item.is_null() {
                    drop(CString::from_raw(item));
                }
            }
        }
        arr.items = ptr::null_mut();
        arr.len = 0;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_doc(
    doc: *const plk_doc,
    field: *const c_char,
    out_doc: *mut *mut plk_doc,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_doc.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_doc is null"),
        );
    }
    let diag = Diagnostics::new();
    let subtree = match node.fields(&diag).get::<Doc>(field) {
        Ok(subtree) => subtree,
        Err(err) => return fail(out_err, err),
    };
    let handle = Box::new(plk_doc {
        value: subtree.into_value(),
    });
    #[cfg(test)]
    LIVE_DOCS.fetch_add(1, Ordering::Relaxed);
    unsafe {
        *out_doc = Box::into_raw(handle);
    }
    0
}

/// Writes a borrowed node handle into `out_node`. Only the out-pointer
/// itself must be non-null; its prior value is ignored, so a
/// null-initialized destination is accepted (some C bindings expect the
/// destination to be pre-set before the call — this surface does not).
/// The handle is valid while `doc` lives and must never be freed.
#[unsafe(no_mangle)]
pub extern "C" fn plk_get_doc_borrowed(
    doc: *const plk_doc,
    field: *const c_char,
    out_node: *mut *const plk_doc,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_node.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_node is null"),
        );
    }
    let diag = Diagnostics::new();
    let subtree = match node.fields(&diag).borrowed_node(field) {
        Ok(subtree) => subtree,
        Err(err) => return fail(out_err, err),
    };
    unsafe {
        *out_node = subtree.raw() as *const Value as *const plk_doc;
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_value(
    doc: *const plk_doc,
    field: *const c_char,
    ty: i32,
    out_json: *mut *mut c_char,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    if out_json.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_json is null"),
        );
    }
    let ty = match field_type_from_code(ty) {
        Ok(ty) => ty,
        Err(err) => return fail(out_err, err),
    };
    let diag = Diagnostics::new();
    let value = match node.fields(&diag).get_tagged(field, ty) {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    write_c_string(field, &value.to_string(), out_json, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_get_value_or(
    doc: *const plk_doc,
    field: *const c_char,
    ty: i32,
    default_json: *const c_char,
    out_json: *mut *mut c_char,
    out_err: *mut *mut plk_error,
) -> i32 {
    let node = match borrow_doc(doc, out_err) {
        Ok(node) => node,
        Err(code) => return code,
    };
    let field = match parse_c_str(field, "field", out_err) {
        Ok(field) => field,
        Err(code) => return code,
    };
    let default_json = match parse_c_str(default_json, "default_json", out_err) {
        Ok(default_json) => default_json,
        Err(code) => return code,
    };
    if out_json.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("out_json is null"),
        );
    }
    let ty = match field_type_from_code(ty) {
        Ok(ty) => ty,
        Err(err) => return fail(out_err, err),
    };
    let default_value: Value = match serde_json::from_str(default_json) {
        Ok(value) => value,
        Err(err) => {
            return fail(
                out_err,
                Error::new(ErrorKind::InvalidParam)
                    .with_message("default_json is not valid json")
                    .with_source(err),
            );
        }
    };
    let diag = Diagnostics::new();
    let value = match node.fields(&diag).get_tagged_or(field, ty, &default_value) {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    write_c_string(field, &value.to_string(), out_json, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn plk_error_free(err: *mut plk_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
        if !err.field.is_null() {
            drop(CString::from_raw(err.field));
        }
    }
    #[cfg(test)]
    LIVE_ERRORS.fetch_sub(1, Ordering::Relaxed);
}

fn borrow_doc<'a>(doc: *const plk_doc, out_err: *mut *mut plk_error) -> Result<DocRef<'a>, i32> {
    if doc.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message("doc is null"),
        ));
    }
    Ok(DocRef::new(unsafe { &(*doc).value }))
}

fn parse_c_str<'a>(
    input: *const c_char,
    name: &str,
    out_err: *mut *mut plk_error,
) -> Result<&'a str, i32> {
    if input.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message(format!("{name} is null")),
        ));
    }
    unsafe { CStr::from_ptr(input) }.to_str().map_err(|_| {
        fail(
            out_err,
            Error::new(ErrorKind::InvalidParam).with_message(format!("{name} is not valid UTF-8")),
        )
    })
}

fn write_c_string(
    field: &str,
    value: &str,
    out: *mut *mut c_char,
    out_err: *mut *mut plk_error,
) -> i32 {
    let raw = to_c_string(value);
    if raw.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Mismatch)
                .with_field(field)
                .with_message("string contains an interior NUL byte"),
        );
    }
    #[cfg(test)]
    LIVE_STRINGS.fetch_add(1, Ordering::Relaxed);
    unsafe {
        *out = raw;
    }
    0
}

fn fail(out_err: *mut *mut plk_error, err: Error) -> i32 {
    let status = to_status_code(err.kind());
    if out_err.is_null() {
        return status;
    }
    let error = Box::new(plk_error {
        status,
        message: to_c_string(err.message().unwrap_or("")),
        field: err.field().map(to_c_string).unwrap_or(ptr::null_mut()),
    });
    #[cfg(test)]
    LIVE_ERRORS.fetch_add(1, Ordering::Relaxed);
    unsafe {
        *out_err = Box::into_raw(error);
    }
    status
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn field_type_from_code(code: i32) -> Result<FieldType, Error> {
    match code {
        0 => Ok(FieldType::String),
        1 => Ok(FieldType::Int),
        2 => Ok(FieldType::Uint),
        3 => Ok(FieldType::Bool),
        4 => Ok(FieldType::Strings),
        5 => Ok(FieldType::Json),
        other => Err(Error::new(ErrorKind::InvalidParam)
            .with_message(format!("unknown field type code {other}"))),
    }
}

#[cfg(test)]
static LIVE_DOCS: AtomicUsize = AtomicUsize::new(0);
#[cfg(test)]
static LIVE_STRINGS: AtomicUsize = AtomicUsize::new(0);
#[cfg(test)]
static LIVE_ERRORS: AtomicUsize = AtomicUsize::new(0);

#[cfg(test)]
pub(crate) fn live_alloc_snapshot() -> (usize, usize, usize) {
    (
        LIVE_DOCS.load(Ordering::Relaxed),
        LIVE_STRINGS.load(Ordering::Relaxed),
        LIVE_ERRORS.load(Ordering::Relaxed),
    )
}
