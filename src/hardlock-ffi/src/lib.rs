//! # hardlock-ffi
//!
//! C-compatible FFI surface for Hardlock.
//!
//! This crate provides a stable C ABI for integrating Hardlock license
//! checks into applications written in any language that can call C
//! functions: the CLI tools and foreign-language wrappers all go through
//! this surface.
//!
//! ## Usage
//!
//! ```c
//! #include "hardlock.h"
//!
//! int main(void) {
//!     HardlockHandle *handle = hardlock_init(secret, secret_len);
//!     if (!handle) {
//!         return 1;
//!     }
//!
//!     if (hardlock_validate_license(handle, token, token_len) == 1 &&
//!         hardlock_has_feature(handle, "export") == 1) {
//!         // feature-gated path
//!     }
//!
//!     const char *hwid = hardlock_get_hwid(handle);  // borrowed
//!
//!     hardlock_destroy(handle);
//!     return 0;
//! }
//! ```

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::{Mutex, MutexGuard, Once, OnceLock};

use hardlock_core::LicenseManager;

/// Ensure tracing is initialized exactly once.
static TRACING_INIT: Once = Once::new();

/// Opaque handle to a Hardlock license manager.
///
/// C callers are not bound by Rust's borrow discipline, so the inner
/// manager sits behind a mutex and the handle is safe to use from any
/// thread.
pub struct HardlockHandle {
    manager: Mutex<LicenseManager>,
    hwid: OnceLock<CString>,
}

impl HardlockHandle {
    fn lock(&self) -> MutexGuard<'_, LicenseManager> {
        match self.manager.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Return codes for the query functions.
#[repr(C)]
pub enum HardlockCode {
    /// The predicate holds: license valid, feature granted.
    Affirm = 1,
    /// The predicate does not hold.
    Deny = 0,
    /// A pointer argument was null or malformed.
    InvalidArgument = -1,
}

/// Initialize a Hardlock handle from a caller-supplied secret.
///
/// The secret bytes are copied; the caller keeps ownership of its buffer.
/// Validation runs in lenient mode. Returns NULL when the arguments are
/// invalid.
///
/// # Safety
///
/// - `secret` must point to valid memory of at least `secret_len` bytes
/// - the returned handle must be freed with [`hardlock_destroy`]
#[no_mangle]
pub unsafe extern "C" fn hardlock_init(
    secret: *const u8,
    secret_len: usize,
) -> *mut HardlockHandle {
    hardlock_init_with_config(secret, secret_len, 0)
}

/// Initialize a Hardlock handle with explicit validation mode.
///
/// As [`hardlock_init`], but `strict` selects the validation mode: nonzero
/// makes failed checks raise inside the library (the query functions then
/// report them as denials), zero keeps the default lenient behavior.
///
/// # Safety
///
/// - `secret` must point to valid memory of at least `secret_len` bytes
/// - the returned handle must be freed with [`hardlock_destroy`]
#[no_mangle]
pub unsafe extern "C" fn hardlock_init_with_config(
    secret: *const u8,
    secret_len: usize,
    strict: i32,
) -> *mut HardlockHandle {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    });

    if secret.is_null() || secret_len == 0 {
        tracing::error!("hardlock_init called without a secret");
        return ptr::null_mut();
    }
    let secret = std::slice::from_raw_parts(secret, secret_len);

    tracing::info!(
        strict = strict != 0,
        "Hardlock FFI init (v{})",
        env!("CARGO_PKG_VERSION")
    );
    let mut manager = LicenseManager::new(secret);
    manager.set_strict_validation(strict != 0);
    let handle = Box::new(HardlockHandle {
        manager: Mutex::new(manager),
        hwid: OnceLock::new(),
    });
    Box::into_raw(handle)
}

/// Validate a license token.
///
/// Returns 1 when the token is valid for this machine and secret, 0 when it
/// is not, and a negative code for invalid arguments. The verdict also
/// becomes the state consulted by [`hardlock_has_feature`].
///
/// # Safety
///
/// - `handle` must be a valid handle from [`hardlock_init`]
/// - `token` must point to valid memory of at least `token_len` bytes
#[no_mangle]
pub unsafe extern "C" fn hardlock_validate_license(
    handle: *mut HardlockHandle,
    token: *const u8,
    token_len: usize,
) -> i32 {
    if handle.is_null() || token.is_null() {
        return HardlockCode::InvalidArgument as i32;
    }
    let handle = &*handle;
    let token = std::slice::from_raw_parts(token, token_len);

    // Lenient handles report the verdict through the info's valid flag;
    // strict handles raise, which lands in the same denial arm.
    match handle.lock().load_and_validate(token) {
        Ok(info) if info.valid => HardlockCode::Affirm as i32,
        Ok(_) | Err(_) => HardlockCode::Deny as i32,
    }
}

/// Check whether the most recently validated license grants a feature.
///
/// Returns 1 when granted, 0 when absent or no valid license is loaded,
/// and a negative code for invalid arguments.
///
/// # Safety
///
/// - `handle` must be a valid handle from [`hardlock_init`]
/// - `feature` must be a valid NUL-terminated C string
#[no_mangle]
pub unsafe extern "C" fn hardlock_has_feature(
    handle: *mut HardlockHandle,
    feature: *const c_char,
) -> i32 {
    if handle.is_null() || feature.is_null() {
        return HardlockCode::InvalidArgument as i32;
    }
    let handle = &*handle;
    let Ok(feature) = CStr::from_ptr(feature).to_str() else {
        return HardlockCode::InvalidArgument as i32;
    };

    match handle.lock().has_feature(feature) {
        Ok(true) => HardlockCode::Affirm as i32,
        Ok(false) | Err(_) => HardlockCode::Deny as i32,
    }
}

/// Get the current machine's hardware fingerprint.
///
/// The returned string is borrowed from the handle and stays valid until
/// [`hardlock_destroy`]; the caller must not free it. Returns NULL when
/// hardware detection fails.
///
/// # Safety
///
/// `handle` must be a valid handle from [`hardlock_init`].
#[no_mangle]
pub unsafe extern "C" fn hardlock_get_hwid(handle: *mut HardlockHandle) -> *const c_char {
    if handle.is_null() {
        return ptr::null();
    }
    let handle = &*handle;

    if let Some(hwid) = handle.hwid.get() {
        return hwid.as_ptr();
    }

    let fingerprint = match handle.lock().current_hardware_id() {
        Ok(fingerprint) => fingerprint,
        Err(err) => {
            tracing::error!(error = %err, "hardware fingerprint unavailable");
            return ptr::null();
        }
    };
    // Hex output cannot contain interior NULs.
    let Ok(hwid) = CString::new(fingerprint) else {
        return ptr::null();
    };
    handle.hwid.get_or_init(|| hwid).as_ptr()
}

/// Destroy a handle created by [`hardlock_init`].
///
/// # Safety
///
/// `handle` must be a valid handle from [`hardlock_init`] and must not be
/// used after this call. Passing NULL is a no-op.
#[no_mangle]
pub unsafe extern "C" fn hardlock_destroy(handle: *mut HardlockHandle) {
    if handle.is_null() {
        return;
    }
    drop(Box::from_raw(handle));
}
