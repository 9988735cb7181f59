//! Failure classification for the FCM HTTP v1 API.
//!
//! The permanent-vs-transient decision lives in one pure function so the
//! provider's error vocabulary is unit-testable and the orchestrator only
//! ever sees the shared [`SendOutcome`] enum.

use ember_common::SendOutcome;

/// Error codes FCM uses to say a token can never succeed again.
///
/// `UNREGISTERED` (HTTP 404) means the installation was removed;
/// `INVALID_ARGUMENT` on a send means the token itself is malformed.
/// `NOT_FOUND` appears as the error status alongside `UNREGISTERED`.
const PERMANENT_CODES: &[&str] = &["UNREGISTERED", "NOT_FOUND", "INVALID_ARGUMENT"];

/// Classify a non-success FCM response.
///
/// `error_code` is the most specific code found in the error body (the
/// `details[].errorCode` when present, the `error.status` otherwise).
/// Anything not in the known permanent set is transient: an unknown error
/// must never disable a token, or an unrelated outage could
/// mass-unregister devices.
pub fn classify_failure(status: u16, error_code: Option<&str>) -> SendOutcome {
    if let Some(code) = error_code {
        if PERMANENT_CODES.contains(&code) {
            return SendOutcome::TokenInvalid;
        }
    }

    SendOutcome::Transient(format!(
        "fcm responded {} ({})",
        status,
        error_code.unwrap_or("no error code")
    ))
}
