//! Failure classification for APNs responses.
//!
//! Mirrors the FCM adapter: one pure function decides permanent vs
//! transient so the mapping is unit-testable in isolation.

use ember_common::SendOutcome;

/// 400 reasons that condemn the token rather than the request.
const PERMANENT_BAD_REQUEST_REASONS: &[&str] = &["BadDeviceToken", "DeviceTokenNotForTopic"];

/// Classify a non-success APNs response.
///
/// 410 Gone means the device token is no longer active for the topic.
/// A 400 is only terminal when the reason names the token itself; every
/// other failure (throttling, server errors, expired provider tokens) is
/// transient and must never disable a token.
pub fn classify_failure(status: u16, reason: Option<&str>) -> SendOutcome {
    if status == 410 {
        return SendOutcome::TokenInvalid;
    }

    if status == 400 {
        if let Some(reason) = reason {
            if PERMANENT_BAD_REQUEST_REASONS.contains(&reason) {
                return SendOutcome::TokenInvalid;
            }
        }
    }

    SendOutcome::Transient(format!(
        "apns responded {} ({})",
        status,
        reason.unwrap_or("no reason given")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_token_is_terminal() {
        assert_eq!(
            classify_failure(410, Some("Unregistered")),
            SendOutcome::TokenInvalid
        );
        // 410 is terminal even without a parseable reason
        assert_eq!(classify_failure(410, None), SendOutcome::TokenInvalid);
    }

    #[test]
    fn bad_device_token_is_terminal() {
        assert_eq!(
            classify_failure(400, Some("BadDeviceToken")),
            SendOutcome::TokenInvalid
        );
        assert_eq!(
            classify_failure(400, Some("DeviceTokenNotForTopic")),
            SendOutcome::TokenInvalid
        );
    }

    #[test]
    fn other_bad_requests_are_transient() {
        assert!(matches!(
            classify_failure(400, Some("PayloadEmpty")),
            SendOutcome::Transient(_)
        ));
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        for (status, reason) in [
            (429u16, Some("TooManyRequests")),
            (500, Some("InternalServerError")),
            (503, Some("ServiceUnavailable")),
            (403, Some("ExpiredProviderToken")),
        ] {
            let outcome = classify_failure(status, reason);
            assert!(
                matches!(outcome, SendOutcome::Transient(_)),
                "{status} {reason:?} should be transient, got {outcome:?}"
            );
        }
    }
}
