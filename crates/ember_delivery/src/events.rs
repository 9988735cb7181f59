//! Event-to-notification payload mapping.
//!
//! Pure functions so the copy and the routing metadata are testable
//! without any transport in play. `data` keys use the camelCase names the
//! mobile clients read out of the notification; `deepLink` tells the app
//! which screen to open.

use ember_common::PushPayload;
use std::collections::HashMap;

/// Someone liked the recipient.
pub fn like_payload(sender_name: &str, sender_user_id: &str) -> PushPayload {
    let mut data = HashMap::new();
    data.insert("type".to_string(), "like".to_string());
    data.insert("deepLink".to_string(), "ember://matches".to_string());
    data.insert("senderUserId".to_string(), sender_user_id.to_string());

    PushPayload {
        title: "New like".to_string(),
        body: format!("{sender_name} liked you"),
        data,
    }
}

/// A mutual like became a match.
pub fn match_payload(sender_name: &str, sender_user_id: &str) -> PushPayload {
    let mut data = HashMap::new();
    data.insert("type".to_string(), "match".to_string());
    data.insert("deepLink".to_string(), "ember://matches".to_string());
    data.insert("senderUserId".to_string(), sender_user_id.to_string());

    PushPayload {
        title: "It's a match!".to_string(),
        body: format!("You and {sender_name} liked each other"),
        data,
    }
}

/// A new chat message; the deep link opens the thread directly.
pub fn message_payload(
    sender_name: &str,
    sender_user_id: &str,
    thread_id: &str,
    message_preview: &str,
) -> PushPayload {
    let mut data = HashMap::new();
    data.insert("type".to_string(), "message".to_string());
    data.insert("deepLink".to_string(), format!("ember://chat/{thread_id}"));
    data.insert("senderUserId".to_string(), sender_user_id.to_string());
    data.insert("threadId".to_string(), thread_id.to_string());

    PushPayload {
        title: sender_name.to_string(),
        body: message_preview.to_string(),
        data,
    }
}
