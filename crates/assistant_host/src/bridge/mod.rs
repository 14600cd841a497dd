//! Correlated request/response bridge between the page UI and the privileged extension context.
//!
//! A call travels `client → relay → dispatcher` and back:
//! - [`client::BridgeClient`] dispatches a [`BridgeRequest`] on the shared event channel and waits
//!   for exactly one of the success/error events scoped to its sequence token;
//! - [`relay::BridgeRelay`] (isolated content-script context) forwards requests over the host's
//!   structured messaging channel;
//! - [`dispatcher::PrivilegedDispatcher`] (background context) runs the named handler.

pub mod channel;
pub mod client;
pub mod dispatcher;
pub mod relay;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event carrying every outbound [`BridgeRequest`].
pub const REQUEST_EVENT: &str = "pd-bridge:request";
/// Default caller-side wait before a call is abandoned.
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

/// Event carrying the success response for `seq`.
pub fn response_event(seq: &str) -> String {
    format!("pd-bridge:response:{seq}")
}

/// Event carrying the error response for `seq`.
pub fn error_event(seq: &str) -> String {
    format!("pd-bridge:error:{seq}")
}

/// Outbound call as seen on the event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Single-use correlation token.
    pub seq: String,
    /// Action name, see [`BridgeAction`].
    pub action: String,
    /// Action arguments.
    #[serde(default)]
    pub args: Value,
}

/// Success response scoped to one `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSuccess {
    /// Correlation token of the answered request.
    pub seq: String,
    /// Handler result.
    #[serde(default)]
    pub res: Value,
}

/// Error response scoped to one `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFailure {
    /// Correlation token of the answered request.
    pub seq: String,
    /// Error detail.
    #[serde(default)]
    pub err: Value,
}

/// Message sent from the relay to the privileged context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegedRequest {
    /// Action name.
    pub action: String,
    /// Action arguments.
    #[serde(default)]
    pub args: Value,
}

/// Privileged-context answer, serialized as `{"data": ..}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrivilegedReply {
    /// Handler succeeded.
    #[serde(rename = "data")]
    Data(Value),
    /// Handler failed.
    #[serde(rename = "error")]
    Error(Value),
}

/// Named privileged actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeAction {
    /// Read the Overleaf session and load-balancer cookies for a domain.
    GetCookies,
    /// Resolve a package-relative path to an extension URL.
    GetUrl,
    /// Return the current session id, minting a new one after expiry.
    GetOrCreateSessionId,
    /// Fetch a remote resource and return it base64-encoded.
    FetchImage,
    /// Ask the user for host permission on an origin.
    RequestHostPermission,
}

impl BridgeAction {
    /// Every action the privileged dispatcher handles.
    pub const ALL: [Self; 5] = [
        Self::GetCookies,
        Self::GetUrl,
        Self::GetOrCreateSessionId,
        Self::FetchImage,
        Self::RequestHostPermission,
    ];

    /// Wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetCookies => "get-cookies",
            Self::GetUrl => "get-url",
            Self::GetOrCreateSessionId => "get-or-create-session-id",
            Self::FetchImage => "fetch-image",
            Self::RequestHostPermission => "request-host-permission",
        }
    }

    /// Resolves a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

/// Caller-visible bridge failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// No response arrived within the timeout window.
    #[error("bridge call `{action}` timed out after {after_ms} ms")]
    Timeout {
        /// Action name.
        action: String,
        /// Elapsed window.
        after_ms: u32,
    },
    /// The privileged handler reported an error.
    #[error("bridge call `{action}` failed: {message}")]
    Handler {
        /// Action name.
        action: String,
        /// Error detail from the handler.
        message: String,
    },
    /// The pending call was dropped by the channel before any response.
    #[error("bridge call `{action}` was dropped before a response arrived")]
    Disconnected {
        /// Action name.
        action: String,
    },
    /// The response payload did not have the expected shape.
    #[error("bridge call `{action}` returned an unexpected payload: {message}")]
    Decode {
        /// Action name.
        action: String,
        /// Deserialization failure.
        message: String,
    },
}

/// Renders an error payload as a message: strings verbatim, `{message}` objects by field, anything
/// else as JSON.
pub fn error_message(value: &Value) -> String {
    match value {
        Value::String(message) => message.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in BridgeAction::ALL {
            assert_eq!(BridgeAction::from_name(action.as_str()), Some(action));
        }
        assert_eq!(BridgeAction::from_name("delete-everything"), None);
    }

    #[test]
    fn privileged_reply_wire_shape() {
        assert_eq!(
            serde_json::to_value(PrivilegedReply::Data(json!("ok"))).expect("serialize"),
            json!({"data": "ok"})
        );
        assert_eq!(
            serde_json::from_value::<PrivilegedReply>(json!({"error": "nope"}))
                .expect("deserialize"),
            PrivilegedReply::Error(json!("nope"))
        );
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(error_message(&json!("boom")), "boom");
        assert_eq!(error_message(&json!({"message": "denied"})), "denied");
        assert_eq!(error_message(&json!({"code": 7})), "{\"code\":7}");
    }
}
