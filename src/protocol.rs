//! Webhook protocol types.
//!
//! Outbound: one [`OutgoingPayload`] per dispatch, serialized as the POST body.
//! Inbound: the JSON reply body, normalized into an [`IncomingReply`] before
//! anything is rendered. Accepted shapes:
//!
//! ```text
//! { "replies": ["..", ".."] }   each element rendered in order
//! { "reply": ".." }             rendered once
//! { "output": ".." }            used when "reply" is absent or null
//! {}                            canned fallback text
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::DispatchError;

/// Shown when the webhook answers without any reply text.
pub const FALLBACK_REPLY: &str = "تم استلام الرسالة، لكن ماكو رد.";
/// Shown in place of a reply when the dispatch fails.
pub const ERROR_REPLY: &str = "صار خطأ بالاتصال. حاول مرة ثانية.";

/// Request metadata describing where the message was sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl PageMeta {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            user_agent: user_agent(),
        }
    }
}

/// POST body sent to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPayload {
    pub text: String,
    pub visitor_id: String,
    pub meta: PageMeta,
}

/// Reply texts in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingReply {
    Single(String),
    Many(Vec<String>),
}

impl IncomingReply {
    /// Normalize a decoded reply body.
    ///
    /// A `null` body is a failure. Any other non-object body has no reply
    /// fields and yields the fallback text. A `replies` array is rendered
    /// as-is, so an empty one renders nothing.
    pub fn from_value(body: &Value) -> Result<Self, DispatchError> {
        if body.is_null() {
            return Err(DispatchError::Body("reply body is null".to_string()));
        }

        if let Some(Value::Array(items)) = body.get("replies") {
            return Ok(IncomingReply::Many(items.iter().map(display_text).collect()));
        }

        let single = ["reply", "output"]
            .iter()
            .filter_map(|key| body.get(*key))
            .find(|v| !v.is_null())
            .map(display_text)
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());
        Ok(IncomingReply::Single(single))
    }

    pub fn into_texts(self) -> Vec<String> {
        match self {
            IncomingReply::Single(text) => vec![text],
            IncomingReply::Many(texts) => texts,
        }
    }
}

/// Strings verbatim; anything else as its JSON text.
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// User agent reported in request metadata and on the HTTP request.
pub fn user_agent() -> String {
    format!(
        "mokhatt-widget/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_has_the_wire_shape() {
        let payload = OutgoingPayload {
            text: "hello".into(),
            visitor_id: "v-1".into(),
            meta: PageMeta {
                page: "app://mokhatt-widget".into(),
                user_agent: "ua".into(),
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "text": "hello",
                "visitor_id": "v-1",
                "meta": { "page": "app://mokhatt-widget", "userAgent": "ua" }
            })
        );
    }

    #[test]
    fn replies_array_keeps_order() {
        let reply = IncomingReply::from_value(&json!({ "replies": ["a", "b"] })).unwrap();
        assert_eq!(reply, IncomingReply::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn replies_wins_over_reply() {
        let reply =
            IncomingReply::from_value(&json!({ "replies": ["a"], "reply": "ignored" })).unwrap();
        assert_eq!(reply.into_texts(), vec!["a".to_string()]);
    }

    #[test]
    fn non_string_replies_render_as_json() {
        let reply = IncomingReply::from_value(&json!({ "replies": [1, null, {"k": "v"}] })).unwrap();
        assert_eq!(
            reply.into_texts(),
            vec!["1".to_string(), "null".to_string(), r#"{"k":"v"}"#.to_string()]
        );
    }

    #[test]
    fn reply_then_output_then_fallback() {
        let from = |v: Value| IncomingReply::from_value(&v).unwrap();
        assert_eq!(from(json!({ "reply": "r", "output": "o" })), IncomingReply::Single("r".into()));
        assert_eq!(from(json!({ "reply": null, "output": "o" })), IncomingReply::Single("o".into()));
        assert_eq!(from(json!({ "output": "o" })), IncomingReply::Single("o".into()));
        assert_eq!(from(json!({})), IncomingReply::Single(FALLBACK_REPLY.into()));
        assert_eq!(
            from(json!({ "reply": null, "output": null })),
            IncomingReply::Single(FALLBACK_REPLY.into())
        );
        assert_eq!(from(json!({ "reply": 42 })), IncomingReply::Single("42".into()));
    }

    #[test]
    fn replies_that_is_not_an_array_is_ignored() {
        let reply = IncomingReply::from_value(&json!({ "replies": "x", "reply": "r" })).unwrap();
        assert_eq!(reply, IncomingReply::Single("r".into()));
    }

    #[test]
    fn empty_replies_renders_nothing() {
        let reply = IncomingReply::from_value(&json!({ "replies": [], "reply": "ignored" })).unwrap();
        assert_eq!(reply, IncomingReply::Many(vec![]));
        assert!(reply.into_texts().is_empty());
    }

    #[test]
    fn null_body_is_an_error_other_scalars_fall_back() {
        assert!(IncomingReply::from_value(&Value::Null).is_err());
        assert_eq!(
            IncomingReply::from_value(&json!("text")).unwrap(),
            IncomingReply::Single(FALLBACK_REPLY.into())
        );
        assert_eq!(
            IncomingReply::from_value(&json!([1, 2])).unwrap(),
            IncomingReply::Single(FALLBACK_REPLY.into())
        );
    }

    #[test]
    fn user_agent_names_the_widget() {
        assert!(user_agent().starts_with("mokhatt-widget/"));
    }
}
