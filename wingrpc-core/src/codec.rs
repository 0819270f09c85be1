//! Codec between calls/replies and transport frames
//!
//! A frame is one transport message. Outbound frames are JSON text encoded
//! as UTF-8 bytes; inbound frames arrive as opaque bytes and are read back
//! into text before parsing.
//!
//! # Encoding
//!
//! `encode_request()` serializes the envelope with members in the order
//! `id`, `method`, `jsonrpc`, `params`, where `params` only appears when the
//! call has arguments.
//!
//! # Decoding
//!
//! `decode_reply()` extracts the call id and the outcome. A reply must carry
//! an unsigned integer `id` and either a `result` (any value, `null`
//! included) or an `error` object. Anything else is an `Error::Protocol`.
//! The `jsonrpc` member is accepted but not required, since some servers
//! omit it from replies.
//!
//! # Examples
//!
//! ```rust
//! use wingrpc_core::{codec, CallId, Request};
//!
//! let frame = codec::encode_request(&Request::new(CallId(3), "list_scans", None)).unwrap();
//! assert_eq!(frame, br#"{"id":3,"method":"list_scans","jsonrpc":"2.0"}"#.to_vec());
//!
//! let reply = codec::decode_reply(br#"{"id":3,"result":{"total_count":42,"items":[]}}"#).unwrap();
//! assert_eq!(reply.id, CallId(3));
//! assert_eq!(reply.outcome.unwrap()["total_count"], 42);
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{CallId, Reply, Request};
use serde::{Deserialize, Deserializer};

/// Encode a request into frame bytes
///
/// # Errors
///
/// Returns `Error::Serialization` if the params contain values that cannot be
/// represented as JSON.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| Error::Serialization(e.to_string()))
}

/// Render a frame as text for diagnostics
///
/// Invalid UTF-8 is replaced rather than rejected, so this is safe to call on
/// any inbound frame before it has been validated.
pub fn frame_text(frame: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(frame)
}

/// Reply envelope as it appears on the wire
///
/// `result` uses `present` so that `"result": null` is distinguishable from a
/// missing member.
#[derive(Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorData>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Decode frame bytes into a reply
///
/// # Errors
///
/// Returns `Error::Protocol` when the bytes are not UTF-8, the text is not a
/// JSON object, the `id` is missing or not an unsigned integer, or neither
/// `result` nor `error` is present.
pub fn decode_reply(frame: &[u8]) -> Result<Reply> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| Error::Protocol(format!("frame is not valid UTF-8: {}", e)))?;

    let envelope: ReplyEnvelope = serde_json::from_str(text)
        .map_err(|e| Error::Protocol(format!("frame is not a reply object: {}", e)))?;

    let id = match envelope.id {
        Some(value) => value
            .as_u64()
            .map(CallId)
            .ok_or_else(|| Error::Protocol(format!("reply id {} is not an unsigned integer", value)))?,
        None => return Err(Error::Protocol("reply has no id".to_string())),
    };

    match (envelope.result, envelope.error) {
        (Some(result), _) => Ok(Reply::success(id, result)),
        (None, Some(error)) => Ok(Reply::error(id, error)),
        (None, None) => Err(Error::Protocol(format!(
            "reply {} has neither result nor error",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Params;
    use serde_json::json;

    fn protocol_error(frame: &[u8]) -> String {
        match decode_reply(frame) {
            Err(Error::Protocol(msg)) => msg,
            other => panic!("Expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_list_hosts_request() {
        let page = json!({
            "page_number": 1,
            "items_per_page": 20,
            "sort_column": "host_id",
            "sort_ascending": true
        });
        let request = Request::new(CallId(4), "list_hosts", Some(Params::from(vec![page.clone()])));

        let frame = encode_request(&request).unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&frame).unwrap();

        assert_eq!(
            decoded,
            json!({"id": 4, "method": "list_hosts", "jsonrpc": "2.0", "params": [page]})
        );
    }

    #[test]
    fn test_encode_is_utf8_text() {
        let request = Request::new(
            CallId(0),
            "get_host",
            Some(Params::from(vec![json!("höst-ü")])),
        );
        let frame = encode_request(&request).unwrap();

        let text = String::from_utf8(frame).unwrap();
        assert!(text.contains("höst-ü"));
    }

    #[test]
    fn test_decode_success_reply() {
        let reply = decode_reply(br#"{"id":3,"result":{"total_count":42,"items":[]}}"#).unwrap();
        assert_eq!(reply.id, CallId(3));
        assert_eq!(reply.outcome, Ok(json!({"total_count": 42, "items": []})));
    }

    #[test]
    fn test_decode_reply_with_version_marker() {
        let reply = decode_reply(br#"{"jsonrpc":"2.0","result":"pong","id":0}"#).unwrap();
        assert_eq!(reply.id, CallId(0));
        assert_eq!(reply.outcome, Ok(json!("pong")));
    }

    #[test]
    fn test_decode_null_result_is_present() {
        let reply = decode_reply(br#"{"id":9,"result":null}"#).unwrap();
        assert_eq!(reply.outcome, Ok(serde_json::Value::Null));
    }

    #[test]
    fn test_decode_error_reply() {
        let reply =
            decode_reply(br#"{"id":2,"error":{"code":-32601,"message":"Method not found"}}"#)
                .unwrap();
        assert_eq!(reply.id, CallId(2));
        let error = reply.outcome.unwrap_err();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let msg = protocol_error(&[0xff, 0xfe, b'{', b'}']);
        assert!(msg.contains("UTF-8"));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        protocol_error(b"not valid json");
        protocol_error(b"");
        protocol_error(b"[1,2,3]");
    }

    #[test]
    fn test_decode_rejects_missing_id() {
        let msg = protocol_error(br#"{"result":1}"#);
        assert!(msg.contains("no id"));

        // null id is as good as no id for correlation purposes
        protocol_error(br#"{"id":null,"result":1}"#);
    }

    #[test]
    fn test_decode_rejects_non_numeric_id() {
        let msg = protocol_error(br#"{"id":"abc","result":1}"#);
        assert!(msg.contains("not an unsigned integer"));

        protocol_error(br#"{"id":-1,"result":1}"#);
        protocol_error(br#"{"id":1.5,"result":1}"#);
    }

    #[test]
    fn test_decode_rejects_missing_result() {
        let msg = protocol_error(br#"{"id":7}"#);
        assert!(msg.contains("neither result nor error"));
    }

    #[test]
    fn test_frame_text_is_lossy() {
        assert_eq!(frame_text(b"{\"id\":1}"), "{\"id\":1}");
        assert!(frame_text(&[0xff]).contains('\u{fffd}'));
    }
}
