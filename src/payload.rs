use serde_json::json;

/// Renders the standard alert body the gateway forwards to the device:
///  `{"aps":{"alert":"<text>"}}`. Pure formatting - the gateway treats the payload as
///  opaque, and so does the rest of this crate.
pub fn alert_body(text: &str) -> Vec<u8> {
    json!({ "aps": { "alert": text } }).to_string().into_bytes()
}
