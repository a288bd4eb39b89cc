use std::collections::BTreeMap;

use axum::http::HeaderMap;
use cert_verify_core::RequestContext;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-authenticated-user-id";
pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const APP_ID_HEADER: &str = "x-app-id";
pub const APP_VERSION_HEADER: &str = "x-app-ver";
pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const TRACE_ENABLED_HEADER: &str = "x-trace-enabled";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Builds the logging context for one call. A missing trace id is replaced
/// by a fresh UUID so every request can be followed through the logs.
pub fn context_from_headers(headers: &HeaderMap, operation: &str) -> RequestContext {
    RequestContext {
        trace_id: header(headers, TRACE_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string()),
        user_id: header(headers, USER_ID_HEADER),
        device_id: header(headers, DEVICE_ID_HEADER),
        session_id: header(headers, SESSION_ID_HEADER),
        app_id: header(headers, APP_ID_HEADER),
        app_version: header(headers, APP_VERSION_HEADER),
        debug_enabled: header(headers, TRACE_ENABLED_HEADER)
            .is_some_and(|value| value.eq_ignore_ascii_case("true")),
        operation: operation.to_string(),
    }
}

/// Copies every header with a UTF-8 value, keyed by lowercase name.
pub fn forwarded_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut forwarded: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            forwarded
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_context_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("trace-1"));
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-1"));
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("device-1"));
        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("session-1"));
        headers.insert(APP_ID_HEADER, HeaderValue::from_static("portal"));
        headers.insert(APP_VERSION_HEADER, HeaderValue::from_static("2.1"));
        headers.insert(TRACE_ENABLED_HEADER, HeaderValue::from_static("TRUE"));

        let context = context_from_headers(&headers, "verifyCertificate");
        assert_eq!(context.trace_id, "trace-1");
        assert_eq!(context.user_id.as_deref(), Some("user-1"));
        assert_eq!(context.device_id.as_deref(), Some("device-1"));
        assert_eq!(context.session_id.as_deref(), Some("session-1"));
        assert_eq!(context.app_id.as_deref(), Some("portal"));
        assert_eq!(context.app_version.as_deref(), Some("2.1"));
        assert!(context.debug_enabled);
        assert_eq!(context.operation, "verifyCertificate");
    }

    #[test]
    fn missing_trace_id_gets_a_uuid() {
        let context = context_from_headers(&HeaderMap::new(), "verifyCertificate");
        assert!(Uuid::parse_str(&context.trace_id).is_ok());
        assert!(!context.debug_enabled);
        assert_eq!(context.user_id, None);
    }

    #[test]
    fn repeated_headers_keep_every_value() {
        let mut headers = HeaderMap::new();
        headers.append("msgid", HeaderValue::from_static("a"));
        headers.append("msgid", HeaderValue::from_static("b"));

        let forwarded = forwarded_headers(&headers);
        assert_eq!(forwarded["msgid"], ["a", "b"]);
    }
}
