use crate::domain::model::ApiResponse;
use crate::domain::ports::{Middleware, OutgoingRequest};
use crate::utils::error::{ClientError, Result};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Encodes JSON request bodies and decodes JSON responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeJson;

impl Middleware for SerializeJson {
    fn name(&self) -> &'static str {
        "serialize_json"
    }

    fn before_request(&self, request: &mut OutgoingRequest) -> Result<()> {
        if let Some(value) = request.json.take() {
            request.body = Some(serde_json::to_vec(&value)?);
            if !request.headers.contains_key(CONTENT_TYPE) {
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
        }
        Ok(())
    }

    fn after_response(&self, response: &mut ApiResponse) -> Result<()> {
        if response.raw.iter().all(u8::is_ascii_whitespace) {
            response.body = serde_json::Value::Null;
            return Ok(());
        }

        let is_json = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        response.body = if is_json {
            serde_json::from_slice(&response.raw)?
        } else {
            // Unlabelled or mislabelled bodies are decoded when they parse as JSON.
            serde_json::from_slice(&response.raw)
                .unwrap_or_else(|_| serde_json::Value::String(response.text()))
        };
        Ok(())
    }
}

/// Name/value cookie store shared between requests of one client.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<BTreeMap<String, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// `Cookie` header value, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.lock();
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Apply one `Set-Cookie` header. Empty values and `Max-Age=0` delete the cookie.
    pub fn store(&self, set_cookie: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return;
        }

        let expired = parts.any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
        let mut cookies = self.lock();
        if value.is_empty() || expired {
            cookies.remove(name);
        } else {
            cookies.insert(name.to_string(), value.to_string());
        }
    }
}

/// Sends and records cookies, so a login session carries over to later requests.
#[derive(Debug, Clone)]
pub struct WithCredentials {
    jar: Arc<CookieJar>,
}

impl WithCredentials {
    pub fn new(jar: Arc<CookieJar>) -> Self {
        Self { jar }
    }
}

impl Middleware for WithCredentials {
    fn name(&self) -> &'static str {
        "with_credentials"
    }

    fn before_request(&self, request: &mut OutgoingRequest) -> Result<()> {
        if request.headers.contains_key(COOKIE) {
            return Ok(());
        }
        if let Some(cookies) = self.jar.header_value() {
            let value = HeaderValue::from_str(&cookies).map_err(|e| ClientError::InvalidRequest {
                message: format!("invalid cookie header: {}", e),
            })?;
            request.headers.insert(COOKIE, value);
        }
        Ok(())
    }

    fn after_response(&self, response: &mut ApiResponse) -> Result<()> {
        for value in response.headers.get_all(SET_COOKIE) {
            if let Ok(set_cookie) = value.to_str() {
                self.jar.store(set_cookie);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
    user: String,
    password: String,
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl Middleware for BasicAuth {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn before_request(&self, request: &mut OutgoingRequest) -> Result<()> {
        request.basic_auth = Some((self.user.clone(), Some(self.password.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    fn response_with(content_type: Option<&str>, raw: &[u8]) -> ApiResponse {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        ApiResponse::new(StatusCode::OK, headers, raw.to_vec())
    }

    #[test]
    fn test_serialize_json_encodes_body() {
        let mut request = OutgoingRequest::new(Method::POST, "http://localhost/apps");
        request.json = Some(json!({ "name": "web" }));

        SerializeJson.before_request(&mut request).unwrap();

        assert!(request.json.is_none());
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"web"}"#.as_slice()));
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
    }

    #[test]
    fn test_serialize_json_keeps_explicit_content_type() {
        let mut request = OutgoingRequest::new(Method::POST, "http://localhost/apps");
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        request.json = Some(json!({}));

        SerializeJson.before_request(&mut request).unwrap();

        assert_eq!(
            request.headers.get(CONTENT_TYPE).unwrap(),
            "application/vnd.api+json"
        );
    }

    #[test]
    fn test_serialize_json_decodes_response() {
        let mut response = response_with(Some("application/json; charset=utf-8"), br#"[{"id":"a"}]"#);
        SerializeJson.after_response(&mut response).unwrap();
        assert_eq!(response.body, json!([{ "id": "a" }]));

        let mut text = response_with(Some("text/plain"), b"ok");
        SerializeJson.after_response(&mut text).unwrap();
        assert_eq!(text.body, json!("ok"));

        let mut empty = response_with(Some("application/json"), b"");
        SerializeJson.after_response(&mut empty).unwrap();
        assert!(empty.body.is_null());
    }

    #[test]
    fn test_serialize_json_decodes_unlabelled_json() {
        let mut untyped = response_with(None, br#"[{"id":"a1"}]"#);
        SerializeJson.after_response(&mut untyped).unwrap();
        assert_eq!(untyped.body, json!([{ "id": "a1" }]));

        let mut mislabelled = response_with(Some("text/plain"), br#"{"id":"a1"}"#);
        SerializeJson.after_response(&mut mislabelled).unwrap();
        assert_eq!(mislabelled.body, json!({ "id": "a1" }));

        let mut html = response_with(Some("text/html"), b"<html>ok</html>");
        SerializeJson.after_response(&mut html).unwrap();
        assert_eq!(html.body, json!("<html>ok</html>"));
    }

    #[test]
    fn test_serialize_json_rejects_malformed_json() {
        let mut response = response_with(Some("application/json"), b"{not json");
        let err = SerializeJson.after_response(&mut response).unwrap_err();
        assert!(matches!(err, ClientError::Serialization(_)));
    }

    #[test]
    fn test_cookie_jar_store_and_expire() {
        let jar = CookieJar::new();
        jar.store("session=abc123; Path=/; HttpOnly");
        jar.store("theme=dark");
        assert_eq!(jar.get("session").as_deref(), Some("abc123"));
        assert_eq!(jar.header_value().as_deref(), Some("session=abc123; theme=dark"));

        jar.store("session=; Max-Age=0");
        assert!(jar.get("session").is_none());
        jar.store("theme=dark; Max-Age=0");
        assert!(jar.is_empty());
        assert!(jar.header_value().is_none());
    }

    #[test]
    fn test_with_credentials_round_trip() {
        let jar = Arc::new(CookieJar::new());
        let middleware = WithCredentials::new(jar.clone());

        let mut response = response_with(None, b"");
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static("session=s1; Path=/"));
        middleware.after_response(&mut response).unwrap();

        let mut request = OutgoingRequest::new(Method::GET, "http://localhost/config");
        middleware.before_request(&mut request).unwrap();
        assert_eq!(request.headers.get(COOKIE).unwrap(), "session=s1");
    }

    #[test]
    fn test_basic_auth_sets_credentials() {
        let mut request = OutgoingRequest::new(Method::GET, "http://localhost/apps");
        BasicAuth::new("", "key").before_request(&mut request).unwrap();
        assert_eq!(
            request.basic_auth,
            Some((String::new(), Some("key".to_string())))
        );
    }
}
