//! Authenticated request executor for Emby servers.
//!
//! Every call carries the panel's fixed identification header set; callers
//! may add or override headers (caller wins on conflict). The executor does
//! not interpret status codes: success criteria differ per endpoint, so
//! that judgment stays with the caller. Network-layer failures surface as
//! `EmbyError::Transport` with the reqwest source preserved.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use reqwest::{Method, Response};
use std::time::Duration;

use super::EmbyError;

#[derive(Clone)]
pub struct EmbyClient {
    http: reqwest::Client,
    user_agent: String,
}

/// Merge the fixed identification headers with caller-supplied ones.
/// Caller entries replace fixed entries with the same name.
fn merged_headers(user_agent: &str, token: &str, extra: HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(token) {
        headers.insert("X-Emby-Token", value);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    for (name, value) in extra {
        if let Some(name) = name {
            headers.insert(name, value);
        }
    }
    headers
}

impl EmbyClient {
    pub fn new(user_agent: &str, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            user_agent: user_agent.to_string(),
        }
    }

    /// Issue one authenticated request. The response is returned as-is,
    /// whatever its status.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        extra_headers: HeaderMap,
        body: Option<serde_json::Value>,
    ) -> Result<Response, EmbyError> {
        let headers = merged_headers(&self.user_agent, token, extra_headers);

        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request.send().await?)
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<Response, EmbyError> {
        self.request(Method::GET, url, token, HeaderMap::new(), None)
            .await
    }

    pub async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Result<Response, EmbyError> {
        self.request(Method::POST, url, token, HeaderMap::new(), Some(body))
            .await
    }

    pub async fn post_empty(&self, url: &str, token: &str) -> Result<Response, EmbyError> {
        self.request(Method::POST, url, token, HeaderMap::new(), None)
            .await
    }

    /// Form-encoded POST; a few Emby endpoints (password changes) take
    /// `application/x-www-form-urlencoded` instead of JSON.
    pub async fn post_form(
        &self,
        url: &str,
        token: &str,
        form: &[(&str, &str)],
    ) -> Result<Response, EmbyError> {
        let headers = merged_headers(&self.user_agent, token, HeaderMap::new());

        Ok(self
            .http
            .post(url)
            .headers(headers)
            .form(form)
            .send()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_headers_present() {
        let headers = merged_headers("Painel/1.0.0", "tok123", HeaderMap::new());
        assert_eq!(headers.get("X-Emby-Token").unwrap(), "tok123");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get(ACCEPT_ENCODING).unwrap(), "identity");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "Painel/1.0.0");
    }

    #[test]
    fn test_caller_headers_win_on_conflict() {
        let mut extra = HeaderMap::new();
        extra.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        extra.insert("X-Custom", HeaderValue::from_static("1"));

        let headers = merged_headers("Painel/1.0.0", "tok123", extra);
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/plain");
        assert_eq!(headers.get("X-Custom").unwrap(), "1");
        // Untouched fixed entries survive.
        assert_eq!(headers.get("X-Emby-Token").unwrap(), "tok123");
    }
}
