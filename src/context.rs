//! Request-scoped context.
//!
//! Absolute URLs in notification messages are built from the scheme and host
//! of the request that triggered them, so each handler derives a
//! [`RequestContext`] from its headers and passes it down explicitly.

use axum::http::HeaderMap;
use axum::http::header::HOST;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    base_url: String,
}

impl RequestContext {
    /// Context with a fixed base URL such as `https://prchecklist.example.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Derive the base URL from request headers.
    ///
    /// When `behind_proxy` is set, `X-Forwarded-Proto` and `X-Forwarded-Host`
    /// take precedence over the plain `Host` header.
    pub fn from_headers(headers: &HeaderMap, behind_proxy: bool) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut scheme = "http".to_string();
        let mut host = header(HOST.as_str()).unwrap_or_else(|| "localhost".to_string());

        if behind_proxy {
            if let Some(proto) = header(FORWARDED_PROTO) {
                scheme = proto;
            }
            if let Some(forwarded) = header(FORWARDED_HOST) {
                host = forwarded;
            }
        }

        Self::new(format!("{}://{}", scheme, host))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a site-relative path.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
