use std::borrow::Cow;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;
use url::Url;

use crate::{error::RewriteError, RelayError, Result};

/// Target of one outbound call.
///
/// Mirrors the three shapes a fetch-style primitive accepts; the shape is
/// decided once by the caller instead of being sniffed per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestInput {
    /// URL as an unparsed string.
    PlainUrl(String),
    /// Already parsed URL.
    UrlObject(Url),
    /// Full request carrying its own transport metadata.
    Descriptor(RequestDescriptor),
}

impl RequestInput {
    /// Returns the call's target URL as text.
    pub fn url_str(&self) -> &str {
        match self {
            Self::PlainUrl(url) => url,
            Self::UrlObject(url) => url.as_str(),
            Self::Descriptor(descriptor) => descriptor.url.as_str(),
        }
    }

    /// Parses the call's target URL, borrowing when it is already parsed.
    pub(crate) fn resolve_url(&self) -> std::result::Result<Cow<'_, Url>, RewriteError> {
        match self {
            Self::PlainUrl(raw) => {
                Url::parse(raw)
                    .map(Cow::Owned)
                    .map_err(|err| RewriteError::Parse {
                        url: raw.clone(),
                        reason: err.to_string(),
                    })
            }
            Self::UrlObject(url) => Ok(Cow::Borrowed(url)),
            Self::Descriptor(descriptor) => Ok(Cow::Borrowed(&descriptor.url)),
        }
    }
}

impl From<&str> for RequestInput {
    fn from(value: &str) -> Self {
        Self::PlainUrl(value.to_owned())
    }
}

impl From<String> for RequestInput {
    fn from(value: String) -> Self {
        Self::PlainUrl(value)
    }
}

impl From<Url> for RequestInput {
    fn from(value: Url) -> Self {
        Self::UrlObject(value)
    }
}

impl From<RequestDescriptor> for RequestInput {
    fn from(value: RequestDescriptor) -> Self {
        Self::Descriptor(value)
    }
}

/// CORS mode of a browser fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

/// Credential policy of a browser fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// HTTP cache interaction requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

/// How redirect responses are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow redirects transparently.
    #[default]
    Follow,
    /// Return the redirect response to the caller.
    Manual,
    /// Fail the call with [`RelayError::RedirectRejected`].
    Error,
}

pub(crate) const CLIENT_REFERRER: &str = "about:client";

/// A full request: URL plus transport metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub referrer: String,
    pub integrity: String,
}

impl RequestDescriptor {
    /// Creates a `GET` request with default metadata.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            cache: CacheMode::default(),
            redirect: RedirectMode::default(),
            referrer: CLIENT_REFERRER.to_owned(),
            integrity: String::new(),
        }
    }

    /// Parses `url` and creates a `GET` request.
    pub fn parse(url: &str) -> std::result::Result<Self, url::ParseError> {
        Url::parse(url).map(Self::new)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Appends a header; fails on names or values that are not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = encode_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the body and sets `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let body = serde_json::to_vec(payload).map_err(|err| RelayError::Encode(err.to_string()))?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(body);
        Ok(self)
    }

    pub fn redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Snapshot of every metadata field as a fully populated [`RequestInit`].
    pub fn to_init(&self) -> RequestInit {
        RequestInit {
            method: Some(self.method.clone()),
            headers: Some(self.headers.clone()),
            body: self.body.clone(),
            mode: Some(self.mode),
            credentials: Some(self.credentials),
            cache: Some(self.cache),
            redirect: Some(self.redirect),
            referrer: Some(self.referrer.clone()),
            integrity: Some(self.integrity.clone()),
        }
    }
}

/// Per-call options. Unset fields defer to the request or transport default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: Option<HeaderMap>,
    pub body: Option<Vec<u8>>,
    /// Browser-only; carried across rewrites.
    pub mode: Option<RequestMode>,
    /// Browser-only; carried across rewrites.
    pub credentials: Option<Credentials>,
    pub cache: Option<CacheMode>,
    pub redirect: Option<RedirectMode>,
    pub referrer: Option<String>,
    /// Browser-only; carried across rewrites.
    pub integrity: Option<String>,
}

impl RequestInit {
    /// Layers `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merge(self, overrides: RequestInit) -> RequestInit {
        RequestInit {
            method: overrides.method.or(self.method),
            headers: overrides.headers.or(self.headers),
            body: overrides.body.or(self.body),
            mode: overrides.mode.or(self.mode),
            credentials: overrides.credentials.or(self.credentials),
            cache: overrides.cache.or(self.cache),
            redirect: overrides.redirect.or(self.redirect),
            referrer: overrides.referrer.or(self.referrer),
            integrity: overrides.integrity.or(self.integrity),
        }
    }
}

pub(crate) fn encode_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| RelayError::InvalidHeader(format!("{name}: {err}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|err| RelayError::InvalidHeader(format!("{name}: {err}")))?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overrides() {
        let base = RequestDescriptor::parse("https://example.com/a")
            .expect("valid url")
            .method(Method::POST)
            .body("original")
            .to_init();
        let merged = base.merge(RequestInit {
            body: Some(b"override".to_vec()),
            cache: Some(CacheMode::NoStore),
            ..RequestInit::default()
        });

        assert_eq!(merged.method, Some(Method::POST));
        assert_eq!(merged.body.as_deref(), Some(&b"override"[..]));
        assert_eq!(merged.cache, Some(CacheMode::NoStore));
        assert_eq!(merged.referrer.as_deref(), Some(CLIENT_REFERRER));
    }

    #[test]
    fn plain_url_that_does_not_parse_reports_rewrite_error() {
        let input = RequestInput::from("not a url");
        assert!(matches!(
            input.resolve_url(),
            Err(RewriteError::Parse { .. })
        ));
    }

    #[test]
    fn json_body_sets_content_type() {
        let descriptor = RequestDescriptor::parse("https://example.com/")
            .expect("valid url")
            .json(&serde_json::json!({"contents": []}))
            .expect("json must encode");

        assert_eq!(
            descriptor.headers.get(reqwest::header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(descriptor.body.as_deref(), Some(&br#"{"contents":[]}"#[..]));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let err = RequestDescriptor::parse("https://example.com/")
            .expect("valid url")
            .header("bad header", "x")
            .expect_err("space in header name must fail");
        assert!(matches!(err, RelayError::InvalidHeader(_)));
    }
}
