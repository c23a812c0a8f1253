//! Redirection of upstream API calls to a configured proxy origin.

use std::fmt;

use url::Url;

use crate::{
    error::RewriteError,
    request::{RequestInit, RequestInput},
    RelayError, Result,
};

/// Default host of the generative-language API.
pub const UPSTREAM_HOST: &str = "generativelanguage.googleapis.com";

/// Proxy base: scheme, host, optional port and optional path prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyOrigin {
    base: String,
    url: Url,
}

impl ProxyOrigin {
    /// Trims `raw`, checks that it is an absolute URL, and drops a single
    /// trailing slash.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = |err: url::ParseError| RelayError::InvalidProxyUrl {
            url: trimmed.to_owned(),
            reason: err.to_string(),
        };

        Url::parse(trimmed).map_err(invalid)?;
        let base = trimmed.strip_suffix('/').unwrap_or(trimmed).to_owned();
        let url = Url::parse(&base).map_err(invalid)?;
        Ok(Self { base, url })
    }

    /// Normalized base URL as configured.
    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Path prepended to rewritten requests; `None` for a root path.
    pub fn path_prefix(&self) -> Option<&str> {
        let path = self.url.path();
        if path.is_empty() || path == "/" {
            return None;
        }
        Some(path.strip_suffix('/').unwrap_or(path))
    }
}

impl fmt::Display for ProxyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Whether `url` targets the upstream API host.
pub fn is_upstream(url: &Url) -> bool {
    url.host_str() == Some(UPSTREAM_HOST)
}

/// Moves `url` onto the proxy origin.
///
/// Scheme, host and port come from `proxy`; the proxy path prefix is
/// prepended to the original path; query and fragment are kept.
pub fn rewrite_url(url: &Url, proxy: &ProxyOrigin) -> std::result::Result<Url, RewriteError> {
    let component = |component: &'static str, value: &str| RewriteError::Component {
        component,
        value: value.to_owned(),
    };

    let mut rewritten = url.clone();
    let scheme = proxy.url.scheme();
    rewritten
        .set_scheme(scheme)
        .map_err(|()| component("scheme", scheme))?;

    let host = proxy
        .url
        .host_str()
        .ok_or_else(|| component("host", proxy.as_str()))?;
    rewritten
        .set_host(Some(host))
        .map_err(|_| component("host", host))?;
    rewritten
        .set_port(proxy.url.port())
        .map_err(|()| component("port", proxy.as_str()))?;

    if let Some(prefix) = proxy.path_prefix() {
        let path = format!("{prefix}{}", url.path());
        rewritten.set_path(&path);
    }

    Ok(rewritten)
}

/// Decides how one call is issued under `proxy`.
///
/// `Ok(None)` means the call is not for the upstream host and passes
/// through untouched.
pub(crate) fn redirect_call(
    input: &RequestInput,
    init: Option<&RequestInit>,
    proxy: &ProxyOrigin,
) -> std::result::Result<Option<(RequestInput, Option<RequestInit>)>, RewriteError> {
    let url = match input.resolve_url() {
        Ok(url) => url,
        // Unparseable URLs that never mention the upstream host are not ours.
        Err(_) if !input.url_str().contains(UPSTREAM_HOST) => return Ok(None),
        Err(err) => return Err(err),
    };

    if !is_upstream(&url) {
        return Ok(None);
    }

    let rewritten = rewrite_url(&url, proxy)?;

    let redirected = match input {
        RequestInput::Descriptor(descriptor) => {
            let merged = descriptor
                .to_init()
                .merge(init.cloned().unwrap_or_default());
            (RequestInput::UrlObject(rewritten), Some(merged))
        }
        RequestInput::PlainUrl(_) | RequestInput::UrlObject(_) => {
            (RequestInput::PlainUrl(rewritten.into()), init.cloned())
        }
    };

    Ok(Some(redirected))
}
