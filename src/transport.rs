use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    redirect, Method, Response,
};

use crate::{
    request::{CacheMode, RedirectMode, RequestInit, RequestInput, CLIENT_REFERRER},
    RelayError, Result,
};

/// Future returned by [`Transport::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;

/// Request primitive: issues one call and yields the raw response.
///
/// Non-success statuses are not errors at this layer.
pub trait Transport: Send + Sync {
    fn fetch(&self, input: RequestInput, init: Option<RequestInit>) -> FetchFuture<'_>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, input: RequestInput, init: Option<RequestInit>) -> FetchFuture<'_> {
        (**self).fetch(input, init)
    }
}

/// [`Transport`] backed by `reqwest`.
///
/// Idle connections are not kept: every call opens its own connection.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    following: reqwest::Client,
    direct: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let following = Self::builder()
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(RelayError::Transport)?;
        let direct = Self::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(RelayError::Transport)?;
        Ok(Self {
            following,
            direct,
            timeout,
        })
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder().pool_max_idle_per_host(0)
    }

    async fn send(&self, url: String, init: RequestInit) -> Result<Response> {
        let headers = outgoing_headers(&init)?;
        let method = init.method.unwrap_or(Method::GET);
        let redirect_mode = init.redirect.unwrap_or_default();

        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %url, ?redirect_mode, "dispatching request");

        let client = match redirect_mode {
            RedirectMode::Follow => &self.following,
            RedirectMode::Manual | RedirectMode::Error => &self.direct,
        };

        let mut request = client
            .request(method, url)
            .timeout(self.timeout)
            .headers(headers);
        if let Some(body) = init.body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(RelayError::Transport)?;

        if redirect_mode == RedirectMode::Error && response.status().is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            return Err(RelayError::RedirectRejected {
                status: response.status().as_u16(),
                location,
            });
        }

        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, input: RequestInput, init: Option<RequestInit>) -> FetchFuture<'_> {
        Box::pin(async move {
            let init = init.unwrap_or_default();
            let (url, init) = match input {
                RequestInput::PlainUrl(url) => (url, init),
                RequestInput::UrlObject(url) => (url.into(), init),
                RequestInput::Descriptor(descriptor) => {
                    let merged = descriptor.to_init().merge(init);
                    (descriptor.url.into(), merged)
                }
            };
            self.send(url, init).await
        })
    }
}

/// Headers to send: caller headers plus `Referer` and `Cache-Control`
/// derived from metadata, unless the caller already set them.
fn outgoing_headers(init: &RequestInit) -> Result<HeaderMap> {
    let mut headers = init.headers.clone().unwrap_or_default();

    if let Some(referrer) = init
        .referrer
        .as_deref()
        .filter(|referrer| !referrer.is_empty() && *referrer != CLIENT_REFERRER)
    {
        let value = HeaderValue::from_str(referrer)
            .map_err(|err| RelayError::InvalidHeader(format!("referer: {err}")))?;
        headers.entry(header::REFERER).or_insert(value);
    }

    let cache_control = match init.cache {
        Some(CacheMode::NoStore) => Some("no-store"),
        Some(CacheMode::NoCache | CacheMode::Reload) => Some("no-cache"),
        _ => None,
    };
    if let Some(directive) = cache_control {
        headers
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static(directive));
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_referrer_is_not_sent() {
        let init = RequestInit {
            referrer: Some(CLIENT_REFERRER.to_owned()),
            ..RequestInit::default()
        };
        let headers = outgoing_headers(&init).expect("headers must build");
        assert!(headers.get(header::REFERER).is_none());
    }

    #[test]
    fn explicit_referrer_and_cache_mode_become_headers() {
        let init = RequestInit {
            referrer: Some("https://chat.example/".to_owned()),
            cache: Some(CacheMode::NoStore),
            ..RequestInit::default()
        };
        let headers = outgoing_headers(&init).expect("headers must build");
        assert_eq!(headers[header::REFERER], "https://chat.example/");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    }

    #[test]
    fn caller_cache_control_is_kept() {
        let mut caller = HeaderMap::new();
        caller.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        let init = RequestInit {
            headers: Some(caller),
            cache: Some(CacheMode::NoCache),
            ..RequestInit::default()
        };
        let headers = outgoing_headers(&init).expect("headers must build");
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=0");
    }
}
