use std::{fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use reqwest::{Method, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    interceptor::{self, ProxyOrigin},
    request::{RequestDescriptor, RequestInit, RequestInput},
    retry::RetryPolicy,
    transport::{FetchFuture, HttpTransport, Transport},
    RelayError, RelayOptions, Result,
};

/// Environment variable read by [`RelayClient::from_env`].
pub const PROXY_BASE_URL_ENV: &str = "GENAI_PROXY_BASE_URL";

/// Request client that redirects upstream API calls to a configured proxy.
///
/// Clones share the same route: reconfiguring one clone affects all of them.
pub struct RelayClient<T = HttpTransport> {
    transport: Arc<T>,
    route: Arc<ArcSwapOption<ProxyOrigin>>,
    options: RelayOptions,
}

impl<T> Clone for RelayClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            route: Arc::clone(&self.route),
            options: self.options.clone(),
        }
    }
}

impl<T> fmt::Debug for RelayClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("proxy", &self.route.load().as_deref().map(ProxyOrigin::as_str))
            .field("options", &self.options)
            .finish()
    }
}

impl RelayClient<HttpTransport> {
    /// Creates a client over a `reqwest` transport with default options.
    pub fn new() -> Result<Self> {
        Self::from_options(RelayOptions::default())
    }

    /// Creates a client over a `reqwest` transport.
    pub fn from_options(options: RelayOptions) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_millis(options.timeout_ms))?;
        Ok(Self::with_transport(transport, options))
    }

    /// Creates a client and applies the proxy from the environment.
    ///
    /// Reads `GENAI_PROXY_BASE_URL`; when unset or empty, calls are not
    /// redirected. An invalid value is returned as an error.
    pub fn from_env() -> Result<Self> {
        let client = Self::new()?;
        if let Ok(base_url) = std::env::var(PROXY_BASE_URL_ENV) {
            client.configure(Some(&base_url))?;
        }
        Ok(client)
    }
}

impl<T: Transport> RelayClient<T> {
    /// Creates a client over any [`Transport`].
    pub fn with_transport(transport: T, options: RelayOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            route: Arc::new(ArcSwapOption::empty()),
            options,
        }
    }

    /// Installs, replaces or removes the proxy route.
    ///
    /// `None` or an empty string removes the route. An invalid URL is logged,
    /// returned as [`RelayError::InvalidProxyUrl`], and leaves the current
    /// route in place.
    pub fn configure(&self, base_url: Option<&str>) -> Result<()> {
        let Some(base_url) = base_url.filter(|value| !value.is_empty()) else {
            self.route.store(None);
            #[cfg(feature = "tracing")]
            tracing::debug!("proxy route cleared");
            return Ok(());
        };

        let origin = match ProxyOrigin::parse(base_url) {
            Ok(origin) => origin,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("ignoring invalid proxy base url: {err}");
                return Err(err);
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(proxy = %origin, "proxy route installed");

        self.route.store(Some(Arc::new(origin)));
        Ok(())
    }

    /// Currently active proxy route, if any.
    pub fn proxy_origin(&self) -> Option<Arc<ProxyOrigin>> {
        self.route.load_full()
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Retry policy derived from the client options.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.options.max_attempts, self.options.initial_delay_ms)
    }

    /// Issues one call, redirecting it when it targets the upstream host.
    ///
    /// The route is read once when the call starts. Rewrite failures are
    /// logged and the call goes out unmodified.
    pub async fn fetch(
        &self,
        input: impl Into<RequestInput>,
        init: Option<RequestInit>,
    ) -> Result<Response> {
        self.dispatch(input.into(), init).await
    }

    /// Issues `request` under the retry policy.
    ///
    /// Non-success statuses become [`RelayError::Http`] so that 429 and 5xx
    /// answers are retried.
    pub async fn send(&self, request: RequestDescriptor) -> Result<Response> {
        self.retry_policy()
            .run(|| {
                let request = request.clone();
                async move {
                    let response = self.dispatch(request.into(), None).await?;
                    ensure_success(response).await
                }
            })
            .await
    }

    /// POSTs `payload` as JSON to `url` under the retry policy and decodes
    /// the JSON answer.
    pub async fn send_json<B, R>(&self, url: &str, payload: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = RequestDescriptor::parse(url)
            .map_err(|err| RelayError::Encode(format!("invalid request url '{url}': {err}")))?
            .method(Method::POST)
            .json(payload)?;
        let response = self.send(request).await?;
        let body = response.text().await.map_err(RelayError::Transport)?;
        serde_json::from_str(&body).map_err(|err| {
            RelayError::Decode(format!("invalid response JSON: {err}; body: {body}"))
        })
    }

    async fn dispatch(&self, input: RequestInput, init: Option<RequestInit>) -> Result<Response> {
        let Some(proxy) = self.route.load_full() else {
            return self.transport.fetch(input, init).await;
        };

        let decision = interceptor::redirect_call(&input, init.as_ref(), &proxy);
        match decision {
            Ok(Some((redirected, redirected_init))) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    from = input.url_str(),
                    to = redirected.url_str(),
                    "redirecting request"
                );
                self.transport.fetch(redirected, redirected_init).await
            }
            Ok(None) => self.transport.fetch(input, init).await,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!("failed to redirect request: {_err}");
                self.transport.fetch(input, init).await
            }
        }
    }
}

impl<T: Transport> Transport for RelayClient<T> {
    fn fetch(&self, input: RequestInput, init: Option<RequestInit>) -> FetchFuture<'_> {
        Box::pin(self.dispatch(input, init))
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.map_err(RelayError::Transport)?;
    Err(RelayError::Http {
        status: status.as_u16(),
        body,
    })
}
