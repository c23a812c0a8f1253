//! `genai-relay` is the network resilience layer of a generative-language
//! API client.
//!
//! Two independent pieces:
//! - [`RelayClient`] redirects calls aimed at [`UPSTREAM_HOST`] to a
//!   configured proxy origin, see [`RelayClient::configure`].
//! - [`RetryPolicy`] / [`with_retry`] retry rate-limited, server-side and
//!   network failures with exponential backoff.

mod client;
mod error;
mod interceptor;
mod options;
mod request;
mod retry;
mod transport;

pub use client::{RelayClient, PROXY_BASE_URL_ENV};
pub use error::{MaxRetriesReached, RelayError, RewriteError};
pub use interceptor::{is_upstream, rewrite_url, ProxyOrigin, UPSTREAM_HOST};
pub use options::RelayOptions;
pub use request::{
    CacheMode, Credentials, RedirectMode, RequestDescriptor, RequestInit, RequestInput,
    RequestMode,
};
pub use retry::{with_retry, FailureKind, RetryPolicy, RetryableError};
pub use transport::{FetchFuture, HttpTransport, Transport};
pub use url::Url;

pub type Result<T> = std::result::Result<T, RelayError>;
