/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Proxy base URL could not be parsed as an absolute URL.
    #[error("invalid proxy base url '{url}': {reason}")]
    InvalidProxyUrl { url: String, reason: String },
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Redirect response received for a request that forbids redirects.
    #[error("redirect {status} rejected (location: {location:?})")]
    RedirectRejected {
        status: u16,
        location: Option<String>,
    },
    /// Request metadata could not be encoded as HTTP headers.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request could not be built or its body serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Retry loop finished without recording any failure.
    #[error(transparent)]
    MaxRetriesReached(#[from] MaxRetriesReached),
}

/// Fallback failure for a retry loop that ran zero attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, thiserror::Error)]
#[error("maximum retries reached without success")]
pub struct MaxRetriesReached;

/// Internal failure while rewriting a request towards the proxy.
///
/// Never surfaces from [`crate::RelayClient::fetch`]; the call falls back to
/// the original request instead.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RewriteError {
    #[error("cannot parse request url '{url}': {reason}")]
    Parse { url: String, reason: String },
    #[error("cannot apply proxy {component} '{value}'")]
    Component {
        component: &'static str,
        value: String,
    },
}
