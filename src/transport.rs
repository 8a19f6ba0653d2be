//! Transport seam between the retry engine and the HTTP library.
//!
//! A [`Transport`] performs exactly one exchange per call. Retrying,
//! classification and body buffering are the engine's job.

use std::{fmt, future::Future, pin::Pin};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::header::{HeaderName, HeaderValue};

use crate::{ClientError, RequestSpec};

/// Response body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Failure reported by a transport for a single exchange.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// DNS, TCP or TLS failure before a response was received.
    #[error("{0}")]
    Connect(String),
    /// The exchange did not finish within the attempt timeout.
    #[error("{0}")]
    Timeout(String),
    /// The response body could not be read to completion.
    #[error("{0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        // Connect timeouts are reported as connect errors, matching the
        // behavior of a refused connection.
        if err.is_connect() {
            Self::Connect(message)
        } else if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Status line, headers and unread body of one exchange.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BodyStream,
}

impl TransportResponse {
    /// Builds a response whose body is a single in-memory chunk.
    pub fn from_bytes(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::from_chunks(status, headers, vec![body])
    }

    /// Builds a response whose body yields `chunks` in order.
    pub fn from_chunks(status: u16, headers: Vec<(String, String)>, chunks: Vec<Bytes>) -> Self {
        let stream = futures_util::stream::iter(chunks.into_iter().map(Ok));
        Self {
            status,
            headers,
            body: Box::pin(stream),
        }
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"<stream>")
            .finish()
    }
}

/// Performs a single HTTP exchange.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for &T {
    fn send(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// [`Transport`] backed by an async `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        // Decoding would strip Content-Encoding and Content-Length from the
        // response, hiding them from output and from the progress gate.
        let http = reqwest::Client::builder()
            .user_agent(concat!("rfetch/", env!("CARGO_PKG_VERSION")))
            .no_gzip()
            .no_brotli()
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http })
    }

    /// Wraps an already configured `reqwest` client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.into(), &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Other(format!("invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Other(format!("invalid header value for '{name}': {err}")))?;
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes_stream().map_err(TransportError::from);

        Ok(TransportResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

/// Joins an error with its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
