//! `rfetch` is a command-line HTTP client built around a retrying request core.
//!
//! [`HttpClient`] sends one logical request through a [`Transport`], retrying
//! connection failures, HTTP error statuses and other transport errors up to
//! the configured budget. Every failure surfaces as a typed [`ClientError`]:
//! - [`ClientError::InvalidMethod`] before any attempt
//! - [`ClientError::Connection`], [`ClientError::Response`] or
//!   [`ClientError::RequestFailed`] once the budget is spent

pub mod cli;
mod client;
mod error;
mod options;
pub mod output;
pub mod progress;
mod retry;
mod stream;
pub mod transport;
mod types;

pub use client::HttpClient;
pub use error::ClientError;
pub use options::{ClientConfig, CHUNK_SIZE, MIN_SIZE_FOR_PROGRESS};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
pub use types::{Headers, Method, RequestOptions, RequestSpec, Response};

pub type Result<T> = std::result::Result<T, ClientError>;
