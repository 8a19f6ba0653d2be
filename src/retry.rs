//! Retry state machine.
//!
//! Each attempt produces an [`AttemptOutcome`]; [`RetryState::after`] turns it
//! into the next state. The final attempt always lands in a [`Terminal`]
//! state, so the number of transport calls never exceeds the budget.

use reqwest::StatusCode;

use crate::{transport::TransportError, ClientError, Response, Result};

/// Classified failure of a single attempt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum Failure {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("HTTP error: {message}")]
    Status { status: u16, message: String },
    #[error("request error: {0}")]
    Other(String),
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Whether `status` is an HTTP error code (4xx or 5xx).
pub(crate) fn is_error_status(status: u16) -> bool {
    (400..600).contains(&status)
}

impl Failure {
    /// Failure for a response whose status denotes an HTTP error (4xx/5xx).
    pub(crate) fn status(status: u16, url: &str) -> Self {
        let kind = if status < 500 {
            "Client Error"
        } else {
            "Server Error"
        };
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown");
        Self::Status {
            status,
            message: format!("{status} {kind}: {reason} for url: {url}"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success(Response),
    Failed(Failure),
}

#[derive(Debug)]
pub(crate) enum RetryState {
    /// About to run the given 1-based attempt.
    Attempting(usize),
    Done(Terminal),
}

#[derive(Debug)]
pub(crate) enum Terminal {
    Succeeded(Response),
    ExhaustedConnection(String),
    ExhaustedResponse { status: u16, message: String },
    ExhaustedOther(String),
    /// Rejected before any attempt was made.
    FailFast(String),
}

impl RetryState {
    pub(crate) fn start() -> Self {
        Self::Attempting(1)
    }

    /// Next state after `attempt` of `budget` finished with `outcome`.
    pub(crate) fn after(attempt: usize, budget: usize, outcome: AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Success(response) => Self::Done(Terminal::Succeeded(response)),
            AttemptOutcome::Failed(_) if attempt < budget => Self::Attempting(attempt + 1),
            AttemptOutcome::Failed(Failure::Connection(message)) => {
                Self::Done(Terminal::ExhaustedConnection(message))
            }
            AttemptOutcome::Failed(Failure::Status { status, message }) => {
                Self::Done(Terminal::ExhaustedResponse { status, message })
            }
            AttemptOutcome::Failed(Failure::Other(message)) => {
                Self::Done(Terminal::ExhaustedOther(message))
            }
        }
    }
}

impl Terminal {
    pub(crate) fn into_result(self, url: &str) -> Result<Response> {
        match self {
            Terminal::Succeeded(response) => Ok(response),
            Terminal::ExhaustedConnection(message) => Err(ClientError::Connection {
                url: url.to_owned(),
                message,
            }),
            Terminal::ExhaustedResponse { status, message } => {
                Err(ClientError::Response { status, message })
            }
            Terminal::ExhaustedOther(message) => Err(ClientError::RequestFailed { message }),
            Terminal::FailFast(method) => Err(ClientError::InvalidMethod { method }),
        }
    }
}
