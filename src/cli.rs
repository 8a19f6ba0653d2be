//! Command surface: argument definitions, header parsing and the request/print
//! cycle used by the `rfetch` binary.

use std::{ffi::OsString, future::Future, io::Write, process::ExitCode, time::Duration};

use bytes::Bytes;
use clap::{Args, CommandFactory, Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde::de::IgnoredAny;
use tracing::{debug, error, warn};

use crate::{
    output::write_response,
    transport::Transport,
    ClientConfig, ClientError, Headers, HttpClient, Method, RequestOptions, Result,
};

const EXAMPLES: &str = r#"Examples:
    1. Normal GET request:
       rfetch GET https://httpbin.org/get

    2. GET request with progress bar (for files larger than 5MB):
       rfetch GET https://example.com/large-file.zip --progress

    3. GET request with verbose mode to see retry logs and detailed output:
       rfetch GET https://httpbin.org/get --verbose

    4. GET request with a custom header (e.g., Authorization token):
       rfetch GET https://httpbin.org/headers -H "Authorization: Bearer your_token_here"

    5. POST request with JSON data and custom Content-Type header:
       rfetch POST https://httpbin.org/post -d '{"key": "value"}' -H "Content-Type: application/json"

    6. PUT request example to update a resource:
       rfetch PUT https://httpbin.org/put -d '{"name": "New Name"}'

    7. PATCH request example to partially update a resource:
       rfetch PATCH https://httpbin.org/patch -d '{"email": "user@example.com"}'

    8. DELETE request to remove a resource:
       rfetch DELETE https://httpbin.org/delete

    9. HEAD request to fetch only headers:
       rfetch HEAD https://httpbin.org/get

    10. OPTIONS request to check allowed methods:
       rfetch OPTIONS https://httpbin.org/get

    11. Retry up to 5 times with a 10 second timeout per attempt:
       rfetch GET https://httpbin.org/status/503 -r 5 -t 10

    12. Show help message:
       rfetch HELP
"#;

/// Process exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Exit {
    Success = 0,
    Failure = 1,
    Interrupted = 130,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

/// HTTP CLI client supporting GET, POST, PUT, PATCH, DELETE, HEAD, and OPTIONS methods
#[derive(Debug, Parser)]
#[command(name = "rfetch", version, disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show detailed help and examples
    #[command(name = "HELP")]
    Help,
    /// Make a GET request
    #[command(name = "GET")]
    Get(RequestArgs),
    /// Make a POST request
    #[command(name = "POST")]
    Post(BodyRequestArgs),
    /// Make a PUT request
    #[command(name = "PUT")]
    Put(BodyRequestArgs),
    /// Make a PATCH request
    #[command(name = "PATCH")]
    Patch(BodyRequestArgs),
    /// Make a DELETE request
    #[command(name = "DELETE")]
    Delete(RequestArgs),
    /// Make a HEAD request
    #[command(name = "HEAD")]
    Head(RequestArgs),
    /// Make an OPTIONS request
    #[command(name = "OPTIONS")]
    Options(RequestArgs),
}

/// Arguments shared by every request command.
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    /// Target URL
    pub url: String,

    /// Request timeout in seconds, per attempt
    #[arg(short = 't', long, default_value_t = 30, env = "RFETCH_TIMEOUT")]
    pub timeout: u64,

    /// Total number of attempts before giving up
    #[arg(short = 'r', long, default_value_t = 3, env = "RFETCH_RETRIES")]
    pub retries: usize,

    /// HTTP header in 'Key: Value' format. Can be used multiple times.
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Enable verbose logging for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Show progress bar for downloads larger than 5MB
    #[arg(long)]
    pub progress: bool,
}

/// Arguments for commands that may carry a JSON body.
#[derive(Debug, Clone, Args)]
pub struct BodyRequestArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// JSON data for request body, e.g. '{"key": "value"}'
    #[arg(short = 'd', long)]
    pub data: Option<String>,
}

impl Command {
    /// Method, shared arguments and optional body of a request command.
    pub fn request(&self) -> Option<(Method, &RequestArgs, Option<&str>)> {
        match self {
            Command::Help => None,
            Command::Get(args) => Some((Method::Get, args, None)),
            Command::Post(args) => Self::with_body(Method::Post, args),
            Command::Put(args) => Self::with_body(Method::Put, args),
            Command::Patch(args) => Self::with_body(Method::Patch, args),
            Command::Delete(args) => Some((Method::Delete, args, None)),
            Command::Head(args) => Some((Method::Head, args, None)),
            Command::Options(args) => Some((Method::Options, args, None)),
        }
    }

    fn with_body(
        method: Method,
        args: &BodyRequestArgs,
    ) -> Option<(Method, &RequestArgs, Option<&str>)> {
        Some((method, &args.request, args.data.as_deref()))
    }
}

impl Cli {
    /// Whether the selected command asked for verbose output.
    pub fn verbose(&self) -> bool {
        self.command
            .as_ref()
            .and_then(Command::request)
            .is_some_and(|(_, args, _)| args.verbose)
    }
}

impl RequestArgs {
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retries(self.retries)
            .with_verbose(self.verbose)
            .with_progress(self.progress)
    }
}

/// Uppercases the command word so commands match regardless of case.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if let Some(command) = args.get_mut(1) {
        let upper = command.to_str().map(str::to_ascii_uppercase);
        if let Some(upper) = upper {
            let known = upper == "HELP" || upper.parse::<Method>().is_ok();
            if known {
                *command = OsString::from(upper);
            }
        }
    }
    args
}

/// Parses `Key: Value` header arguments; entries without a colon are ignored
/// and later duplicates replace earlier ones.
pub fn parse_headers<I, S>(items: I) -> Headers
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter_map(|item| {
            let (key, value) = item.as_ref().split_once(':')?;
            Some((key.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

/// Builds request options from header arguments and optional JSON data.
///
/// JSON data is validated and then sent exactly as given; `Content-Type:
/// application/json` is added unless a content type was already supplied.
pub fn build_options(headers: &[String], data: Option<&str>) -> Result<RequestOptions> {
    let mut options = RequestOptions {
        headers: parse_headers(headers),
        body: None,
    };

    if let Some(data) = data {
        serde_json::from_str::<IgnoredAny>(data)?;
        options.body = Some(Bytes::copy_from_slice(data.as_bytes()));
        let has_content_type = options
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        if !has_content_type {
            options
                .headers
                .insert("Content-Type".to_owned(), "application/json".to_owned());
        }
    }

    Ok(options)
}

/// Writes usage followed by example invocations.
pub fn write_help<W: Write>(out: &mut W) -> std::io::Result<()> {
    let help = Cli::command().render_long_help();
    writeln!(out, "{help}")?;
    writeln!(out)?;
    write!(out, "{}", EXAMPLES)
}

/// Runs one parsed invocation against `transport`, writing results to `out`.
pub async fn run<T, W>(cli: Cli, transport: T, out: &mut W) -> Exit
where
    T: Transport,
    W: Write,
{
    let request = cli.command.as_ref().and_then(Command::request);
    let Some((method, args, data)) = request else {
        return finish(write_help(out), Exit::Success);
    };

    let options = match build_options(&args.headers, data) {
        Ok(options) => options,
        Err(ClientError::InvalidJson(err)) => {
            debug!(error = %err, "request body is not valid JSON");
            let written = writeln!(out, "Error: Invalid JSON data")
                .and_then(|_| writeln!(out, "Make sure your JSON data is properly formatted."))
                .and_then(|_| writeln!(out, r#"Example: '{{"key": "value"}}'"#));
            return finish(written, Exit::Failure);
        }
        Err(err) => return finish(writeln!(out, "Error: {err}"), Exit::Failure),
    };

    let client = HttpClient::with_transport(transport, args.config());
    match client.send(method, &args.url, options).await {
        Ok(response) => finish(write_response(out, &response), Exit::Success),
        Err(err) => finish(writeln!(out, "Error: {err}"), Exit::Failure),
    }
}

/// Like [`run`], but gives up as soon as `shutdown` completes, returning
/// [`Exit::Interrupted`] without writing anything further to `out`.
pub async fn run_until<T, W, F>(cli: Cli, transport: T, out: &mut W, shutdown: F) -> Exit
where
    T: Transport,
    W: Write,
    F: Future<Output = ()>,
{
    tokio::select! {
        exit = run(cli, transport, out) => exit,
        () = shutdown => {
            warn!("operation cancelled by user");
            Exit::Interrupted
        }
    }
}

fn finish(written: std::io::Result<()>, exit: Exit) -> Exit {
    match written {
        Ok(()) => exit,
        Err(err) => {
            error!(error = %err, "failed to write output");
            Exit::Failure
        }
    }
}
