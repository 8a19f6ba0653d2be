use std::{fmt, sync::Arc};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    progress::{ProgressFactory, TerminalProgress},
    retry::{is_error_status, AttemptOutcome, Failure, RetryState, Terminal},
    stream::{progress_gate, read_body},
    transport::{ReqwestTransport, Transport},
    types::{declared_length, find_header},
    ClientConfig, Method, RequestOptions, RequestSpec, Response, Result,
};

/// HTTP client that retries transient failures and buffers response bodies.
///
/// Requests run sequentially: an attempt (including its body read) completes
/// before the next one starts. The worst-case duration of one call is
/// `retries × timeout`; there is no deadline across attempts.
#[derive(Clone)]
pub struct HttpClient<T = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    progress: Arc<dyn ProgressFactory>,
}

impl<T> fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpClient<ReqwestTransport> {
    /// Creates a client backed by `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new()?, config))
    }
}

impl<T: Transport> HttpClient<T> {
    /// Creates a client that sends every attempt through `transport`.
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            progress: Arc::new(TerminalProgress),
        }
    }

    /// Replaces the progress reporter used for large GET downloads.
    pub fn with_progress_factory(mut self, factory: impl ProgressFactory + 'static) -> Self {
        self.progress = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a request named by a method string such as `"get"` or `"POST"`.
    ///
    /// Unsupported methods fail with [`ClientError::InvalidMethod`](crate::ClientError)
    /// without touching the transport.
    pub async fn make_request(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        match method.parse::<Method>() {
            Ok(method) => self.send(method, url, options).await,
            Err(_) => Terminal::FailFast(method.to_owned()).into_result(url),
        }
    }

    pub async fn send(&self, method: Method, url: &str, options: RequestOptions) -> Result<Response> {
        let spec = RequestSpec {
            method,
            url: url.to_owned(),
            timeout: self.config.timeout,
            headers: options.headers,
            body: options.body,
            retries: self.config.retry_budget(),
            verbose: self.config.verbose,
            show_progress: self.config.show_progress,
        };
        self.execute(&spec).await
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Get, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Post, url, options).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Put, url, options).await
    }

    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Patch, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Delete, url, options).await
    }

    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Head, url, options).await
    }

    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::Options, url, options).await
    }

    async fn execute(&self, spec: &RequestSpec) -> Result<Response> {
        let budget = spec.retries.max(1);
        let mut state = RetryState::start();

        loop {
            let attempt = match state {
                RetryState::Attempting(attempt) => attempt,
                RetryState::Done(terminal) => return terminal.into_result(&spec.url),
            };

            let outcome = self.attempt(spec, attempt, budget).await;
            if let AttemptOutcome::Failed(failure) = &outcome {
                if spec.verbose {
                    warn!(attempt, budget, error = %failure, "attempt failed");
                }
            }
            state = RetryState::after(attempt, budget, outcome);
        }
    }

    async fn attempt(&self, spec: &RequestSpec, attempt: usize, budget: usize) -> AttemptOutcome {
        if spec.verbose {
            let header_names: Vec<&String> = spec.headers.keys().collect();
            info!(
                attempt,
                budget,
                method = %spec.method,
                url = %spec.url,
                timeout_ms = spec.timeout.as_millis() as u64,
                headers = ?header_names,
                body_bytes = spec.body.as_ref().map_or(0, Bytes::len),
                streaming = spec.is_streaming(),
                "sending request"
            );
        }

        let response = match self.transport.send(spec).await {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::Failed(Failure::from(err)),
        };

        if is_error_status(response.status) {
            return AttemptOutcome::Failed(Failure::status(response.status, &spec.url));
        }

        if spec.verbose {
            info!(status = response.status, headers = ?response.headers, "received response");
        }

        let progress = if spec.is_streaming() {
            let total = declared_length(find_header(&response.headers, "content-length"));
            debug!(total, "checking progress threshold");
            progress_gate(
                &self.config,
                self.progress.as_ref(),
                total,
                &format!("Downloading {}", spec.url),
            )
        } else {
            None
        };

        match read_body(response.body, self.config.chunk_size, progress).await {
            Ok(body) => AttemptOutcome::Success(Response {
                status: response.status,
                headers: response.headers,
                body,
            }),
            Err(err) => AttemptOutcome::Failed(Failure::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use bytes::Bytes;

    use super::HttpClient;
    use crate::{
        progress::{NoProgress, ProgressFactory, ProgressReporter},
        transport::{Transport, TransportError, TransportResponse},
        ClientConfig, ClientError, Method, RequestOptions, RequestSpec,
    };

    type Script = Box<dyn Fn() -> Result<TransportResponse, TransportError> + Send + Sync>;

    /// Replays scripted outcomes and records every request it receives.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Script>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<RequestSpec>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RequestSpec) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(request.clone());
            let next = self.script.lock().expect("lock").pop_front();
            match next {
                Some(step) => step(),
                None => Err(TransportError::Other("script exhausted".to_owned())),
            }
        }
    }

    fn refused() -> Script {
        Box::new(|| Err(TransportError::Connect("connection refused".to_owned())))
    }

    fn status(code: u16) -> Script {
        Box::new(move || Ok(TransportResponse::from_bytes(code, Vec::new(), "boom")))
    }

    fn ok(headers: Vec<(&'static str, &'static str)>, chunks: Vec<&'static str>) -> Script {
        Box::new(move || {
            Ok(TransportResponse::from_chunks(
                200,
                headers
                    .iter()
                    .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                    .collect(),
                chunks
                    .iter()
                    .map(|chunk| Bytes::from_static(chunk.as_bytes()))
                    .collect(),
            ))
        })
    }

    #[derive(Default)]
    struct CountingProgress {
        created: Arc<AtomicUsize>,
        advanced: Arc<AtomicUsize>,
    }

    struct CountingReporter {
        advanced: Arc<AtomicUsize>,
    }

    impl ProgressReporter for CountingReporter {
        fn advance(&mut self, bytes: u64) {
            self.advanced.fetch_add(bytes as usize, Ordering::SeqCst);
        }

        fn finish(self: Box<Self>) {}
    }

    impl ProgressFactory for CountingProgress {
        fn create(&self, _total: u64, _label: &str) -> Box<dyn ProgressReporter> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingReporter {
                advanced: self.advanced.clone(),
            })
        }
    }

    fn client(transport: &ScriptedTransport, retries: usize) -> HttpClient<&ScriptedTransport> {
        HttpClient::with_transport(transport, ClientConfig::default().with_retries(retries))
            .with_progress_factory(NoProgress)
    }

    #[tokio::test]
    async fn always_refused_uses_whole_budget_then_reports_connection_error() {
        for budget in 1..=4 {
            let transport = ScriptedTransport::new((0..budget).map(|_| refused()).collect());
            let err = client(&transport, budget)
                .get("http://down.test", RequestOptions::new())
                .await
                .expect_err("request must fail");

            assert_eq!(transport.calls(), budget);
            match err {
                ClientError::Connection { url, message } => {
                    assert_eq!(url, "http://down.test");
                    assert_eq!(message, "connection refused");
                }
                other => panic!("expected connection error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn succeeds_on_last_attempt_after_failures() {
        for budget in 2..=4 {
            let mut script: Vec<Script> = (1..budget).map(|_| refused()).collect();
            script.push(ok(vec![], vec!["done"]));
            let transport = ScriptedTransport::new(script);

            let response = client(&transport, budget)
                .post("http://flaky.test", RequestOptions::new().body("{}"))
                .await
                .expect("last attempt must succeed");

            assert_eq!(transport.calls(), budget);
            assert_eq!(response.status, 200);
            assert_eq!(&response.body[..], b"done");
        }
    }

    #[tokio::test]
    async fn invalid_method_never_reaches_transport() {
        let transport = ScriptedTransport::new(vec![ok(vec![], vec!["unused"])]);
        for method in ["TRACE", "CONNECT", "", "fetch"] {
            let err = client(&transport, 3)
                .make_request(method, "http://any.test", RequestOptions::new())
                .await
                .expect_err("method must be rejected");
            assert!(matches!(err, ClientError::InvalidMethod { .. }));
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn make_request_accepts_lowercase_method() {
        let transport = ScriptedTransport::new(vec![ok(vec![], vec!["yes"])]);
        let response = client(&transport, 3)
            .make_request("patch", "http://any.test", RequestOptions::new())
            .await
            .expect("request must succeed");

        assert_eq!(response.text(), "yes");
        assert_eq!(transport.seen.lock().expect("lock")[0].method, Method::Patch);
    }

    #[tokio::test]
    async fn persistent_http_error_becomes_response_error() {
        let transport = ScriptedTransport::new(vec![status(500), status(502), status(404)]);
        let err = client(&transport, 3)
            .delete("http://api.test/item", RequestOptions::new())
            .await
            .expect_err("request must fail");

        assert_eq!(transport.calls(), 3);
        match err {
            ClientError::Response { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("Not Found"));
            }
            other => panic!("expected response error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_beyond_5xx_is_a_success() {
        let transport = ScriptedTransport::new(vec![status(600)]);
        let response = client(&transport, 3)
            .get("http://odd.test", RequestOptions::new())
            .await
            .expect("non-error status must succeed");

        assert_eq!(transport.calls(), 1);
        assert_eq!(response.status, 600);
        assert_eq!(&response.body[..], b"boom");
    }

    #[tokio::test]
    async fn other_failures_become_request_failed() {
        let transport = ScriptedTransport::new(vec![
            refused(),
            Box::new(|| Err(TransportError::Timeout("operation timed out".to_owned()))),
        ]);
        let err = client(&transport, 2)
            .get("http://slow.test", RequestOptions::new())
            .await
            .expect_err("request must fail");

        assert_eq!(transport.calls(), 2);
        assert!(
            matches!(err, ClientError::RequestFailed { ref message } if message == "operation timed out")
        );
    }

    #[tokio::test]
    async fn body_read_failure_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Box::new(|| {
                let body = futures_util::stream::iter(vec![
                    Ok(Bytes::from_static(b"par")),
                    Err(TransportError::Body("connection reset".to_owned())),
                ]);
                Ok(TransportResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: Box::pin(body),
                })
            }),
            ok(vec![], vec!["full"]),
        ]);

        let response = client(&transport, 2)
            .get("http://reset.test", RequestOptions::new())
            .await
            .expect("second attempt must succeed");
        assert_eq!(&response.body[..], b"full");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn request_spec_carries_config_and_options() {
        let transport = ScriptedTransport::new(vec![ok(vec![], vec![])]);
        let config = ClientConfig::default()
            .with_retries(5)
            .with_verbose(true)
            .with_timeout(std::time::Duration::from_secs(2));
        HttpClient::with_transport(&transport, config)
            .put(
                "http://api.test/users/1",
                RequestOptions::new()
                    .header("Authorization", "Bearer xyz")
                    .body("{\"name\":\"kit\"}"),
            )
            .await
            .expect("request must succeed");

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        let spec = &seen[0];
        assert_eq!(spec.method, Method::Put);
        assert_eq!(spec.url, "http://api.test/users/1");
        assert_eq!(spec.retries, 5);
        assert!(spec.verbose);
        assert_eq!(spec.timeout, std::time::Duration::from_secs(2));
        assert_eq!(spec.headers["Authorization"], "Bearer xyz");
        assert_eq!(spec.body.as_deref(), Some(&b"{\"name\":\"kit\"}"[..]));
    }

    #[tokio::test]
    async fn large_get_download_reports_progress() {
        let progress = CountingProgress::default();
        let created = progress.created.clone();
        let advanced = progress.advanced.clone();
        let transport = ScriptedTransport::new(vec![ok(
            vec![("Content-Length", "6291456")],
            vec!["data", "data", "data", "data"],
        )]);

        let response = HttpClient::with_transport(
            &transport,
            ClientConfig::default().with_progress(true),
        )
        .with_progress_factory(progress)
        .get("http://files.test/big.bin", RequestOptions::new())
        .await
        .expect("download must succeed");

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(advanced.load(Ordering::SeqCst), 16);
        assert_eq!(&response.body[..], b"datadatadatadata");
    }

    #[tokio::test]
    async fn small_or_non_get_downloads_skip_progress() {
        let progress = CountingProgress::default();
        let created = progress.created.clone();
        let transport = ScriptedTransport::new(vec![
            ok(vec![("content-length", "1048576")], vec!["data"]),
            ok(vec![("content-length", "6291456")], vec!["data"]),
            ok(vec![("content-length", "not-a-number")], vec!["data"]),
        ]);
        let client = HttpClient::with_transport(
            &transport,
            ClientConfig::default().with_progress(true),
        )
        .with_progress_factory(progress);

        let small = client
            .get("http://files.test/small", RequestOptions::new())
            .await
            .expect("small download must succeed");
        let posted = client
            .post("http://files.test/upload", RequestOptions::new())
            .await
            .expect("post must succeed");
        let unknown = client
            .get("http://files.test/unknown", RequestOptions::new())
            .await
            .expect("download must succeed");

        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(&small.body[..], b"data");
        assert_eq!(&posted.body[..], b"data");
        assert_eq!(&unknown.body[..], b"data");
    }

    #[test]
    fn debug_shows_config() {
        let transport = ScriptedTransport::new(Vec::new());
        let debug = format!("{:?}", client(&transport, 2));
        assert!(debug.contains("HttpClient"));
        assert!(debug.contains("retries: 2"));
    }
}
