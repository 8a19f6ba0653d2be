use std::time::Duration;

/// Minimum declared body size that activates progress reporting (5 MiB).
pub const MIN_SIZE_FOR_PROGRESS: u64 = 5 * 1024 * 1024;

/// Size of the pieces the streaming reader pulls from a response body.
pub const CHUNK_SIZE: usize = 8192;

/// Configures timeout, retry budget and output behavior of a client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total number of attempts per request. Zero is treated as one.
    pub retries: usize,
    /// Emit a log line for every attempt and failure.
    pub verbose: bool,
    /// Report download progress for large GET responses.
    pub show_progress: bool,
    /// Declared size in bytes at or above which progress is reported.
    pub min_progress_size: u64,
    /// Maximum size of a body piece handed to the progress reporter.
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            verbose: false,
            show_progress: false,
            min_progress_size: MIN_SIZE_FOR_PROGRESS,
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Attempt budget actually used by the retry engine; always positive.
    pub fn retry_budget(&self) -> usize {
        self.retries.max(1)
    }
}
