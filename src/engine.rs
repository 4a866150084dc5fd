//! Execution engine: one connect/send/receive/close cycle per case.
//!
//! Transport failures never abort a run. They are captured into the case's
//! `RunResult` so the remaining cases still execute.

use crate::catalog::{Catalog, TestCase};
use crate::protocol::ResponseHeader;
use bytes::BytesMut;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Default bound on the single response read
pub const DEFAULT_READ_LIMIT: usize = 1024;

/// Exchange phase in which a transport failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Send,
    Receive,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Connect => write!(f, "connect"),
            Phase::Send => write!(f, "send"),
            Phase::Receive => write!(f, "receive"),
        }
    }
}

/// Connection-level failure captured for a single case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub phase: Phase,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl TransportError {
    fn io(phase: Phase, err: io::Error) -> Self {
        Self {
            phase,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn timed_out(phase: Phase, after: Duration) -> Self {
        Self {
            phase,
            kind: io::ErrorKind::TimedOut,
            message: format!("timed out after {}ms", after.as_millis()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == io::ErrorKind::TimedOut
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ERROR: {} failed: {}", self.phase, self.message)
    }
}

impl std::error::Error for TransportError {}

/// What came back for a case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Bytes read from the server, decoded lossily
    Received(String),
    /// The exchange failed before a response could be read
    Transport(TransportError),
}

/// Outcome classification of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Server answered, but not with the expected status
    Mismatch,
    TransportFailed,
}

/// Outcome of running one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub case: TestCase,
    pub response: Response,
}

impl RunResult {
    pub fn verdict(&self) -> Verdict {
        match &self.response {
            Response::Received(actual) if matches_prefix(actual, self.case.expected_prefix()) => {
                Verdict::Passed
            }
            Response::Received(_) => Verdict::Mismatch,
            Response::Transport(_) => Verdict::TransportFailed,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Passed
    }
}

/// Case-sensitive prefix match after trimming trailing whitespace and
/// control characters from the response.
pub fn matches_prefix(actual: &str, expected: &str) -> bool {
    actual
        .trim_end_matches(|c: char| c.is_whitespace() || c.is_control())
        .starts_with(expected)
}

/// Runs catalog cases against a GETFILE endpoint
#[derive(Debug, Clone)]
pub struct Executor {
    target: String,
    timeout: Duration,
    read_limit: usize,
    concurrency: usize,
}

impl Executor {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
            read_limit: DEFAULT_READ_LIMIT,
            concurrency: 1,
        }
    }

    pub fn with_read_limit(mut self, read_limit: usize) -> Self {
        self.read_limit = read_limit.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Execute a single case over a fresh connection.
    pub async fn execute(&self, case: &TestCase) -> RunResult {
        let response = match self.exchange(case).await {
            Ok(received) => Response::Received(received),
            Err(e) => {
                warn!(
                    case = case.description(),
                    phase = %e.phase,
                    error = %e.message,
                    "Transport failure"
                );
                Response::Transport(e)
            }
        };

        RunResult {
            case: case.clone(),
            response,
        }
    }

    /// The stream lives only in this scope, so it is closed on every path.
    async fn exchange(&self, case: &TestCase) -> Result<String, TransportError> {
        let mut stream = timeout(self.timeout, TcpStream::connect(&self.target))
            .await
            .map_err(|_| TransportError::timed_out(Phase::Connect, self.timeout))?
            .map_err(|e| TransportError::io(Phase::Connect, e))?;
        trace!(target_addr = %self.target, "Connected");

        timeout(self.timeout, stream.write_all(case.request()))
            .await
            .map_err(|_| TransportError::timed_out(Phase::Send, self.timeout))?
            .map_err(|e| TransportError::io(Phase::Send, e))?;

        // Status lines are short, so one bounded read is enough
        let mut buffer = BytesMut::with_capacity(self.read_limit);
        let mut reader = (&mut stream).take(self.read_limit as u64);
        let n = timeout(self.timeout, reader.read_buf(&mut buffer))
            .await
            .map_err(|_| TransportError::timed_out(Phase::Receive, self.timeout))?
            .map_err(|e| TransportError::io(Phase::Receive, e))?;

        match ResponseHeader::parse(&buffer) {
            Ok(header) => debug!(
                case = case.description(),
                bytes = n,
                status = header.status.token(),
                length = ?header.length,
                payload_bytes = n.saturating_sub(header.header_len),
                "Received response"
            ),
            Err(e) => debug!(
                case = case.description(),
                bytes = n,
                error = %e,
                "Received unparseable response"
            ),
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Run every case, returning results in catalog order.
    pub async fn run(&self, catalog: &Catalog) -> Vec<RunResult> {
        if catalog.is_empty() {
            return Vec::new();
        }

        if self.concurrency == 1 {
            let mut results = Vec::with_capacity(catalog.len());
            for case in catalog {
                debug!(case = case.description(), "Running case");
                results.push(self.execute(case).await);
            }
            return results;
        }

        self.run_concurrent(catalog).await
    }

    /// Each case runs in its own task with its own connection. Results are
    /// slotted back by index, so tasks share nothing mutable.
    async fn run_concurrent(&self, catalog: &Catalog) -> Vec<RunResult> {
        let limit = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, case) in catalog.iter().enumerate() {
            let executor = self.clone();
            let case = case.clone();
            let limit = Arc::clone(&limit);

            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = limit.acquire_owned().await.ok();
                debug!(case = case.description(), "Running case");
                (index, executor.execute(&case).await)
            });
        }

        let mut slots: Vec<Option<RunResult>> = vec![None; catalog.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "Case task failed"),
            }
        }

        slots
            .into_iter()
            .zip(catalog.iter())
            .map(|(slot, case)| {
                slot.unwrap_or_else(|| RunResult {
                    case: case.clone(),
                    response: Response::Transport(TransportError {
                        phase: Phase::Connect,
                        kind: io::ErrorKind::Other,
                        message: "case task aborted".to_string(),
                    }),
                })
            })
            .collect()
    }
}
