//! Log-output gates
//!
//! Turns the unbounded, live line stream of a supervised process into one
//! terminal outcome: a success pattern matched, a failure pattern matched
//! (plus bounded trailing context for diagnostics), the deadline elapsed,
//! the stream closed, or the operator cancelled the run. The wait suspends
//! on the line channel, it never polls.
//!
//! Failure detection does not resolve on the first matching line: the
//! useful diagnostics (stack traces, causal messages) usually follow it, so
//! the gate keeps capturing until a fixed number of trailing lines arrived
//! or the stream ended.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{HarnessError, HarnessResult};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::supervisor::LineStream;

/// Trailing lines captured after a failure line before resolving.
pub const DEFAULT_CONTEXT_CAPACITY: usize = 20;

/// Terminal result of one gate invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// A success pattern was found; carries the matching line.
    Matched { line: String },
    /// A failure pattern was found; carries the line and bounded trailing
    /// context.
    Failed {
        failure_line: String,
        trailing_context: Vec<String>,
    },
    /// The deadline elapsed before any pattern matched.
    TimedOut { elapsed: Duration },
    /// The stream closed before any pattern matched. Distinct from both
    /// success and timeout; the caller decides whether it is acceptable.
    StreamClosed,
    /// The operator aborted the run.
    Cancelled,
}

impl GateOutcome {
    /// Convert into the matched line, mapping every other outcome to the
    /// corresponding error.
    pub fn expect_matched(self) -> HarnessResult<String> {
        match self {
            GateOutcome::Matched { line } => Ok(line),
            GateOutcome::Failed {
                failure_line,
                trailing_context,
            } => Err(HarnessError::GateFailed {
                failure_line,
                context: trailing_context,
            }),
            GateOutcome::TimedOut { elapsed } => Err(HarnessError::GateTimeout { elapsed }),
            GateOutcome::StreamClosed => Err(HarnessError::GateClosed),
            GateOutcome::Cancelled => Err(HarnessError::Cancelled),
        }
    }
}

/// A single-use wait condition over a process line stream.
pub struct LogGate {
    success: String,
    failure: Option<String>,
    deadline: Option<Duration>,
    trim_indented: bool,
    context_capacity: usize,
}

impl LogGate {
    /// Gate that resolves once a line contains `success`.
    pub fn until(success: impl Into<String>) -> Self {
        LogGate {
            success: success.into(),
            failure: None,
            deadline: None,
            trim_indented: false,
            context_capacity: DEFAULT_CONTEXT_CAPACITY,
        }
    }

    /// Also watch for a failure substring (e.g. `"ERROR"`).
    pub fn until_fail(mut self, failure: impl Into<String>) -> Self {
        self.failure = Some(failure.into());
        self
    }

    /// Resolve `TimedOut` once this much wall-clock time elapsed since the
    /// wait started. `None` (the default) waits unboundedly, as required
    /// for debugger-attach runs.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline_opt(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Do not echo lines beginning with whitespace; they are continuations
    /// of the previous line (stack trace frames). They are still scanned
    /// for patterns.
    pub fn trim_indented(mut self) -> Self {
        self.trim_indented = true;
        self
    }

    /// Override the trailing-context capture size.
    pub fn context_capacity(mut self, capacity: usize) -> Self {
        self.context_capacity = capacity;
        self
    }

    /// Consume lines until the gate resolves. Single pass: consumed lines
    /// are gone even if the gate resolves without matching them.
    pub async fn wait(
        &self,
        role: &str,
        lines: &mut LineStream,
        cancel: &CancelSignal,
    ) -> GateOutcome {
        let start = Instant::now();
        let deadline = self.deadline.map(|d| start + d);
        let mut cancel = cancel.clone();

        // Open failure-capture window, if any.
        let mut failure_line: Option<String> = None;
        let mut trailing: Vec<String> = Vec::new();

        loop {
            let next = tokio::select! {
                line = lines.next_line() => line,
                _ = wait_deadline(deadline) => {
                    if let Some(failure_line) = failure_line {
                        // An observed failure beats reporting silence.
                        return GateOutcome::Failed { failure_line, trailing_context: trailing };
                    }
                    return GateOutcome::TimedOut { elapsed: start.elapsed() };
                }
                _ = cancel.cancelled() => return GateOutcome::Cancelled,
            };

            let Some(line) = next else {
                return match failure_line {
                    Some(failure_line) => GateOutcome::Failed {
                        failure_line,
                        trailing_context: trailing,
                    },
                    None => GateOutcome::StreamClosed,
                };
            };

            if let Some(failure_line) = failure_line.as_ref() {
                tracing::debug!("[{}] {}", role, line);
                trailing.push(line);
                if trailing.len() >= self.context_capacity {
                    return GateOutcome::Failed {
                        failure_line: failure_line.clone(),
                        trailing_context: trailing,
                    };
                }
                continue;
            }

            if !self.trim_indented || !is_continuation(&line) {
                tracing::debug!("[{}] {}", role, line);
            }

            if let Some(failure) = self.failure.as_ref() {
                if line.contains(failure) {
                    if self.context_capacity == 0 {
                        return GateOutcome::Failed {
                            failure_line: line,
                            trailing_context: Vec::new(),
                        };
                    }
                    failure_line = Some(line);
                    continue;
                }
            }

            if line.contains(&self.success) {
                return GateOutcome::Matched { line };
            }
        }
    }
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
