//! Cancellation and deadlines
//!
//! A [`CancelToken`] is shared between whoever may stop an ingestion
//! (SIGINT handler, UI, test) and the pipeline, which polls it between
//! entries and between buffered writes. Stopping takes the same cleanup
//! path as an I/O failure.
//!
//! Tokens form a tree: a [`CancelToken::child`] stops when it or any
//! ancestor is cancelled, but cancelling the child leaves the ancestors
//! untouched. The ingestor holds the process-wide token; each session
//! gets its own child.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

/// Exit code for cancelled ingestions
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Why the pipeline was stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Someone called [`CancelToken::cancel`]
    Cancelled,
    /// The caller-supplied overall deadline passed
    DeadlineExceeded,
}

/// Cooperative cancellation flag with an optional deadline.
///
/// Clones share the flag; the deadline belongs to each clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    /// Flags of every ancestor, observed but never set
    inherited: Vec<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same flags, with a deadline `timeout` from now
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            inherited: self.inherited.clone(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// New token with its own flag that also stops when `self` does.
    pub fn child(&self) -> Self {
        let mut inherited = self.inherited.clone();
        inherited.push(Arc::clone(&self.flag));
        Self {
            flag: Arc::default(),
            inherited,
            deadline: self.deadline,
        }
    }

    /// Keep this token's own flag and additionally observe `other`.
    ///
    /// The earlier of the two deadlines applies.
    pub fn linked_with(&self, other: &CancelToken) -> Self {
        let mut inherited = self.inherited.clone();
        for flag in std::iter::once(&other.flag).chain(&other.inherited) {
            if !Arc::ptr_eq(flag, &self.flag) && !inherited.iter().any(|f| Arc::ptr_eq(f, flag)) {
                inherited.push(Arc::clone(flag));
            }
        }
        let deadline = match (self.deadline, other.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            flag: Arc::clone(&self.flag),
            inherited,
            deadline,
        }
    }

    /// Request cancellation of this token and its descendants. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.inherited.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancellation wins over an expired deadline.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interruption::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Routes SIGINT/SIGTERM into a [`CancelToken`].
pub struct SignalHandler {
    token: CancelToken,
}

impl SignalHandler {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Install the process-wide handler. Must be called at most once.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let token = self.token.clone();
        ctrlc::set_handler(move || {
            if !token.is_cancelled() {
                info!(event = "signal.received", action = "cancel");
                eprintln!("\nReceived interrupt signal, cancelling ingestion...");
            }
            token.cancel();
        })
    }
}
