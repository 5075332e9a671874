//! Rate-limited reporting of outbound frames the socket had to discard.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use log::warn;
use parking_lot::Mutex;

/// Why an outbound frame or command was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DropCause {
    /// The offline queue reached `max_enqueued_messages`.
    QueueFull,
    /// Writing to the open connection failed.
    WriteFailed,
    /// The worker's command channel was at capacity.
    CommandBacklog,
}

impl DropCause {
    const ALL: [Self; 3] = [Self::QueueFull, Self::WriteFailed, Self::CommandBacklog];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::QueueFull => "offline queue full",
            Self::WriteFailed => "write failed",
            Self::CommandBacklog => "command backlog",
        }
    }
}

/// Drop counts accumulated since the previous report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DropReport {
    counts: [u64; 3],
}

impl DropReport {
    pub(crate) fn count(&self, cause: DropCause) -> u64 {
        self.counts[cause.index()]
    }

    pub(crate) fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for DropReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cause in DropCause::ALL {
            let count = self.count(cause);
            if count == 0 {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}: {count}", cause.label())?;
            first = false;
        }
        Ok(())
    }
}

/// Counts dropped frames per [`DropCause`] and logs a summary for the socket's
/// URL at most once per interval.
///
/// Shared between the socket handle, its senders and the worker thread.
#[derive(Debug)]
pub(crate) struct DropWarner {
    url: String,
    interval: Duration,
    counts: [AtomicU64; 3],
    last_warn: Mutex<Option<Instant>>,
}

impl DropWarner {
    /// The first drop is reported immediately.
    pub(crate) fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            url: url.into(),
            interval,
            counts: Default::default(),
            last_warn: Mutex::new(None),
        }
    }

    /// Count one drop and warn when the interval has elapsed.
    pub(crate) fn record(&self, cause: DropCause) -> Option<DropReport> {
        self.counts[cause.index()].fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut last = self.last_warn.lock();
        if last.is_some_and(|at| now.duration_since(at) < self.interval) {
            return None;
        }
        let report = self.take();
        if report.is_empty() {
            return None;
        }
        *last = Some(now);
        self.emit(&report);
        Some(report)
    }

    /// Report everything still pending regardless of the interval.
    pub(crate) fn flush(&self) -> Option<DropReport> {
        let mut last = self.last_warn.lock();
        let report = self.take();
        if report.is_empty() {
            return None;
        }
        *last = Some(Instant::now());
        self.emit(&report);
        Some(report)
    }

    fn take(&self) -> DropReport {
        DropReport {
            counts: std::array::from_fn(|index| self.counts[index].swap(0, Ordering::Relaxed)),
        }
    }

    fn emit(&self, report: &DropReport) {
        warn!(
            "ReconnectingSocket {} dropped {} messages ({report})",
            self.url,
            report.total()
        );
    }
}
