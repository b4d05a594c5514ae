//! Per-run context: the removal log and progress reporting.

use chrono::{DateTime, Utc};

/// Severity of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational step.
    Info,
    /// Something was removed.
    Success,
    /// Non-fatal problem or no-op.
    Warning,
    /// A part could not be processed.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Success => "OK",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One timestamped message of a [`RemovalLog`].
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Entry severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Append-only trail of a document surgery run.
///
/// Every entry is also forwarded to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct RemovalLog {
    entries: Vec<LogEntry>,
}

impl RemovalLog {
    /// Append an entry.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            severity,
            message,
        });
    }

    /// Append an [`Severity::Info`] entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    /// Append a [`Severity::Success`] entry.
    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    /// Append a [`Severity::Warning`] entry.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    /// Append a [`Severity::Error`] entry.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Entries in recording order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries with `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Completion of a multi-step operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Steps finished.
    pub done: usize,
    /// Steps in the operation.
    pub total: usize,
}

impl Progress {
    /// Completion in percent; an empty operation counts as complete.
    #[must_use]
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.done as f32 / self.total as f32;
        ratio * 100.0
    }
}

/// Context for one user-initiated operation.
///
/// Holds the [`RemovalLog`] of one operation. Each document run calls
/// [`Session::reset`] before it starts.
#[derive(Debug, Default)]
pub struct Session {
    log: RemovalLog,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The log of the current (or last) run.
    #[must_use]
    pub fn log(&self) -> &RemovalLog {
        &self.log
    }

    /// Mutable access to the log of the current run.
    pub fn log_mut(&mut self) -> &mut RemovalLog {
        &mut self.log
    }

    /// Drop all state of the previous operation.
    pub fn reset(&mut self) {
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_order_and_severity() {
        let mut log = RemovalLog::default();
        log.info("scanning");
        log.success("removed 1 shape");
        log.warn("nothing in slide2");
        log.error("slide3 unreadable");

        let severities: Vec<_> = log.entries().iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Info,
                Severity::Success,
                Severity::Warning,
                Severity::Error
            ]
        );
        assert_eq!(log.count(Severity::Error), 1);
        assert!(log.entries()[0].timestamp <= log.entries()[3].timestamp);
        assert!(log.entries()[1].to_string().contains("OK"));
    }

    #[test]
    fn reset_clears_previous_entries() {
        let mut session = Session::new();
        session.log_mut().info("first run");
        assert_eq!(session.log().len(), 1);
        session.reset();
        assert!(session.log().is_empty());
    }

    #[test]
    fn progress_percent() {
        assert!((Progress { done: 1, total: 4 }.percent() - 25.0).abs() < f32::EPSILON);
        assert!((Progress { done: 0, total: 0 }.percent() - 100.0).abs() < f32::EPSILON);
    }
}
