//! Logger capturing every record for later assertions.

use parking_lot::Mutex;

use crate::rpc::Logger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Severity {
    Error,
    Warn,
    Info,
    Log,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingLogger {
    records: Mutex<Vec<(Severity, String)>>,
}

impl RecordingLogger {
    pub(crate) fn records(&self) -> Vec<(Severity, String)> {
        self.records.lock().clone()
    }

    pub(crate) fn messages(&self, severity: Severity) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(level, _)| *level == severity)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn push(&self, severity: Severity, message: &str) {
        self.records.lock().push((severity, message.to_owned()));
    }
}

impl Logger for RecordingLogger {
    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }

    fn warn(&self, message: &str) {
        self.push(Severity::Warn, message);
    }

    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn log(&self, message: &str) {
        self.push(Severity::Log, message);
    }
}
