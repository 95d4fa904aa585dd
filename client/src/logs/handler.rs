use super::messages::LogEntry;

/// Receives the events of a log session. Every method defaults to doing nothing.
///
/// Called from the session's driver task, so implementations should return quickly.
pub trait LogHandler: Send + Sync {
    fn on_container_log(&self, _entry: &LogEntry) {}

    /// `file` is the log file the backend attributed the line to, if it did.
    fn on_ark_log(&self, _file: Option<&str>, _entry: &LogEntry) {}

    fn on_system_log(&self, _entry: &LogEntry) {}

    fn on_connect(&self) {}

    fn on_disconnect(&self, _reason: &str) {}

    fn on_error(&self, _error: &str) {}
}
