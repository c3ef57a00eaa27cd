//! User-facing notification sink
//!
//! The notifier prints leveled, icon-prefixed lines for the person running
//! `locally` and keeps error and warning counters. [`Notifier::reset`] marks
//! everything recorded so far as read, so that [`Notifier::has_errors`] only
//! reflects what happened afterwards. The pipeline runner uses this to scope
//! error checks to a single step.
//!
//! Every notification is mirrored to a `tracing` event at the matching level.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Notification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Only shown in debug mode
    Debug,
    /// Progress information
    Info,
    /// Completed operation
    Success,
    /// Something needs attention
    Warning,
    /// Something failed
    Error,
}

impl Level {
    /// Icon printed in front of the message
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Level::Debug => "🐞",
            Level::Info => "ℹ️ ",
            Level::Success => "✅",
            Level::Warning => "⚠️ ",
            Level::Error => "❌",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

/// A recorded notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Level
    pub level: Level,
    /// Rendered message, without icon
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.icon(), self.message)
    }
}

#[derive(Debug, Default)]
struct State {
    errors: usize,
    warnings: usize,
    read_errors: usize,
    read_warnings: usize,
    buffer: Vec<Notification>,
}

/// Where rendered lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Console,
    Buffer,
}

/// Leveled notification sink with error and warning counters
#[derive(Debug)]
pub struct Notifier {
    sink: Sink,
    show_debug: bool,
    state: Mutex<State>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::console(false)
    }
}

impl Notifier {
    /// Notifier printing to the terminal; warnings and errors go to stderr
    #[must_use]
    pub fn console(show_debug: bool) -> Self {
        Self {
            sink: Sink::Console,
            show_debug,
            state: Mutex::new(State::default()),
        }
    }

    /// Notifier that keeps rendered lines in memory
    #[must_use]
    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffer,
            show_debug: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Records a notification at `level`
    pub fn notify(&self, level: Level, message: impl fmt::Display) {
        let message = message.to_string();
        match level {
            Level::Debug => tracing::debug!(target: "locally::notify", "{message}"),
            Level::Info | Level::Success => tracing::info!(target: "locally::notify", "{message}"),
            Level::Warning => tracing::warn!(target: "locally::notify", "{message}"),
            Level::Error => tracing::error!(target: "locally::notify", "{message}"),
        }

        let notification = Notification { level, message };
        let mut state = self.state.lock();
        match level {
            Level::Error => state.errors += 1,
            Level::Warning => state.warnings += 1,
            _ => {}
        }

        if level == Level::Debug && !self.show_debug {
            return;
        }
        match self.sink {
            Sink::Console if level >= Level::Warning => eprintln!("{notification}"),
            Sink::Console => println!("{notification}"),
            Sink::Buffer => state.buffer.push(notification),
        }
    }

    /// Debug line
    pub fn debug(&self, message: impl fmt::Display) {
        self.notify(Level::Debug, message);
    }

    /// Info line
    pub fn info(&self, message: impl fmt::Display) {
        self.notify(Level::Info, message);
    }

    /// Success line
    pub fn success(&self, message: impl fmt::Display) {
        self.notify(Level::Success, message);
    }

    /// Warning line
    pub fn warning(&self, message: impl fmt::Display) {
        self.notify(Level::Warning, message);
    }

    /// Error line
    pub fn error(&self, message: impl fmt::Display) {
        self.notify(Level::Error, message);
    }

    /// Marks every recorded error and warning as read
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.read_errors = state.errors;
        state.read_warnings = state.warnings;
    }

    /// Whether errors were recorded since the last [`reset`](Self::reset)
    #[must_use]
    pub fn has_errors(&self) -> bool {
        let state = self.state.lock();
        state.errors > state.read_errors
    }

    /// Whether warnings were recorded since the last [`reset`](Self::reset)
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        let state = self.state.lock();
        state.warnings > state.read_warnings
    }

    /// Total errors recorded
    #[must_use]
    pub fn errors(&self) -> usize {
        self.state.lock().errors
    }

    /// Total warnings recorded
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.state.lock().warnings
    }

    /// Lines kept by a buffered notifier
    #[must_use]
    pub fn messages(&self) -> Vec<Notification> {
        self.state.lock().buffer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counters() {
        let notifier = Notifier::buffered();
        notifier.info("starting");
        notifier.warning("slow");
        notifier.error("failed");
        notifier.error("failed again");

        assert_eq!(notifier.errors(), 2);
        assert_eq!(notifier.warnings(), 1);
        assert_eq!(notifier.messages().len(), 4);
    }

    #[test]
    fn test_reset_scopes_has_errors() {
        let notifier = Notifier::buffered();
        notifier.error("before");
        assert!(notifier.has_errors());

        notifier.reset();
        assert!(!notifier.has_errors());
        assert_eq!(notifier.errors(), 1);

        notifier.error("after");
        assert!(notifier.has_errors());
    }

    #[test]
    fn test_rendered_line_has_icon() {
        let notifier = Notifier::buffered();
        notifier.success(format_args!("cloned {} into {}", "api", "/tmp/api"));
        let line = notifier.messages()[0].to_string();
        assert!(line.starts_with(Level::Success.icon()));
        assert!(line.ends_with("cloned api into /tmp/api"));
    }

    #[test]
    fn test_reset_also_scopes_warnings() {
        let notifier = Notifier::buffered();
        notifier.warning("w");
        notifier.reset();
        assert!(!notifier.has_warnings());
        assert_eq!(notifier.warnings(), 1);
    }
}
