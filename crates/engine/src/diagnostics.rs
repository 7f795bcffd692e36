use tracing::{debug, error};

/// How much of the engine's reasoning is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    Errors,
    Debug,
}

impl Verbosity {
    pub fn from_flags(debug: bool, silence_errors: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if silence_errors {
            Verbosity::Silent
        } else {
            Verbosity::Errors
        }
    }
}

/// Where user-visible diagnostics end up.
pub trait DiagnosticsSink: Send {
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn debug(&self, message: &str) {
        debug!(target: "autocast::diagnostics", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "autocast::diagnostics", "{message}");
    }
}

/// Verbosity policy in front of a sink. Messages are built lazily so skipped
/// levels cost nothing.
pub struct Diagnostics {
    verbosity: Verbosity,
    sink: Box<dyn DiagnosticsSink>,
}

impl Diagnostics {
    pub fn new(verbosity: Verbosity, sink: Box<dyn DiagnosticsSink>) -> Self {
        Self { verbosity, sink }
    }

    pub fn tracing(verbosity: Verbosity) -> Self {
        Self::new(verbosity, Box::new(TracingSink))
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    pub fn debug(&self, message: impl FnOnce() -> String) {
        if self.verbosity >= Verbosity::Debug {
            self.sink.debug(&message());
        }
    }

    pub fn error(&self, message: impl FnOnce() -> String) {
        if self.verbosity >= Verbosity::Errors {
            self.sink.error(&message());
        }
    }
}
