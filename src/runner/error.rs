use std::fmt;

/// Outcome of a method body that did not return normally.
///
/// `Expected` and `Skip` are intentional signals, not failures: an expected
/// error closes its tests as PASSED, a skip request as SKIPPED. `Interrupted`
/// aborts the whole run at the next method boundary. Everything else is a
/// plain failure and closes as FAILED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodError {
    /// The method failed on purpose; treated as a passing outcome.
    Expected(String),
    /// Explicit request to skip the remainder of this invocation.
    Skip(String),
    /// User interrupt; fatal for the entire run.
    Interrupted,
    /// Any other failure raised by the method body.
    Failed {
        message: String,
        detail: Option<String>,
    },
}

impl MethodError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn failed_with(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Convert a caught panic payload into a plain failure.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_owned()))
            .unwrap_or_else(|| "panic in test method".to_owned());
        Self::failed(message)
    }

    /// Whether this error escalates past the method's own cycle loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Whether this error is an intentional signal rather than a failure.
    pub fn is_intentional(&self) -> bool {
        matches!(self, Self::Expected(_) | Self::Skip(_))
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected(note) => write!(f, "expected error: {note}"),
            Self::Skip(reason) => write!(f, "skip requested: {reason}"),
            Self::Interrupted => write!(f, "user interrupt"),
            Self::Failed { message, .. } => write!(f, "{message}"),
        }
    }
}

/// Suite construction failure. Methods of the affected suite-cycle are
/// force-skipped with this error as the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryError {
    pub message: String,
    pub detail: Option<String>,
}

impl FactoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suite construction failed: {}", self.message)
    }
}

/// Error raised by a report sink callback. Isolated per sink and logged
/// unless propagation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reporter '{}' failed: {}", self.sink, self.message)
    }
}

/// Why a dependency gate refused a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMissKind {
    /// A `depends` priority was never attempted.
    NotAttempted,
    /// An `on_success` priority produced no PASSED outcome.
    NoPass,
    /// An `on_failure` priority produced no failing outcome.
    NoFailure,
}

/// A failed dependency predicate, naming the priority that missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateMiss {
    pub kind: GateMissKind,
    pub prio: u32,
}

impl GateMiss {
    pub fn new(kind: GateMissKind, prio: u32) -> Self {
        Self { kind, prio }
    }
}

impl fmt::Display for GateMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GateMissKind::NotAttempted => {
                write!(f, "priority {} was never attempted", self.prio)
            }
            GateMissKind::NoPass => {
                write!(f, "no PASSED outcome at priority {}", self.prio)
            }
            GateMissKind::NoFailure => {
                write!(f, "no failing outcome at priority {}", self.prio)
            }
        }
    }
}

/// Fatal run-level error: the only ways a run ends without an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// User interrupt observed at a method boundary.
    Interrupted,
    /// A debug flag escalated an error into aborting the run.
    Aborted {
        message: String,
        detail: Option<String>,
    },
}

impl RunError {
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
            detail: None,
        }
    }

    pub fn aborted_with(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "run interrupted"),
            Self::Aborted { message, .. } => write!(f, "run aborted: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_error_display() {
        assert_eq!(
            MethodError::Expected("known flake".into()).to_string(),
            "expected error: known flake"
        );
        assert_eq!(
            MethodError::Skip("env missing".into()).to_string(),
            "skip requested: env missing"
        );
        assert_eq!(MethodError::Interrupted.to_string(), "user interrupt");
        assert_eq!(MethodError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn method_error_classification() {
        assert!(MethodError::Interrupted.is_fatal());
        assert!(!MethodError::failed("boom").is_fatal());
        assert!(MethodError::Expected("x".into()).is_intentional());
        assert!(MethodError::Skip("x".into()).is_intentional());
        assert!(!MethodError::failed("x").is_intentional());
    }

    #[test]
    fn from_panic_extracts_string_payloads() {
        let owned: Box<dyn std::any::Any + Send> = Box::new("str panic".to_owned());
        assert_eq!(
            MethodError::from_panic(owned.as_ref()),
            MethodError::failed("str panic")
        );

        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static panic");
        assert_eq!(
            MethodError::from_panic(borrowed.as_ref()),
            MethodError::failed("static panic")
        );

        let opaque: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(
            MethodError::from_panic(opaque.as_ref()),
            MethodError::failed("panic in test method")
        );
    }

    #[test]
    fn factory_error_display() {
        let err = FactoryError::new("database unreachable");
        assert_eq!(
            err.to_string(),
            "suite construction failed: database unreachable"
        );
        let err = FactoryError::with_detail("bad config", "port out of range");
        assert_eq!(err.detail.as_deref(), Some("port out of range"));
    }

    #[test]
    fn gate_miss_display_names_priority() {
        assert_eq!(
            GateMiss::new(GateMissKind::NoPass, 2).to_string(),
            "no PASSED outcome at priority 2"
        );
        assert_eq!(
            GateMiss::new(GateMissKind::NoFailure, 3).to_string(),
            "no failing outcome at priority 3"
        );
        assert_eq!(
            GateMiss::new(GateMissKind::NotAttempted, 4).to_string(),
            "priority 4 was never attempted"
        );
    }

    #[test]
    fn sink_error_display() {
        let err = SinkError::new("console", "pipe closed");
        assert_eq!(err.to_string(), "reporter 'console' failed: pipe closed");
    }

    #[test]
    fn run_error_display() {
        assert_eq!(RunError::Interrupted.to_string(), "run interrupted");
        assert_eq!(
            RunError::aborted("first failure").to_string(),
            "run aborted: first failure"
        );
    }
}
