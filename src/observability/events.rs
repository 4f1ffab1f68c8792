//! Observable events
//!
//! Every lifecycle point the compiler and cursor manager report is named
//! here, so log consumers can match on a closed set of strings.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Store configuration loaded
    ConfigLoaded,

    // Compilation
    /// A predicate tree was compiled to a native query
    FilterCompiled,
    /// A predicate subtree degraded to match-all
    PredicateUnsupported,
    /// The native override replaced the compiled query
    NativeQueryOnly,
    /// Grid aggregation precision resolved
    GridPrecisionResolved,

    // Backend round trips
    /// Initial search executed
    SearchExecuted,
    /// Scroll continuation executed
    ScrollAdvanced,
    /// Scroll ids released
    ScrollReleased,
    /// Releasing scroll ids failed (logged only)
    ScrollReleaseFailed,
    /// A backend call failed and was surfaced
    BackendFailed,

    // Paging
    /// Pager cached for the next page request
    PagerCached,
    /// Pager retrieved by a page request
    PagerRetrieved,
    /// Page request rejected as inconsistent
    PagerRejected,
    /// Pager force-closed by idle timeout
    PagerExpired,
    /// Pager closed after its final page
    PagerFinished,

    // Scheduler
    /// Expiry scheduler shut down
    SchedulerShutdown,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::FilterCompiled => "FILTER_COMPILED",
            Event::PredicateUnsupported => "PREDICATE_UNSUPPORTED",
            Event::NativeQueryOnly => "NATIVE_QUERY_ONLY",
            Event::GridPrecisionResolved => "GRID_PRECISION_RESOLVED",
            Event::SearchExecuted => "SEARCH_EXECUTED",
            Event::ScrollAdvanced => "SCROLL_ADVANCED",
            Event::ScrollReleased => "SCROLL_RELEASED",
            Event::ScrollReleaseFailed => "SCROLL_RELEASE_FAILED",
            Event::BackendFailed => "BACKEND_FAILED",
            Event::PagerCached => "PAGER_CACHED",
            Event::PagerRetrieved => "PAGER_RETRIEVED",
            Event::PagerRejected => "PAGER_REJECTED",
            Event::PagerExpired => "PAGER_EXPIRED",
            Event::PagerFinished => "PAGER_FINISHED",
            Event::SchedulerShutdown => "SCHEDULER_SHUTDOWN",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ScrollAdvanced | Event::PagerCached | Event::PagerRetrieved => Severity::Debug,
            Event::PredicateUnsupported
            | Event::ScrollReleaseFailed
            | Event::PagerRejected
            | Event::PagerExpired => Severity::Warn,
            Event::BackendFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
