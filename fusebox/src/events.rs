//! The closed set of event kinds a command invocation can mark, split into
//! the two disjoint sub-kinds the rolling number accumulates differently:
//! counters (accumulated by addition) and max-updaters (accumulated by max).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Events accumulated by addition in a [`crate::rolling::number::RollingNumber`] bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    Success,
    Failure,
    Timeout,
    ShortCircuited,
    ThreadPoolRejected,
    SemaphoreRejected,
    FallbackSuccess,
    FallbackFailure,
    FallbackRejection,
    ExceptionThrown,
    ThreadExecution,
    Collapsed,
    ResponseFromCache,
    BadRequest,
    Emit,
    FallbackEmit,
}

impl CounterKind {
    /// All counter kinds, in declaration order — used to size per-bucket maps.
    pub const ALL: &'static [CounterKind] = &[
        CounterKind::Success,
        CounterKind::Failure,
        CounterKind::Timeout,
        CounterKind::ShortCircuited,
        CounterKind::ThreadPoolRejected,
        CounterKind::SemaphoreRejected,
        CounterKind::FallbackSuccess,
        CounterKind::FallbackFailure,
        CounterKind::FallbackRejection,
        CounterKind::ExceptionThrown,
        CounterKind::ThreadExecution,
        CounterKind::Collapsed,
        CounterKind::ResponseFromCache,
        CounterKind::BadRequest,
        CounterKind::Emit,
        CounterKind::FallbackEmit,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Events accumulated by maximum in a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaxKind {
    ThreadMaxActive,
}

impl MaxKind {
    pub const ALL: &'static [MaxKind] = &[MaxKind::ThreadMaxActive];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for MaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index helpers shared by [`crate::rolling::number::Bucket`] and
/// [`crate::rolling::number::CumulativeSum`], which both store one atomic
/// slot per kind in a fixed-size array rather than a hash map — cheap because
/// the kind sets are small and closed (ported from the per-kind `LongAdder`
/// maps in the Python source, but array-indexed instead of dict-keyed).
pub(crate) fn counter_index(kind: CounterKind) -> usize {
    kind.index()
}

pub(crate) const COUNTER_KIND_COUNT: usize = CounterKind::ALL.len();

pub(crate) fn max_index(kind: MaxKind) -> usize {
    kind.index()
}

pub(crate) const MAX_KIND_COUNT: usize = MaxKind::ALL.len();

/// Union of [`CounterKind`] and [`MaxKind`] for call sites that only have a
/// key or a wire value to dispatch on (e.g. a notifier callback) and must
/// validate the sub-kind at runtime rather than at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Counter(CounterKind),
    Max(MaxKind),
}

impl EventKind {
    /// Validates this is a counter kind, or returns `TypeMismatch`.
    pub fn as_counter(self) -> Result<CounterKind, crate::error::TypeMismatch> {
        match self {
            EventKind::Counter(kind) => Ok(kind),
            EventKind::Max(kind) => Err(crate::error::TypeMismatch::ExpectedCounter(kind)),
        }
    }

    /// Validates this is a max-updater kind, or returns `TypeMismatch`.
    pub fn as_max(self) -> Result<MaxKind, crate::error::TypeMismatch> {
        match self {
            EventKind::Max(kind) => Ok(kind),
            EventKind::Counter(kind) => Err(crate::error::TypeMismatch::ExpectedMaxUpdater(kind)),
        }
    }
}

impl From<CounterKind> for EventKind {
    fn from(kind: CounterKind) -> Self {
        EventKind::Counter(kind)
    }
}

impl From<MaxKind> for EventKind {
    fn from(kind: MaxKind) -> Self {
        EventKind::Max(kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Counter(kind) => write!(f, "{kind}"),
            EventKind::Max(kind) => write!(f, "{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_kinds_have_distinct_indices() {
        let mut seen = std::collections::HashSet::new();
        for kind in CounterKind::ALL {
            assert!(seen.insert(counter_index(*kind)));
        }
    }

    #[test]
    fn max_kinds_have_distinct_indices() {
        let mut seen = std::collections::HashSet::new();
        for kind in MaxKind::ALL {
            assert!(seen.insert(max_index(*kind)));
        }
    }
}
