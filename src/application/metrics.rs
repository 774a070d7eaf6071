//! Observability metrics for the routing core and FFDC.
//!
//! All counters use atomic operations and can be read at any time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

macro_rules! counters {
    ($($field:ident => $record:ident, $doc:literal;)*) => {
        #[derive(Debug, Default)]
        struct MetricsInner {
            $(#[doc = $doc] $field: AtomicU64,)*
        }

        impl Metrics {
            $(
                #[doc = $doc]
                pub(crate) fn $record(&self) {
                    self.inner.$field.fetch_add(1, Ordering::Relaxed);
                }

                #[doc = $doc]
                pub fn $field(&self) -> u64 {
                    self.inner.$field.load(Ordering::Relaxed)
                }
            )*

            /// Get a snapshot of all metrics.
            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($field: self.$field(),)*
                }
            }

            /// Reset all metrics to zero.
            pub fn reset(&self) {
                $(self.inner.$field.store(0, Ordering::Relaxed);)*
            }
        }

        /// A point-in-time snapshot of metrics.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct MetricsSnapshot {
            $(#[doc = $doc] pub $field: u64,)*
        }
    };
}

/// Shared counters; clones observe the same values.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

counters! {
    messages_routed => record_message_routed, "Messages that reached normal delivery";
    messages_vetoed => record_message_vetoed, "Messages vetoed by a router";
    messages_hidden => record_message_hidden, "Messages redirected to trace by the hide list";
    traces_written => record_trace_written, "Records written to the trace writer";
    reentrant_dropped => record_reentrant_dropped, "Calls dropped by a reentrancy guard";
    router_failures => record_router_failure, "Router calls that failed or panicked";
    sink_failures => record_sink_failure, "Structured consumer publishes that failed";
    early_discarded => record_early_discarded, "Buffered early records discarded unadopted";
    incidents_created => record_incident_created, "Distinct incidents created";
    exceptions_processed => record_exception_processed, "Exceptions passed to FFDC";
    dumps_written => record_dump_written, "Incident files written";
    dumps_suppressed => record_dump_suppressed, "Occurrences that did not produce a file";
    incidents_evicted => record_incident_evicted, "Incidents evicted by the daily roll";
}

impl MetricsSnapshot {
    /// Ratio of vetoed messages to all routed messages (0.0 to 1.0).
    pub fn veto_rate(&self) -> f64 {
        let total = self.messages_routed.saturating_add(self.messages_vetoed);
        if total == 0 {
            0.0
        } else {
            self.messages_vetoed as f64 / total as f64
        }
    }
}
