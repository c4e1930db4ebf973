//! Capture of metrics emitted by `wirestream` helpers.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// A local debugging recorder with lookups by metric name.
pub struct MetricsCapture {
    recorder: DebuggingRecorder,
    snapshotter: Snapshotter,
}

impl Default for MetricsCapture {
    fn default() -> Self { Self::new() }
}

impl MetricsCapture {
    /// Fresh recorder with nothing captured.
    #[must_use]
    pub fn new() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        Self {
            recorder,
            snapshotter,
        }
    }

    /// Run `f` with this recorder installed on the current thread.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&self.recorder, f)
    }

    /// Total of counter `name`, or zero if it was never touched.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.values(name)
            .into_iter()
            .map(|value| match value {
                DebugValue::Counter(count) => count,
                _ => 0,
            })
            .sum()
    }

    /// Current value of gauge `name`, if it was ever set.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.values(name).into_iter().find_map(|value| match value {
            DebugValue::Gauge(gauge) => Some(gauge.into_inner()),
            _ => None,
        })
    }

    fn values(&self, name: &str) -> Vec<DebugValue> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| value)
            .collect()
    }
}
