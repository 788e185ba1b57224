//! Metrics collection for store operations.
//!
//! Emits through the `metrics` facade; without an installed recorder every
//! call is a no-op.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names used by the store
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    /// Store operations, labelled by operation and status
    pub db_operations_total: &'static str,
    /// Store operation latency in seconds
    pub db_operation_duration: &'static str,
    /// Messages written (inserted or reassigned)
    pub messages_written_total: &'static str,
    /// Chunks produced for classification payloads
    pub chunks_produced_total: &'static str,
    /// Number of projects known to the store
    pub projects: &'static str,
    /// Errors, labelled by kind and operation
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            db_operations_total: "reminder_chat_db_operations_total",
            db_operation_duration: "reminder_chat_db_operation_duration_seconds",
            messages_written_total: "reminder_chat_messages_written_total",
            chunks_produced_total: "reminder_chat_chunks_produced_total",
            projects: "reminder_chat_projects",
            errors_total: "reminder_chat_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Record one store operation
    pub fn record_db_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(self.db_operations_total, "operation" => operation, "status" => status).increment(1);
        histogram!(self.db_operation_duration, "operation" => operation).record(duration.as_secs_f64());

        if !success {
            self.record_error("database", operation);
        }
    }

    /// Record messages written by an operation
    pub fn record_messages_written(&self, count: u64, operation: &'static str) {
        counter!(self.messages_written_total, "operation" => operation).increment(count);
    }

    /// Record chunks produced by the chunker
    pub fn record_chunks(&self, count: usize) {
        counter!(self.chunks_produced_total).increment(count as u64);
    }

    /// Update the project count gauge
    #[allow(clippy::cast_precision_loss)]
    pub fn set_project_count(&self, count: usize) {
        gauge!(self.projects).set(count as f64);
    }

    /// Record an error
    pub fn record_error(&self, kind: &'static str, operation: &'static str) {
        counter!(self.errors_total, "type" => kind, "operation" => operation).increment(1);
    }
}

/// Times an operation and reports it to a collector when finished
#[derive(Debug)]
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl MetricsTimer {
    /// Start timing `operation`
    #[must_use]
    pub fn new(collector: MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the outcome; returns the elapsed time
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        self.collector.record_db_operation(self.operation, duration, success);
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_names() {
        let collector = MetricsCollector::default();
        assert_eq!(collector.db_operations_total, "reminder_chat_db_operations_total");
        assert!(collector.errors_total.starts_with("reminder_chat_"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let collector = MetricsCollector::default();
        collector.record_db_operation("insert_message", Duration::from_millis(3), true);
        collector.record_db_operation("delete_message", Duration::from_millis(1), false);
        collector.record_messages_written(2, "insert_message");
        collector.record_chunks(4);
        collector.set_project_count(1);

        let timer = MetricsTimer::new(collector, "get_projects");
        assert!(timer.finish(true) < Duration::from_secs(5));
    }
}
