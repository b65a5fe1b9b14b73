//! Performance metrics collection for tickdb
//!
//! This module provides functionality for collecting and exposing performance metrics
//! in Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the metrics collection system
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    // Create a Prometheus exporter
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Record a segment read off disk
pub fn record_segment_load(bytes: u64) {
    counter!("tickdb.segment.files_read").increment(1);
    counter!("tickdb.segment.bytes_read").increment(bytes);
}

/// Record partitions registered when opening a database root
pub fn record_partitions_loaded(count: u64) {
    counter!("tickdb.catalog.partitions_loaded").increment(count);
}

/// Record a query execution
pub fn record_query(duration_ms: f64) {
    counter!("tickdb.query.evaluated").increment(1);
    histogram!("tickdb.query.duration_ms").record(duration_ms);
}

/// Record a compute dispatch by evaluation path
pub fn record_compute(path: &str) {
    let metric_name = format!("tickdb.compute.{}", path);
    counter!(metric_name).increment(1);
}

/// Update executor memory accounting
pub fn update_memory_usage(bytes: u64) {
    gauge!("tickdb.executor.memory_bytes").set(bytes as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_safe() {
        // Without an installed recorder these are no-ops
        record_segment_load(128);
        record_partitions_loaded(3);
        record_query(1.5);
        record_compute("engine");
        update_memory_usage(4096);
    }
}
