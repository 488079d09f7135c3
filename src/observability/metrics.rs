//! Metrics collection.
//!
//! # Metrics
//! - `routekit_transform_duration_seconds` (histogram): per module kind
//! - `routekit_transforms_total` (counter): by module kind and outcome
//! - `routekit_graph_modules` (gauge): modules tracked by the dependency graph
//! - `routekit_client_modules` (gauge): modules collected by the last build
//! - `routekit_port_retries_total` (counter): ports skipped because they were in use
//!
//! # Design Decisions
//! - Thin wrappers so call sites never spell metric names
//! - Labels are static strings only

use std::time::Instant;

pub fn record_transform(kind: &'static str, ok: bool, start: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("routekit_transforms_total", "kind" => kind, "outcome" => outcome).increment(1);
    metrics::histogram!("routekit_transform_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_graph_size(modules: usize) {
    metrics::gauge!("routekit_graph_modules").set(modules as f64);
}

pub fn record_client_modules(modules: usize) {
    metrics::gauge!("routekit_client_modules").set(modules as f64);
}

pub fn record_port_retry() {
    metrics::counter!("routekit_port_retries_total").increment(1);
}
