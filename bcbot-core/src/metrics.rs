// ABOUTME: Prometheus metrics for tool calls, lifecycle transitions and event ingestion.
// ABOUTME: The recorder is installed once per process; recording is a no-op until then.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder, or return the one already installed
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    Ok(HANDLE.get_or_init(|| handle).clone())
}

/// Count a tool call by name and outcome ("ok" or an error kind)
pub fn record_tool_call(tool: &str, outcome: &str) {
    metrics::counter!(
        "bcbot_tool_calls_total",
        "tool" => tool.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count an adapter primitive invocation by operation and outcome
pub fn record_command(op: &'static str, outcome: &str) {
    metrics::counter!(
        "bcbot_commands_total",
        "op" => op,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_event_ingested(kind: &'static str) {
    metrics::counter!("bcbot_events_ingested_total", "kind" => kind).increment(1);
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("bcbot_session_transitions_total", "to" => to).increment(1);
}

pub fn set_retained_events(count: usize) {
    metrics::gauge!("bcbot_retained_events").set(count as f64);
}
