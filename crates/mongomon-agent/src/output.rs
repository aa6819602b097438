use crate::state::{counter_rate, SampleState};
use mongomon_collector::catalog::{GraphSpec, NumericWidth};
use mongomon_collector::normalizer::NormalizedMetrics;
use serde::Serialize;
use std::collections::BTreeMap;

/// Environment variable the monitoring agent sets to request graph metadata.
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

const META_HEADER: &str = "# mackerel-agent-plugin";

pub fn meta_requested() -> bool {
    std::env::var_os(META_ENV).is_some_and(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
struct PluginMeta<'a> {
    graphs: BTreeMap<String, GraphMeta<'a>>,
}

#[derive(Debug, Serialize)]
struct GraphMeta<'a> {
    label: &'a str,
    unit: &'a str,
    metrics: Vec<MetricMeta<'a>>,
}

#[derive(Debug, Serialize)]
struct MetricMeta<'a> {
    name: &'a str,
    label: &'a str,
    diff: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    value_type: Option<&'static str>,
}

/// Graph definitions in the agent's plugin-metadata format.
pub fn render_meta(spec: &GraphSpec) -> serde_json::Result<String> {
    let graphs = spec
        .graphs
        .iter()
        .map(|graph| {
            let metrics = graph
                .metrics
                .iter()
                .map(|metric| MetricMeta {
                    name: metric.output_key,
                    label: metric.label,
                    diff: metric.is_counter,
                    value_type: match metric.width {
                        NumericWidth::Default => None,
                        NumericWidth::Uint64 => Some(NumericWidth::Uint64.as_str()),
                    },
                })
                .collect();
            let meta = GraphMeta {
                label: &graph.label,
                unit: graph.unit,
                metrics,
            };
            (spec.qualified_graph_name(graph), meta)
        })
        .collect();

    let body = serde_json::to_string(&PluginMeta { graphs })?;
    Ok(format!("{META_HEADER}\n{body}"))
}

/// Turn one cycle's values into output lines and the state to persist.
///
/// Gauges are printed as-is. Counters are printed as per-minute rates against
/// `previous`; a counter with no usable previous sample is left out this
/// cycle but still recorded in the returned state.
pub fn render_values(
    spec: &GraphSpec,
    metrics: &NormalizedMetrics,
    previous: Option<&SampleState>,
    now: i64,
) -> (Vec<String>, SampleState) {
    let mut lines = Vec::new();
    let mut next = SampleState::new(now);
    for (key, value) in metrics.iter() {
        next.values.insert(key.to_string(), value);
    }

    for graph in &spec.graphs {
        for metric in &graph.metrics {
            let Some(current) = metrics.get(metric.output_key) else {
                continue;
            };

            let value = if metric.is_counter {
                let Some((state, last_value)) = previous.and_then(|state| {
                    state.values.get(metric.output_key).map(|v| (state, *v))
                }) else {
                    tracing::debug!(metric = metric.output_key, "No previous sample, skipping counter");
                    continue;
                };
                let last_diff = state.last_diffs.get(metric.output_key).copied().unwrap_or(0.0);
                match counter_rate(metric.width, current, last_value, now - state.time, last_diff) {
                    Ok(rate) => {
                        next.last_diffs.insert(metric.output_key.to_string(), rate);
                        rate
                    }
                    Err(e) => {
                        tracing::warn!(metric = metric.output_key, error = %e, "Skipping counter");
                        continue;
                    }
                }
            } else {
                current
            };

            lines.push(format!(
                "{}\t{value:.6}\t{now}",
                spec.qualified_metric_name(graph, metric)
            ));
        }
    }

    (lines, next)
}
