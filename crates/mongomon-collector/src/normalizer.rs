use crate::catalog::MetricCatalog;
use crate::document::StatusDocument;
use crate::extractor::resolve;
use crate::sink::{DiagnosticSink, TracingSink};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metric values of one collection cycle, keyed by output key.
///
/// Always holds exactly one entry per catalog definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMetrics(BTreeMap<String, f64>);

impl NormalizedMetrics {
    pub fn get(&self, output_key: &str) -> Option<f64> {
        self.0.get(output_key).copied()
    }

    pub fn contains_key(&self, output_key: &str) -> bool {
        self.0.contains_key(output_key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn into_inner(self) -> BTreeMap<String, f64> {
        self.0
    }
}

/// Applies a [`MetricCatalog`] to status documents.
pub struct StatusNormalizer {
    sink: Arc<dyn DiagnosticSink>,
}

impl StatusNormalizer {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Extract every catalog entry from `document`.
    ///
    /// Fields that cannot be resolved are reported to the sink and recorded
    /// as `0.0`, so the result always carries the full key set.
    pub fn normalize(&self, document: &StatusDocument, catalog: &MetricCatalog) -> NormalizedMetrics {
        let mut values = BTreeMap::new();
        for definition in catalog.entries() {
            let value = match resolve(document, &definition.path) {
                Ok(value) => value,
                Err(e) => {
                    self.sink.field_failed(definition, &e);
                    0.0
                }
            };
            values.insert(definition.output_key.to_string(), value);
        }
        NormalizedMetrics(values)
    }
}

impl Default for StatusNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
