//! MongoDB `serverStatus` collection for the mongomon agent.
//!
//! A [`MetricSource`] fetches one status document per cycle and normalizes
//! it against a [`MetricCatalog`] into flat [`NormalizedMetrics`]. A
//! [`MetricCatalogProvider`] describes how the host should display those
//! metrics (grouping, units, counter semantics).

pub mod catalog;
pub mod document;
pub mod error;
pub mod extractor;
pub mod mongo;
pub mod normalizer;
pub mod sink;
pub mod source;

use async_trait::async_trait;
use catalog::{label_prefix, GraphSpec, MetricCatalog};
use mongo::MongoConnector;
use normalizer::{NormalizedMetrics, StatusNormalizer};
use sink::{DiagnosticSink, TracingSink};
use source::{ConnectionConfig, StatusConnector, StatusSource};
use std::sync::Arc;

/// Something the host can poll for metric values once per scheduling tick.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Collector name, used for logging.
    fn name(&self) -> &str;

    /// Run one collection cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the status document could not be obtained.
    /// Individual field failures never surface here.
    async fn fetch_metrics(&self) -> error::Result<NormalizedMetrics>;
}

/// Display metadata for the keys a [`MetricSource`] produces.
pub trait MetricCatalogProvider: Send + Sync {
    fn catalog(&self) -> &MetricCatalog;

    /// Configured key prefix; empty means the catalog default.
    fn key_prefix(&self) -> &str;

    fn graph_definitions(&self) -> GraphSpec {
        let prefix = self.key_prefix();
        self.catalog().graph_spec(prefix, &label_prefix(prefix))
    }
}

/// `serverStatus` collector: one [`StatusSource`] round trip normalized
/// through the MongoDB catalog.
pub struct MongoStatusCollector<C: StatusConnector = MongoConnector> {
    source: StatusSource<C>,
    normalizer: StatusNormalizer,
    catalog: MetricCatalog,
    key_prefix: String,
}

impl MongoStatusCollector<MongoConnector> {
    pub fn new(config: ConnectionConfig, key_prefix: &str) -> Self {
        Self::with_connector(MongoConnector, config, key_prefix, Arc::new(TracingSink))
    }
}

impl<C: StatusConnector> MongoStatusCollector<C> {
    pub fn with_connector(
        connector: C,
        config: ConnectionConfig,
        key_prefix: &str,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            source: StatusSource::new(connector, config, sink.clone()),
            normalizer: StatusNormalizer::new(sink),
            catalog: MetricCatalog::mongodb(),
            key_prefix: catalog::key_prefix_or_default(key_prefix).to_string(),
        }
    }

    pub fn source(&self) -> &StatusSource<C> {
        &self.source
    }
}

#[async_trait]
impl<C: StatusConnector> MetricSource for MongoStatusCollector<C> {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn fetch_metrics(&self) -> error::Result<NormalizedMetrics> {
        let document = self.source.fetch().await?;
        let metrics = self.normalizer.normalize(&document, &self.catalog);
        tracing::debug!(
            endpoint = %self.source.config().endpoint(),
            count = metrics.len(),
            "Collected serverStatus metrics"
        );
        Ok(metrics)
    }
}

impl<C: StatusConnector> MetricCatalogProvider for MongoStatusCollector<C> {
    fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}
