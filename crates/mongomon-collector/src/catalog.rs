//! Static description of the metrics pulled out of `serverStatus`.
//!
//! Each [`MetricDefinition`] ties a stable output key to the location of its
//! value in the status document and to the metadata a monitoring backend
//! needs to draw it (group, label, unit, counter semantics).

use std::fmt;

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "mongodb";

const PRODUCT_NAME: &str = "MongoDB";

/// Location of a scalar inside a status document, e.g. `opcounters.insert`.
///
/// Always holds at least one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPath {
    parents: &'static [&'static str],
    leaf: &'static str,
}

impl MetricPath {
    /// # Panics
    ///
    /// Panics if `keys` is empty. In a `const`/`static` context this is a
    /// compile error.
    pub const fn new(keys: &'static [&'static str]) -> Self {
        match keys {
            [parents @ .., leaf] => Self {
                parents,
                leaf: *leaf,
            },
            [] => panic!("metric path must not be empty"),
        }
    }

    /// Keys that must resolve to nested mappings.
    pub fn parents(&self) -> &'static [&'static str] {
        self.parents
    }

    /// Key holding the scalar value.
    pub fn leaf(&self) -> &'static str {
        self.leaf
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        self.parents.iter().copied().chain(std::iter::once(self.leaf))
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for parent in self.parents {
            write!(f, "{parent}.")?;
        }
        f.write_str(self.leaf)
    }
}

/// How a downstream consumer should interpret the raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericWidth {
    /// 64-bit float.
    #[default]
    Default,
    /// Unsigned 64-bit counter; wraparound is tolerated when differencing.
    Uint64,
}

impl NumericWidth {
    pub fn as_str(self) -> &'static str {
        match self {
            NumericWidth::Default => "float64",
            NumericWidth::Uint64 => "uint64",
        }
    }
}

/// A display group, e.g. all `opcounters` on one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricGroup {
    pub name: &'static str,
    /// Appended to the display prefix to form the graph label.
    pub label_suffix: &'static str,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub output_key: &'static str,
    pub path: MetricPath,
    pub group: &'static str,
    pub label: &'static str,
    /// Monotonic counter that must be differenced into a rate.
    pub is_counter: bool,
    pub width: NumericWidth,
}

impl MetricDefinition {
    const fn gauge(
        output_key: &'static str,
        path: &'static [&'static str],
        group: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            output_key,
            path: MetricPath::new(path),
            group,
            label,
            is_counter: false,
            width: NumericWidth::Default,
        }
    }

    const fn counter(
        output_key: &'static str,
        path: &'static [&'static str],
        group: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            output_key,
            path: MetricPath::new(path),
            group,
            label,
            is_counter: true,
            width: NumericWidth::Uint64,
        }
    }
}

// serverStatus layout of MongoDB 3.2 and later.
static MONGODB_GROUPS: [MetricGroup; 2] = [
    MetricGroup {
        name: "connections",
        label_suffix: "Connections",
        unit: "integer",
    },
    MetricGroup {
        name: "opcounters",
        label_suffix: "opcounters",
        unit: "integer",
    },
];

static MONGODB_METRICS: [MetricDefinition; 7] = [
    MetricDefinition::gauge(
        "connections_current",
        &["connections", "current"],
        "connections",
        "current",
    ),
    MetricDefinition::counter("opcounters_insert", &["opcounters", "insert"], "opcounters", "Insert"),
    MetricDefinition::counter("opcounters_query", &["opcounters", "query"], "opcounters", "Query"),
    MetricDefinition::counter("opcounters_update", &["opcounters", "update"], "opcounters", "Update"),
    MetricDefinition::counter("opcounters_delete", &["opcounters", "delete"], "opcounters", "Delete"),
    MetricDefinition::counter(
        "opcounters_getmore",
        &["opcounters", "getmore"],
        "opcounters",
        "Getmore",
    ),
    MetricDefinition::counter(
        "opcounters_command",
        &["opcounters", "command"],
        "opcounters",
        "Command",
    ),
];

/// Fixed table of metric definitions and their display groups.
#[derive(Debug, Clone, Copy)]
pub struct MetricCatalog {
    groups: &'static [MetricGroup],
    entries: &'static [MetricDefinition],
}

impl MetricCatalog {
    pub const fn new(groups: &'static [MetricGroup], entries: &'static [MetricDefinition]) -> Self {
        Self { groups, entries }
    }

    /// The catalog for `serverStatus` of MongoDB 3.2+.
    pub fn mongodb() -> Self {
        Self::new(&MONGODB_GROUPS, &MONGODB_METRICS)
    }

    pub fn entries(&self) -> &'static [MetricDefinition] {
        self.entries
    }

    pub fn groups(&self) -> &'static [MetricGroup] {
        self.groups
    }

    pub fn get(&self, output_key: &str) -> Option<&'static MetricDefinition> {
        self.entries.iter().find(|def| def.output_key == output_key)
    }

    /// Build graph metadata for the given key prefix and display prefix.
    ///
    /// Groups keep catalog order and metrics keep their order within a group.
    /// Groups with no metrics are omitted.
    pub fn graph_spec(&self, key_prefix: &str, display_prefix: &str) -> GraphSpec {
        let graphs = self
            .groups
            .iter()
            .filter_map(|group| {
                let metrics: Vec<GraphMetric> = self
                    .entries
                    .iter()
                    .filter(|def| def.group == group.name)
                    .map(|def| GraphMetric {
                        output_key: def.output_key,
                        label: def.label,
                        is_counter: def.is_counter,
                        width: def.width,
                    })
                    .collect();
                if metrics.is_empty() {
                    return None;
                }
                Some(GraphDefinition {
                    name: group.name,
                    label: format!("{display_prefix} {}", group.label_suffix),
                    unit: group.unit,
                    metrics,
                })
            })
            .collect();

        GraphSpec {
            key_prefix: key_prefix_or_default(key_prefix).to_string(),
            graphs,
        }
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::mongodb()
    }
}

/// Graph metadata handed to the monitoring host.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSpec {
    pub key_prefix: String,
    pub graphs: Vec<GraphDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphDefinition {
    pub name: &'static str,
    pub label: String,
    pub unit: &'static str,
    pub metrics: Vec<GraphMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphMetric {
    pub output_key: &'static str,
    pub label: &'static str,
    pub is_counter: bool,
    pub width: NumericWidth,
}

impl GraphSpec {
    pub fn graph(&self, name: &str) -> Option<&GraphDefinition> {
        self.graphs.iter().find(|graph| graph.name == name)
    }

    /// `<prefix>.<group>`, the name a graph is registered under.
    pub fn qualified_graph_name(&self, graph: &GraphDefinition) -> String {
        format!("{}.{}", self.key_prefix, graph.name)
    }

    /// `<prefix>.<group>.<output_key>`, the name a value is emitted under.
    pub fn qualified_metric_name(&self, graph: &GraphDefinition, metric: &GraphMetric) -> String {
        format!("{}.{}.{}", self.key_prefix, graph.name, metric.output_key)
    }
}

pub fn key_prefix_or_default(key_prefix: &str) -> &str {
    if key_prefix.is_empty() {
        DEFAULT_KEY_PREFIX
    } else {
        key_prefix
    }
}

/// Human-readable label derived from a key prefix.
///
/// `mongodb` becomes `MongoDB`; any other prefix keeps its text with each
/// word's first letter upper-cased (`custommongo` -> `Custommongo`,
/// `shard-mongodb` -> `Shard-MongoDB`).
pub fn label_prefix(key_prefix: &str) -> String {
    let replaced = key_prefix_or_default(key_prefix).replace(DEFAULT_KEY_PREFIX, PRODUCT_NAME);
    title_case(&replaced)
}

// Upper-cases the first letter of every word, leaves other letters alone.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || matches!(c, '_' | '.' | '\''));
    }
    out
}
