//! Aggregation types and per-category value aggregators
//!
//! The set of aggregation types is fixed and built once per process. Each
//! report pass asks a type for fresh [`ValueAggregator`]s, one per category
//! and column.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::core::script::evaluator::format_plain;
use crate::row::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Static,
}

/// A named aggregation type. Instances only exist inside the registry, so
/// they can be compared by reference or by kind.
#[derive(Debug, PartialEq, Eq)]
pub struct AggregationType {
    kind: AggregationKind,
    name: &'static str,
    label: &'static str,
}

struct Registry {
    types: Vec<AggregationType>,
    by_name: HashMap<&'static str, usize>,
    selectable: Vec<usize>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let types = vec![
        AggregationType::new(AggregationKind::Count, "count", "Count"),
        AggregationType::new(AggregationKind::Sum, "sum", "Sum"),
        AggregationType::new(AggregationKind::Max, "max", "Maximum"),
        AggregationType::new(AggregationKind::Min, "min", "Minimum"),
        AggregationType::new(AggregationKind::Avg, "avg", "Average"),
        AggregationType::new(AggregationKind::Static, "static", "Static"),
    ];
    let by_name = types
        .iter()
        .enumerate()
        .map(|(index, t)| (t.name, index))
        .collect::<HashMap<_, _>>();
    // count is not offered for selection
    let selectable = ["sum", "max", "min", "avg", "static"]
        .iter()
        .map(|name| by_name[name])
        .collect();

    Registry {
        types,
        by_name,
        selectable,
    }
});

static SELECTABLE: LazyLock<Vec<&'static AggregationType>> = LazyLock::new(|| {
    REGISTRY
        .selectable
        .iter()
        .map(|&index| &REGISTRY.types[index])
        .collect()
});

impl AggregationType {
    const fn new(kind: AggregationKind, name: &'static str, label: &'static str) -> Self {
        Self { kind, name, label }
    }

    /// Strict lookup by type name
    pub fn lookup(name: &str) -> Option<&'static AggregationType> {
        let registry: &'static Registry = &REGISTRY;
        registry
            .by_name
            .get(name.trim())
            .map(|&index| &registry.types[index])
    }

    /// Lookup by type name; unknown names resolve to sum
    pub fn for_name(name: &str) -> &'static AggregationType {
        Self::lookup(name).unwrap_or_else(|| {
            warn!(aggregation = name, "unknown aggregation type, using sum");
            Self::sum()
        })
    }

    pub fn of(kind: AggregationKind) -> &'static AggregationType {
        let registry: &'static Registry = &REGISTRY;
        registry
            .types
            .iter()
            .find(|t| t.kind == kind)
            .unwrap_or(&registry.types[0])
    }

    pub fn sum() -> &'static AggregationType {
        Self::of(AggregationKind::Sum)
    }

    pub fn count() -> &'static AggregationType {
        Self::of(AggregationKind::Count)
    }

    /// Types offered for user selection, in display order
    pub fn available_types() -> &'static [&'static AggregationType] {
        &SELECTABLE
    }

    /// Every registered type
    pub fn all() -> &'static [AggregationType] {
        &REGISTRY.types
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_sum(&self) -> bool {
        self.kind == AggregationKind::Sum
    }

    pub fn is_avg(&self) -> bool {
        self.kind == AggregationKind::Avg
    }

    pub fn is_min(&self) -> bool {
        self.kind == AggregationKind::Min
    }

    pub fn is_max(&self) -> bool {
        self.kind == AggregationKind::Max
    }

    pub fn is_count(&self) -> bool {
        self.kind == AggregationKind::Count
    }

    pub fn is_static(&self) -> bool {
        self.kind == AggregationKind::Static
    }

    pub fn create_value_aggregator(&self) -> ValueAggregator {
        let kind = match self.kind {
            AggregationKind::Sum => AggregatorKind::Sum,
            AggregationKind::Avg => AggregatorKind::Avg,
            AggregationKind::Min => AggregatorKind::Min,
            AggregationKind::Max => AggregatorKind::Max,
            AggregationKind::Count => AggregatorKind::Count,
            AggregationKind::Static => AggregatorKind::Static,
        };
        ValueAggregator::new(kind)
    }
}

impl std::fmt::Display for AggregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

pub const DEFAULT_DELIMITER: &str = ",";

#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    /// First added value wins
    Static,
    /// Joins text values
    Concatenate { delimiter: String },
}

/// Running accumulation of one column within one category
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAggregator {
    kind: AggregatorKind,
    double_value: f64,
    string_value: Option<String>,
    count: usize,
}

impl ValueAggregator {
    pub fn new(kind: AggregatorKind) -> Self {
        Self {
            kind,
            double_value: 0.0,
            string_value: None,
            count: 0,
        }
    }

    pub fn concatenate(delimiter: Option<&str>) -> Self {
        Self::new(AggregatorKind::Concatenate {
            delimiter: delimiter.unwrap_or(DEFAULT_DELIMITER).to_string(),
        })
    }

    /// Fresh zero-state aggregator of the same kind
    pub fn create_instance(&self) -> Self {
        Self::new(self.kind.clone())
    }

    pub fn kind(&self) -> &AggregatorKind {
        &self.kind
    }

    pub fn add_double_value(&mut self, value: f64) {
        match self.kind {
            AggregatorKind::Sum | AggregatorKind::Avg => self.double_value += value,
            AggregatorKind::Min => {
                if self.count == 0 || value < self.double_value {
                    self.double_value = value;
                }
            }
            AggregatorKind::Max => {
                if self.count == 0 || value > self.double_value {
                    self.double_value = value;
                }
            }
            AggregatorKind::Count => {}
            AggregatorKind::Static => {
                if self.count == 0 {
                    self.double_value = value;
                }
            }
            AggregatorKind::Concatenate { .. } => {
                self.append_text(&format_plain(value));
                return;
            }
        }
        self.count += 1;
    }

    pub fn add_string_value(&mut self, value: &str) {
        match self.kind {
            AggregatorKind::Sum | AggregatorKind::Avg | AggregatorKind::Min | AggregatorKind::Max => {
                self.add_double_value(parse_number(value));
            }
            AggregatorKind::Count => self.count += 1,
            AggregatorKind::Static => {
                if self.count == 0 {
                    self.double_value = parse_number(value);
                    self.string_value = Some(value.to_string());
                }
                self.count += 1;
            }
            AggregatorKind::Concatenate { .. } => self.append_text(value),
        }
    }

    fn append_text(&mut self, value: &str) {
        if let AggregatorKind::Concatenate { delimiter } = &self.kind {
            match &mut self.string_value {
                Some(joined) => {
                    joined.push_str(delimiter);
                    joined.push_str(value);
                }
                None => self.string_value = Some(value.to_string()),
            }
        }
        self.count += 1;
    }

    /// Running total (sum/avg), extreme (min/max) or first value (static)
    pub fn double_value(&self) -> f64 {
        self.double_value
    }

    pub fn string_value(&self) -> Option<&str> {
        self.string_value.as_deref()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Final numeric value: averages divide by the count, counts report it
    pub fn result_value(&self) -> f64 {
        match self.kind {
            AggregatorKind::Avg if self.count == 0 => 0.0,
            AggregatorKind::Avg => self.double_value / self.count as f64,
            AggregatorKind::Count => self.count as f64,
            _ => self.double_value,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, AggregatorKind::Concatenate { .. })
            || (self.kind == AggregatorKind::Static && self.string_value.is_some())
    }
}
