//! In-memory evaluation of filter trees.
//!
//! Records expose their fields through [`FieldSource`]; `serde_json::Value`
//! implements it with dotted paths (`"address.city"`), so any `Serialize`
//! entity can be matched after `serde_json::to_value`.

use core::cmp::Ordering;

use serde_json::Value;
use sparks_core::{Connector, EntityFilter, FilterGroup, FilterOperator, FilterValue, PropertyFilter};

/// Field lookup used by the matcher.
pub trait FieldSource {
    /// The scalar or list value at `path`, or `None` if absent.
    fn field(&self, path: &str) -> Option<FilterValue>;
}

impl FieldSource for Value {
    fn field(&self, path: &str) -> Option<FilterValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        from_json(current)
    }
}

fn from_json(value: &Value) -> Option<FilterValue> {
    match value {
        Value::Null => Some(FilterValue::Null),
        Value::Bool(b) => Some(FilterValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FilterValue::Int)
            .or_else(|| n.as_f64().map(FilterValue::Float)),
        Value::String(s) => Some(FilterValue::Text(s.clone())),
        Value::Array(items) => Some(FilterValue::List(items.iter().filter_map(from_json).collect())),
        Value::Object(_) => None,
    }
}

/// Evaluate one filter node against `record`.
pub fn matches<R: FieldSource + ?Sized>(filter: &EntityFilter, record: &R) -> bool {
    match filter {
        EntityFilter::Property(leaf) => matches_property(leaf, record),
        EntityFilter::Group(group) => matches_group(group, record),
    }
}

/// Evaluate a group. An empty `AND` group matches everything; an empty `OR` group nothing.
pub fn matches_group<R: FieldSource + ?Sized>(group: &FilterGroup, record: &R) -> bool {
    let mut children = group.filters().iter();
    match group.connector() {
        Connector::And => children.all(|f| matches(f, record)),
        Connector::Or => children.any(|f| matches(f, record)),
    }
}

fn matches_property<R: FieldSource + ?Sized>(leaf: &PropertyFilter, record: &R) -> bool {
    // A missing field behaves like null.
    let actual = record.field(leaf.field()).unwrap_or(FilterValue::Null);
    let expected = leaf.value();

    // Null only satisfies an explicit null test, as with SQL `IS [NOT] NULL`.
    match (leaf.operator(), expected) {
        (FilterOperator::Equals, FilterValue::Null) => return actual == FilterValue::Null,
        (FilterOperator::NotEquals, FilterValue::Null) => return actual != FilterValue::Null,
        (FilterOperator::In, FilterValue::List(items)) if items.is_empty() => return false,
        (FilterOperator::NotIn, FilterValue::List(items)) if items.is_empty() => return true,
        _ if actual == FilterValue::Null => return false,
        _ => {}
    }

    match leaf.operator() {
        FilterOperator::Equals => values_equal(&actual, expected),
        FilterOperator::NotEquals => !values_equal(&actual, expected),
        FilterOperator::GreaterThan => compare(&actual, expected).is_some_and(Ordering::is_gt),
        FilterOperator::GreaterOrEquals => compare(&actual, expected).is_some_and(Ordering::is_ge),
        FilterOperator::LowerThan => compare(&actual, expected).is_some_and(Ordering::is_lt),
        FilterOperator::LowerOrEquals => compare(&actual, expected).is_some_and(Ordering::is_le),
        FilterOperator::Contains => match (&actual, expected) {
            (FilterValue::Text(haystack), FilterValue::Text(needle)) => haystack.contains(needle.as_str()),
            _ => false,
        },
        FilterOperator::In => in_list(&actual, expected),
        FilterOperator::NotIn => !in_list(&actual, expected),
    }
}

fn in_list(actual: &FilterValue, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::List(items) => items.iter().any(|item| values_equal(actual, item)),
        _ => false,
    }
}

/// Equality with integers and floats compared numerically.
fn values_equal(a: &FilterValue, b: &FilterValue) -> bool {
    match (a, b) {
        (FilterValue::Int(x), FilterValue::Float(y)) | (FilterValue::Float(y), FilterValue::Int(x)) => {
            compare_int_float(*x, *y) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Ordering between two numbers or two texts; `None` for any other pairing.
fn compare(a: &FilterValue, b: &FilterValue) -> Option<Ordering> {
    match (a, b) {
        (FilterValue::Int(x), FilterValue::Int(y)) => Some(x.cmp(y)),
        (FilterValue::Int(x), FilterValue::Float(y)) => compare_int_float(*x, *y),
        (FilterValue::Float(x), FilterValue::Int(y)) => compare_int_float(*y, *x).map(Ordering::reverse),
        (FilterValue::Float(x), FilterValue::Float(y)) => x.partial_cmp(y),
        (FilterValue::Text(x), FilterValue::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Exact `int <=> float`, without rounding the integer through `f64`.
fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, exactly representable.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return None;
    }
    if float >= BOUND {
        return Some(Ordering::Less);
    }
    if float < -BOUND {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    // In range, so the cast is exact.
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&float),
        unequal => Some(unequal),
    }
}

/// Total order used for sorting: null < booleans < numbers < text < lists.
pub(crate) fn sort_order(a: &FilterValue, b: &FilterValue) -> Ordering {
    fn rank(value: &FilterValue) -> u8 {
        match value {
            FilterValue::Null => 0,
            FilterValue::Bool(_) => 1,
            FilterValue::Int(_) | FilterValue::Float(_) => 2,
            FilterValue::Text(_) => 3,
            FilterValue::List(_) => 4,
        }
    }

    match (a, b) {
        (FilterValue::Bool(x), FilterValue::Bool(y)) => x.cmp(y),
        _ => compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b))),
    }
}
