//! Storage-independent filter tree used to describe CRUD queries.
//!
//! A filter is either a **leaf** (`PropertyFilter`: field, operator, value) or a
//! **group** (`FilterGroup`: connector + ordered children). Groups own their
//! children exclusively, so the tree is acyclic by construction.
//!
//! The tree performs no evaluation itself. Storage adapters walk it with a
//! structural recursion (`match EntityFilter { Property, Group }`):
//!
//! ```text
//! OR
//! ├─ status = "open"
//! └─ AND
//!    ├─ total > 100
//!    └─ region IN ("eu", "us")
//! ```
//!
//! ## Empty groups
//!
//! An empty `AND` group imposes no constraint and matches every record. An empty
//! `OR` group has no alternative that could hold and matches no record. Every
//! adapter in this workspace implements exactly these semantics.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Boolean connector joining the children of a group.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Comparison operator of a leaf filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEquals,
    LowerThan,
    LowerOrEquals,
    Contains,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::GreaterOrEquals => "greater_or_equals",
            FilterOperator::LowerThan => "lower_than",
            FilterOperator::LowerOrEquals => "lower_or_equals",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
        }
    }

    /// Whether this operator accepts `value` as its operand.
    fn accepts(self, value: &FilterValue) -> bool {
        match self {
            FilterOperator::Equals | FilterOperator::NotEquals => !value.is_list(),
            FilterOperator::GreaterThan
            | FilterOperator::GreaterOrEquals
            | FilterOperator::LowerThan
            | FilterOperator::LowerOrEquals => matches!(
                value,
                FilterValue::Int(_) | FilterValue::Float(_) | FilterValue::Text(_)
            ),
            FilterOperator::Contains => matches!(value, FilterValue::Text(_)),
            FilterOperator::In | FilterOperator::NotIn => match value {
                FilterValue::List(items) => items
                    .iter()
                    .all(|v| !v.is_list() && !matches!(v, FilterValue::Null)),
                _ => false,
            },
        }
    }
}

/// Operand of a leaf filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::Bool(_) => "boolean",
            FilterValue::Int(_) => "integer",
            FilterValue::Float(_) => "float",
            FilterValue::Text(_) => "text",
            FilterValue::List(_) => "list",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::List(_))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FilterValue::Null)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => f.write_str("null"),
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Int(i) => write!(f, "{i}"),
            FilterValue::Float(x) => write!(f, "{x}"),
            FilterValue::Text(s) => write!(f, "{s:?}"),
            FilterValue::List(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Leaf predicate: `field <operator> value`.
///
/// Construction validates that the operator accepts the value, so adapters can
/// translate any `PropertyFilter` without re-checking operand shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PropertyFilterRepr", into = "PropertyFilterRepr")]
pub struct PropertyFilter {
    field: String,
    operator: FilterOperator,
    value: FilterValue,
}

#[derive(Serialize, Deserialize)]
struct PropertyFilterRepr {
    field: String,
    operator: FilterOperator,
    value: FilterValue,
}

impl TryFrom<PropertyFilterRepr> for PropertyFilter {
    type Error = FilterError;

    fn try_from(repr: PropertyFilterRepr) -> Result<Self, Self::Error> {
        PropertyFilter::new(repr.field, repr.operator, repr.value)
    }
}

impl From<PropertyFilter> for PropertyFilterRepr {
    fn from(filter: PropertyFilter) -> Self {
        Self {
            field: filter.field,
            operator: filter.operator,
            value: filter.value,
        }
    }
}

impl PropertyFilter {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Result<Self, FilterError> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(FilterError::EmptyField);
        }
        let value = value.into();
        if !operator.accepts(&value) {
            return Err(FilterError::InvalidOperand {
                operator: operator.as_str(),
                value_kind: value.kind(),
            });
        }
        Ok(Self {
            field,
            operator,
            value,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

impl fmt::Display for PropertyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator.as_str(), self.value)
    }
}

/// Ordered, connector-joined group of child filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    connector: Connector,
    filters: Vec<EntityFilter>,
}

impl FilterGroup {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            filters: Vec::new(),
        }
    }

    /// Empty `AND` group (matches everything until constrained).
    pub fn all() -> Self {
        Self::new(Connector::And)
    }

    /// Empty `OR` group (matches nothing until an alternative is added).
    pub fn any() -> Self {
        Self::new(Connector::Or)
    }

    pub fn connector(&self) -> Connector {
        self.connector
    }

    pub fn set_connector(&mut self, connector: Connector) {
        self.connector = connector;
    }

    pub fn filters(&self) -> &[EntityFilter] {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Vec<EntityFilter>) {
        self.filters = filters;
    }

    pub fn into_filters(self) -> Vec<EntityFilter> {
        self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Append a child; declaration order is preserved.
    pub fn add_filter(&mut self, filter: impl Into<EntityFilter>) -> &mut Self {
        self.filters.push(filter.into());
        self
    }

    /// Builder-style `add_filter`.
    pub fn with(mut self, filter: impl Into<EntityFilter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Remove the most recently added child equal to `filter`.
    ///
    /// Returns `false` when no child matches. Removing the last equal occurrence
    /// makes `add_filter` followed by `remove_filter` an exact inverse.
    pub fn remove_filter(&mut self, filter: &EntityFilter) -> bool {
        match self.filters.iter().rposition(|f| f == filter) {
            Some(idx) => {
                self.filters.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Depth of the subtree rooted at this group (an empty group has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.filters.iter().map(EntityFilter::depth).max().unwrap_or(0)
    }
}

impl fmt::Display for FilterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, child) in self.filters.iter().enumerate() {
            if idx > 0 {
                write!(f, " {} ", self.connector.as_str())?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityFilter {
    Property(PropertyFilter),
    Group(FilterGroup),
}

impl EntityFilter {
    /// Shorthand for a validated leaf node.
    pub fn property(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Result<Self, FilterError> {
        PropertyFilter::new(field, operator, value).map(EntityFilter::Property)
    }

    pub fn depth(&self) -> usize {
        match self {
            EntityFilter::Property(_) => 1,
            EntityFilter::Group(group) => group.depth(),
        }
    }
}

impl From<PropertyFilter> for EntityFilter {
    fn from(filter: PropertyFilter) -> Self {
        EntityFilter::Property(filter)
    }
}

impl From<FilterGroup> for EntityFilter {
    fn from(group: FilterGroup) -> Self {
        EntityFilter::Group(group)
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityFilter::Property(p) => write!(f, "{p}"),
            EntityFilter::Group(g) => write!(f, "{g}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(field: &str, op: FilterOperator, value: impl Into<FilterValue>) -> EntityFilter {
        EntityFilter::property(field, op, value).unwrap()
    }

    #[test]
    fn new_group_defaults_to_empty_and() {
        let group = FilterGroup::default();
        assert_eq!(group.connector(), Connector::And);
        assert!(group.is_empty());
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn add_filter_preserves_declaration_order() {
        let mut group = FilterGroup::any();
        group
            .add_filter(leaf("a", FilterOperator::Equals, 1))
            .add_filter(leaf("b", FilterOperator::Equals, 2))
            .add_filter(leaf("c", FilterOperator::Equals, 3));

        let fields: Vec<_> = group
            .filters()
            .iter()
            .map(|f| match f {
                EntityFilter::Property(p) => p.field().to_string(),
                EntityFilter::Group(_) => unreachable!(),
            })
            .collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_filter_reports_missing_child() {
        let mut group = FilterGroup::all().with(leaf("a", FilterOperator::Equals, 1));
        assert!(!group.remove_filter(&leaf("a", FilterOperator::Equals, 2)));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn remove_filter_drops_latest_duplicate() {
        let a = leaf("a", FilterOperator::Equals, 1);
        let b = leaf("b", FilterOperator::Equals, 2);
        let before = FilterGroup::all().with(a.clone()).with(b.clone());

        let mut group = before.clone();
        group.add_filter(a.clone());
        assert!(group.remove_filter(&a));
        assert_eq!(group, before);
    }

    #[test]
    fn operators_reject_incompatible_values() {
        let err = PropertyFilter::new("age", FilterOperator::GreaterThan, true).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidOperand {
                operator: "greater_than",
                value_kind: "boolean"
            }
        );

        assert!(PropertyFilter::new("name", FilterOperator::Contains, 3).is_err());
        assert!(PropertyFilter::new("id", FilterOperator::In, 3).is_err());
        assert!(PropertyFilter::new("id", FilterOperator::Equals, vec![1, 2]).is_err());
        assert!(
            PropertyFilter::new(
                "id",
                FilterOperator::In,
                FilterValue::List(vec![FilterValue::List(vec![])])
            )
            .is_err()
        );
        assert_eq!(
            PropertyFilter::new("  ", FilterOperator::Equals, 1).unwrap_err(),
            FilterError::EmptyField
        );
    }

    #[test]
    fn null_equality_is_valid() {
        let filter = PropertyFilter::new("deleted_at", FilterOperator::Equals, FilterValue::Null);
        assert!(filter.is_ok());
    }

    #[test]
    fn depth_counts_nested_groups() {
        let tree = FilterGroup::any()
            .with(leaf("a", FilterOperator::Equals, 1))
            .with(
                FilterGroup::all()
                    .with(leaf("b", FilterOperator::Equals, 2))
                    .with(leaf("c", FilterOperator::Equals, 3)),
            );
        assert_eq!(tree.depth(), 3);
        assert_eq!(FilterGroup::all().depth(), 1);
    }

    #[test]
    fn display_keeps_grouping() {
        let tree = FilterGroup::any()
            .with(leaf("a", FilterOperator::Equals, 1))
            .with(
                FilterGroup::all()
                    .with(leaf("b", FilterOperator::GreaterThan, 2))
                    .with(leaf("c", FilterOperator::In, vec!["x", "y"])),
            );
        assert_eq!(
            tree.to_string(),
            r#"(a equals 1 OR (b greater_than 2 AND c in ("x", "y")))"#
        );
    }

    #[test]
    fn json_shape_is_tagged_by_kind() {
        let tree: EntityFilter = FilterGroup::all()
            .with(leaf("name", FilterOperator::Equals, "ada"))
            .into();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "group",
                "connector": "AND",
                "filters": [
                    {"kind": "property", "field": "name", "operator": "equals", "value": "ada"}
                ]
            })
        );

        let back: EntityFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn deserializing_rejects_invalid_leaf() {
        let json = serde_json::json!({
            "kind": "property", "field": "age", "operator": "in", "value": 4
        });
        assert!(serde_json::from_value::<EntityFilter>(json).is_err());
    }

    fn arb_leaf() -> impl Strategy<Value = EntityFilter> {
        ("[a-z]{1,8}", any::<i64>()).prop_map(|(field, v)| {
            EntityFilter::property(field, FilterOperator::Equals, v).unwrap()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: adding a leaf and removing it again restores the group exactly.
        #[test]
        fn add_then_remove_restores_group(
            existing in prop::collection::vec(arb_leaf(), 0..6),
            extra in arb_leaf(),
            or_connector in any::<bool>(),
        ) {
            let connector = if or_connector { Connector::Or } else { Connector::And };
            let mut group = FilterGroup::new(connector);
            group.set_filters(existing);
            let before = group.clone();

            group.add_filter(extra.clone());
            prop_assert!(!group.is_empty());
            prop_assert!(group.remove_filter(&extra));

            prop_assert_eq!(group.is_empty(), before.is_empty());
            prop_assert_eq!(group, before);
        }
    }
}
