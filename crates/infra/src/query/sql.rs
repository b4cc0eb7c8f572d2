//! Translation of filter trees into parameterised SQL.
//!
//! Values are never inlined into the statement text: every operand becomes a
//! bind parameter, in the order its placeholder appears.
//!
//! | Filter | SQL |
//! |--------|-----|
//! | empty `AND` group | `1 = 1` |
//! | empty `OR` group | `1 = 0` |
//! | `field = null` / `field != null` | `field IS NULL` / `field IS NOT NULL` |
//! | `field contains "x"` | `field LIKE '%x%' ESCAPE '\'` (wildcards in `x` escaped) |
//! | `field in []` / `field not_in []` | `1 = 0` / `1 = 1` |
//!
//! Comparisons keep SQL's null semantics: `owner <> ?` excludes rows whose
//! `owner` is null. `matcher` evaluates trees the same way.

use sparks_commands::RetrieveEntitiesCommand;
use sparks_core::{Connector, Entity, EntityFilter, FilterGroup, FilterOperator, FilterValue, PropertyFilter};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("invalid SQL identifier \"{0}\"")]
    InvalidIdentifier(String),
}

/// Bind parameter syntax of the target database.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` (SQLite, MySQL)
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
}

/// Largest row count accepted by both SQLite (signed 64-bit) and MySQL.
pub const UNBOUNDED_LIMIT: i64 = i64::MAX;

/// Backend-neutral predicate tree produced from a filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlPredicate {
    Always,
    Never,
    Compare {
        column: String,
        operator: &'static str,
        value: FilterValue,
    },
    Like {
        column: String,
        pattern: String,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    InList {
        column: String,
        values: Vec<FilterValue>,
        negated: bool,
    },
    Group {
        connector: Connector,
        parts: Vec<SqlPredicate>,
    },
}

impl SqlPredicate {
    fn render(&self, placeholder: Placeholder, text: &mut String, params: &mut Vec<FilterValue>) {
        match self {
            SqlPredicate::Always => text.push_str("1 = 1"),
            SqlPredicate::Never => text.push_str("1 = 0"),
            SqlPredicate::Compare {
                column,
                operator,
                value,
            } => {
                text.push_str(&format!("{column} {operator} "));
                push_param(placeholder, text, params, value.clone());
            }
            SqlPredicate::Like { column, pattern } => {
                text.push_str(&format!("{column} LIKE "));
                push_param(placeholder, text, params, FilterValue::Text(pattern.clone()));
                text.push_str(" ESCAPE '\\'");
            }
            SqlPredicate::IsNull { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                text.push_str(&format!("{column} IS{not} NULL"));
            }
            SqlPredicate::InList {
                column,
                values,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                text.push_str(&format!("{column}{not} IN ("));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    push_param(placeholder, text, params, value.clone());
                }
                text.push(')');
            }
            SqlPredicate::Group { connector, parts } => {
                text.push('(');
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        text.push_str(&format!(" {} ", connector.as_str()));
                    }
                    part.render(placeholder, text, params);
                }
                text.push(')');
            }
        }
    }
}

fn push_param(placeholder: Placeholder, text: &mut String, params: &mut Vec<FilterValue>, value: FilterValue) {
    params.push(value);
    match placeholder {
        Placeholder::Question => text.push('?'),
        Placeholder::Dollar => text.push_str(&format!("${}", params.len())),
    }
}

/// A rendered `WHERE` condition (without the keyword) and its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlWhere {
    pub predicate: SqlPredicate,
    pub text: String,
    pub params: Vec<FilterValue>,
}

/// A complete statement and its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<FilterValue>,
}

/// Builds SQL from filter trees and retrieve commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlQueryBuilder {
    placeholder: Placeholder,
}

impl SqlQueryBuilder {
    pub fn new(placeholder: Placeholder) -> Self {
        Self { placeholder }
    }

    /// Translate a filter tree into a predicate without rendering it.
    pub fn predicate(&self, group: &FilterGroup) -> Result<SqlPredicate, SqlError> {
        translate_group(group)
    }

    pub fn translate(&self, group: &FilterGroup) -> Result<SqlWhere, SqlError> {
        let predicate = translate_group(group)?;
        let mut text = String::new();
        let mut params = Vec::new();
        predicate.render(self.placeholder, &mut text, &mut params);
        Ok(SqlWhere {
            predicate,
            text,
            params,
        })
    }

    /// `SELECT * FROM <resource> WHERE ... [ORDER BY ...] [LIMIT n] [OFFSET n]`.
    pub fn select<E: Entity>(&self, command: &RetrieveEntitiesCommand<E>) -> Result<SqlStatement, SqlError> {
        let table = identifier(E::RESOURCE)?;
        let condition = self.translate(&command.filters)?;

        let mut text = format!("SELECT * FROM {table} WHERE {}", condition.text);

        if !command.sorters.is_empty() {
            let order = command
                .sorters
                .iter()
                .map(|sorter| -> Result<String, SqlError> {
                    Ok(format!("{} {}", identifier(&sorter.field)?, sorter.direction.as_str()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            text.push_str(" ORDER BY ");
            text.push_str(&order.join(", "));
        }
        match (command.limit, self.placeholder) {
            (Some(limit), _) => text.push_str(&format!(" LIMIT {limit}")),
            // SQLite and MySQL reject `OFFSET` without `LIMIT`.
            (None, Placeholder::Question) if command.offset > 0 => {
                text.push_str(&format!(" LIMIT {UNBOUNDED_LIMIT}"));
            }
            (None, _) => {}
        }
        if command.offset > 0 {
            text.push_str(&format!(" OFFSET {}", command.offset));
        }

        Ok(SqlStatement {
            text,
            params: condition.params,
        })
    }
}

fn translate_group(group: &FilterGroup) -> Result<SqlPredicate, SqlError> {
    if group.is_empty() {
        return Ok(match group.connector() {
            Connector::And => SqlPredicate::Always,
            Connector::Or => SqlPredicate::Never,
        });
    }
    let parts = group
        .filters()
        .iter()
        .map(translate_filter)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SqlPredicate::Group {
        connector: group.connector(),
        parts,
    })
}

fn translate_filter(filter: &EntityFilter) -> Result<SqlPredicate, SqlError> {
    match filter {
        EntityFilter::Property(leaf) => translate_property(leaf),
        EntityFilter::Group(group) => translate_group(group),
    }
}

fn translate_property(leaf: &PropertyFilter) -> Result<SqlPredicate, SqlError> {
    let column = identifier(leaf.field())?.to_string();
    let value = leaf.value();

    let predicate = match (leaf.operator(), value) {
        (FilterOperator::Equals, FilterValue::Null) => SqlPredicate::IsNull {
            column,
            negated: false,
        },
        (FilterOperator::NotEquals, FilterValue::Null) => SqlPredicate::IsNull {
            column,
            negated: true,
        },
        (FilterOperator::Contains, FilterValue::Text(needle)) => SqlPredicate::Like {
            column,
            pattern: format!("%{}%", escape_like(needle)),
        },
        (FilterOperator::In, FilterValue::List(values)) if values.is_empty() => SqlPredicate::Never,
        (FilterOperator::NotIn, FilterValue::List(values)) if values.is_empty() => SqlPredicate::Always,
        (FilterOperator::In | FilterOperator::NotIn, FilterValue::List(values)) => SqlPredicate::InList {
            column,
            values: values.clone(),
            negated: leaf.operator() == FilterOperator::NotIn,
        },
        (operator, value) => SqlPredicate::Compare {
            column,
            operator: comparison(operator),
            value: value.clone(),
        },
    };
    Ok(predicate)
}

fn comparison(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Equals => "=",
        FilterOperator::NotEquals => "<>",
        FilterOperator::GreaterThan => ">",
        FilterOperator::GreaterOrEquals => ">=",
        FilterOperator::LowerThan => "<",
        FilterOperator::LowerOrEquals => "<=",
        // Remaining operators are handled structurally; validated filters never reach here.
        FilterOperator::Contains => "LIKE",
        FilterOperator::In => "IN",
        FilterOperator::NotIn => "NOT IN",
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Accept `[A-Za-z_][A-Za-z0-9_.]*` only.
fn identifier(name: &str) -> Result<&str, SqlError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(name)
    } else {
        Err(SqlError::InvalidIdentifier(name.to_string()))
    }
}
