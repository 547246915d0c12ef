//! Clause module: renders a filter list as a parameterized query clause.
//!
//! Every leaf becomes `<column> <op> @<field>` and the value for each
//! placeholder is written onto a fresh instance of the record type, ready to
//! be bound by whatever executes the query. Nothing is executed here.

use crate::filter::{Comparison, FilterNode};
use crate::reduce::{leaf_constant, reduce, Junction, TOP_LEVEL};
use crate::schema::Record;
use crate::FilterError;
use serde::{Serialize, Deserialize};
use std::fmt;
use tracing::{debug, warn};

/// Rendering options for generated clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClauseOptions {
    /// Prepended to every placeholder name.
    pub placeholder_prefix: String,
    /// Table alias used to qualify column names, as in `t.id`.
    pub qualifier: Option<String>,
}

impl Default for ClauseOptions {
    fn default() -> Self {
        Self {
            placeholder_prefix: "@".to_string(),
            qualifier: None,
        }
    }
}

impl Comparison {
    /// The query operator for this comparison.
    pub fn operator_token(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "<>",
            Comparison::LessThan => "<",
            Comparison::LessThanOrEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanOrEqual => ">=",
            Comparison::Contains => "LIKE",
        }
    }
}

/// A clause expression; leaves hold already rendered conditions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClauseExpr {
    Leaf(String),
    And(Box<ClauseExpr>, Box<ClauseExpr>),
    Or(Box<ClauseExpr>, Box<ClauseExpr>),
}

impl Junction for ClauseExpr {
    fn and(self, rhs: Self) -> Self {
        ClauseExpr::And(Box::new(self), Box::new(rhs))
    }

    fn or(self, rhs: Self) -> Self {
        ClauseExpr::Or(Box::new(self), Box::new(rhs))
    }
}

impl fmt::Display for ClauseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseExpr::Leaf(cond) => f.write_str(cond),
            ClauseExpr::And(l, r) => write!(f, "({} AND {})", l, r),
            ClauseExpr::Or(l, r) => write!(f, "({} OR {})", l, r),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryClauseGenerator {
    options: ClauseOptions,
}

impl QueryClauseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClauseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClauseOptions {
        &self.options
    }

    /// Generates the clause text and the value-holder for `T`.
    ///
    /// Unlike predicate compilation, a field missing from `T` is an error:
    /// there would be nowhere to put its value. A field named by two leaves
    /// is an error too, since the value-holder has room for one value.
    pub fn generate<T: Record + Default>(&self, nodes: &[FilterNode]) -> Result<QueryClause<T>, FilterError> {
        let schema = T::schema();
        debug!(record = schema.record_name(), nodes = nodes.len(), "generating query clause");

        let mut values = T::default();
        let mut parameters: Vec<String> = Vec::with_capacity(nodes.len());
        let mut atom = |node: &FilterNode| -> Result<Option<ClauseExpr>, FilterError> {
            let field = schema.resolve(node.field()).ok_or_else(|| FilterError::UnresolvedField {
                field: node.field().to_string(),
                record: schema.record_name(),
            })?;
            if parameters.iter().any(|p| p == field.name()) {
                warn!(field = field.name(), "field appears twice in query clause");
                return Err(FilterError::DuplicatePlaceholder {
                    field: field.name().to_string(),
                });
            }
            let constant = leaf_constant(node, field)?;
            field
                .write(&mut values, constant)
                .map_err(|source| FilterError::Conversion {
                    field: node.field().to_string(),
                    source,
                })?;
            parameters.push(field.name().to_string());
            Ok(Some(ClauseExpr::Leaf(self.condition(field.name(), node.comparison()))))
        };
        let expr = reduce(nodes, TOP_LEVEL, &mut atom)?;

        let text = expr.to_string();
        debug!(text = %text, "query clause generated");
        Ok(QueryClause { text, values, parameters })
    }

    fn condition(&self, field: &str, comparison: Comparison) -> String {
        let column = match &self.options.qualifier {
            Some(q) => format!("{}.{}", q, field),
            None => field.to_string(),
        };
        format!(
            "{} {} {}{}",
            column,
            comparison.operator_token(),
            self.options.placeholder_prefix,
            field
        )
    }
}

/// Clause text plus the record instance carrying the placeholder values.
#[derive(Debug, Clone)]
pub struct QueryClause<T> {
    text: String,
    values: T,
    parameters: Vec<String>,
}

impl<T> QueryClause<T> {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The value-holder; each placeholder name is a field on it.
    pub fn values(&self) -> &T {
        &self.values
    }

    /// Placeholder names in leaf order, without the prefix.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn into_parts(self) -> (String, T) {
        (self.text, self.values)
    }
}

impl<T> fmt::Display for QueryClause<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::impl_record;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: u32,
        customer: String,
        total: f64,
        shipped: bool,
    }

    impl_record!(Order { id, customer, total, shipped });

    #[test]
    fn test_operator_tokens() {
        assert_eq!(Comparison::Equal.operator_token(), "=");
        assert_eq!(Comparison::NotEqual.operator_token(), "<>");
        assert_eq!(Comparison::LessThan.operator_token(), "<");
        assert_eq!(Comparison::LessThanOrEqual.operator_token(), "<=");
        assert_eq!(Comparison::GreaterThan.operator_token(), ">");
        assert_eq!(Comparison::GreaterThanOrEqual.operator_token(), ">=");
        assert_eq!(Comparison::Contains.operator_token(), "LIKE");
    }

    #[test]
    fn test_single_leaf() {
        let clause = Filter::with("id", Comparison::Equal, 9).query_clause::<Order>().unwrap();
        assert_eq!(clause.text(), "id = @id");
        assert_eq!(clause.values().id, 9);
        assert_eq!(clause.parameters(), ["id".to_string()]);
    }

    #[test]
    fn test_grouping_follows_reduction() {
        let mut filter = Filter::new();
        filter.add("customer", Comparison::Contains, "%acme%");
        filter.add("total", Comparison::GreaterThanOrEqual, "100.5");
        filter.or("shipped", Comparison::Equal, false);
        filter.add("id", Comparison::NotEqual, 0);
        let clause = filter.query_clause::<Order>().unwrap();
        assert_eq!(
            clause.text(),
            "(((customer LIKE @customer AND total >= @total) OR shipped = @shipped) AND id <> @id)"
        );
        assert_eq!(
            clause.values(),
            &Order { id: 0, customer: "%acme%".into(), total: 100.5, shipped: false }
        );
    }

    #[test]
    fn test_children_render_as_or_group() {
        let mut filter = Filter::new();
        filter
            .add("id", Comparison::LessThan, 10)
            .add("customer", Comparison::Equal, "vip");
        let clause = filter.query_clause::<Order>().unwrap();
        assert_eq!(clause.text(), "(id < @id OR customer = @customer)");
    }

    #[test]
    fn test_options_prefix_and_qualifier() {
        let generator = QueryClauseGenerator::with_options(ClauseOptions {
            placeholder_prefix: ":".to_string(),
            qualifier: Some("o".to_string()),
        });
        let filter = Filter::with("total", Comparison::LessThan, 20);
        let clause = generator.generate::<Order>(filter.nodes()).unwrap();
        assert_eq!(clause.text(), "o.total < :total");
        assert_eq!(clause.values().total, 20.0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ClauseOptions = serde_json::from_str(r#"{"qualifier":"t"}"#).unwrap();
        assert_eq!(options.placeholder_prefix, "@");
        assert_eq!(options.qualifier.as_deref(), Some("t"));
    }

    #[test]
    fn test_unresolved_field_is_terminal() {
        let mut filter = Filter::new();
        filter.add("id", Comparison::Equal, 1);
        filter.add("colour", Comparison::Equal, "red");
        match filter.query_clause::<Order>() {
            Err(FilterError::UnresolvedField { field, record }) => {
                assert_eq!(field, "colour");
                assert!(record.ends_with("Order"));
            }
            other => panic!("unexpected {:?}", other.map(|c| c.text().to_string())),
        }
    }

    #[test]
    fn test_value_out_of_native_range() {
        let err = Filter::with("id", Comparison::Equal, -1).query_clause::<Order>().unwrap_err();
        assert!(matches!(err, FilterError::Conversion { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_repeated_field_is_rejected() {
        let mut filter = Filter::new();
        filter.add("id", Comparison::GreaterThan, 1);
        filter.add("id", Comparison::LessThan, 5);
        match filter.query_clause::<Order>() {
            Err(FilterError::DuplicatePlaceholder { field }) => assert_eq!(field, "id"),
            other => panic!("unexpected {:?}", other.map(|c| c.text().to_string())),
        }
        // The predicate has no value-holder and accepts the same filter.
        let predicate = filter.predicate::<Order>().unwrap();
        assert!(predicate.matches(&Order { id: 3, ..Order::default() }));
        assert!(!predicate.matches(&Order { id: 5, ..Order::default() }));

        // Nested under another criterion, too.
        let mut nested = Filter::new();
        nested.add("customer", Comparison::Equal, "a").add("customer", Comparison::Equal, "b");
        assert!(matches!(
            nested.query_clause::<Order>(),
            Err(FilterError::DuplicatePlaceholder { .. })
        ));
    }

    #[test]
    fn test_into_parts() {
        let clause = Filter::with("shipped", Comparison::Equal, true).query_clause::<Order>().unwrap();
        let (text, values) = clause.into_parts();
        assert_eq!(text, "shipped = @shipped");
        assert!(values.shipped);
    }
}
