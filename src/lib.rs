//! Dynfilter: declarative AND/OR filter trees for arbitrary record types.
//!
//! A [`Filter`] names fields by string, pairs each with a [`Comparison`] and a
//! value, and can nest sub-groups under any criterion. The same filter can then
//! be realized two ways against any type implementing [`Record`]:
//! - [`Filter::predicate`] compiles an in-process [`Predicate`];
//! - [`Filter::query_clause`] renders a parameterized [`QueryClause`] plus a
//!   value-holder instance for an external query executor.
//!
//! # Evaluation order
//! Criteria combine sequentially and left-associatively; AND has no higher
//! precedence than OR. `A and B or C and D` means `((A && B) || C) && D`, and
//! a run of ORs absorbs everything before it. A node's children are OR'd onto
//! the node. An OR with nothing before it (a leading OR, or one preceded only
//! by skipped criteria) fails with [`FilterError::EmptyExpressionReduction`],
//! as does a group in which no criterion resolves.
//!
//! A query clause binds one value per field, so a field may appear only once
//! in a filter rendered with [`Filter::query_clause`].

mod schema;
mod types;
mod filter;
mod reduce;
mod compiler;
mod clause;

pub use schema::*;
pub use types::*;
pub use filter::*;
pub use compiler::*;
pub use clause::*;

use thiserror::Error;

/// Unified error type for filter compilation.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("field '{field}' does not exist on {record}")]
    UnresolvedField { field: String, record: &'static str },

    #[error("invalid value for field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },

    #[error("comparison {comparison} is not supported on {field_type} field '{field}'")]
    UnsupportedComparison {
        field: String,
        comparison: Comparison,
        field_type: FieldType,
    },

    #[error("nothing to combine in {group}")]
    EmptyExpressionReduction { group: String },

    #[error("field '{field}' appears more than once in a query clause")]
    DuplicatePlaceholder { field: String },
}
