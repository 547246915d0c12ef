//! Reduction module: folds a list of filter nodes into one expression.
//!
//! Both backends share this walk and differ only in what an atomic
//! expression is and how two expressions are joined.

use crate::filter::{Combinator, Comparison, FilterNode};
use crate::schema::FieldAccessor;
use crate::types::FieldValue;
use crate::FilterError;

pub(crate) const TOP_LEVEL: &str = "top-level filter";

/// An expression that can be joined with AND and OR.
pub(crate) trait Junction: Clone {
    fn and(self, rhs: Self) -> Self;
    fn or(self, rhs: Self) -> Self;
}

/// Reduces `nodes` left to right in a single pass.
///
/// `atom` builds the expression for one node; `Ok(None)` means the node is
/// skipped. An AND node is queued. An OR node first ANDs everything queued,
/// ORs its own expression onto that, and leaves the result as the only queued
/// entry; a skipped OR still folds, with the fold itself as the right operand.
/// Children reduce the same way and are OR'd onto the last queued entry.
/// Reducing an empty queue fails with `EmptyExpressionReduction`.
pub(crate) fn reduce<E, F>(nodes: &[FilterNode], group: &str, atom: &mut F) -> Result<E, FilterError>
where
    E: Junction,
    F: FnMut(&FilterNode) -> Result<Option<E>, FilterError>,
{
    let mut acc: Vec<E> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let expr = atom(node)?;
        match node.combinator() {
            Combinator::And => acc.extend(expr),
            Combinator::Or => {
                let folded = conjoin(std::mem::take(&mut acc), group)?;
                let rhs = expr.unwrap_or_else(|| folded.clone());
                acc.push(folded.or(rhs));
            }
        }
        if !node.children().is_empty() {
            let sub_group = format!("children of '{}'", node.field());
            let sub = reduce(node.children(), &sub_group, atom)?;
            let last = acc
                .pop()
                .ok_or_else(|| FilterError::EmptyExpressionReduction { group: group.to_string() })?;
            acc.push(last.or(sub));
        }
    }
    conjoin(acc, group)
}

/// Checks the node's comparison against the field and converts its value to
/// the field's native type.
pub(crate) fn leaf_constant<T>(node: &FilterNode, field: &FieldAccessor<T>) -> Result<FieldValue, FilterError> {
    let field_type = field.field_type();
    if node.comparison() == Comparison::Contains && !field_type.is_text() {
        return Err(FilterError::UnsupportedComparison {
            field: node.field().to_string(),
            comparison: node.comparison(),
            field_type,
        });
    }
    field.convert(node.value().clone()).map_err(|source| FilterError::Conversion {
        field: node.field().to_string(),
        source,
    })
}

/// ANDs `exprs` together in order.
fn conjoin<E: Junction>(exprs: Vec<E>, group: &str) -> Result<E, FilterError> {
    let mut iter = exprs.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| FilterError::EmptyExpressionReduction { group: group.to_string() })?;
    Ok(iter.fold(first, E::and))
}
