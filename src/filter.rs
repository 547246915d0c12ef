//! Filter module: the tree of filter criteria and the builder used to grow it.
//!
//! Criteria combine sequentially and left-associatively: AND has no higher
//! precedence than OR, so `A and B or C and D` means `((A && B) || C) && D`.
//! A node's children form a sub-group that is OR'd onto the node itself.

use crate::clause::{QueryClause, QueryClauseGenerator};
use crate::compiler::{Predicate, PredicateCompiler};
use crate::schema::{FieldKey, Record};
use crate::types::FieldValue;
use crate::FilterError;
use serde::{Serialize, Deserialize};
use std::fmt;

/// How a node joins the node before it at the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// Substring test; text fields only.
    Contains,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One criterion plus its sub-group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    #[serde(default)]
    combinator: Combinator,
    field: String,
    comparison: Comparison,
    value: FieldValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<FilterNode>,
}

impl FilterNode {
    pub fn new(combinator: Combinator, field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> Self {
        Self {
            combinator,
            field: field.into(),
            comparison,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn children(&self) -> &[FilterNode] {
        &self.children
    }

    /// Appends an AND-combined child and returns it.
    pub fn add(&mut self, field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> &mut FilterNode {
        push(&mut self.children, FilterNode::new(Combinator::And, field, comparison, value))
    }

    /// Appends an OR-combined child and returns it.
    pub fn or(&mut self, field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> &mut FilterNode {
        push(&mut self.children, FilterNode::new(Combinator::Or, field, comparison, value))
    }

    pub fn add_key<T, V: Into<FieldValue>>(&mut self, key: FieldKey<T, V>, comparison: Comparison, value: V) -> &mut FilterNode {
        self.add(key.name(), comparison, value)
    }

    pub fn or_key<T, V: Into<FieldValue>>(&mut self, key: FieldKey<T, V>, comparison: Comparison, value: V) -> &mut FilterNode {
        self.or(key.name(), comparison, value)
    }
}

fn push(nodes: &mut Vec<FilterNode>, node: FilterNode) -> &mut FilterNode {
    nodes.push(node);
    let last = nodes.len() - 1;
    &mut nodes[last]
}

/// The top-level list of criteria.
///
/// No validation happens while building; unknown fields and mismatched
/// comparisons surface when a backend resolves the list against a record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    nodes: Vec<FilterNode>,
}

impl Filter {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// A filter holding a single criterion.
    pub fn with(field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> Self {
        let mut filter = Self::new();
        filter.add(field, comparison, value);
        filter
    }

    pub fn add(&mut self, field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> &mut FilterNode {
        push(&mut self.nodes, FilterNode::new(Combinator::And, field, comparison, value))
    }

    pub fn or(&mut self, field: impl Into<String>, comparison: Comparison, value: impl Into<FieldValue>) -> &mut FilterNode {
        push(&mut self.nodes, FilterNode::new(Combinator::Or, field, comparison, value))
    }

    /// Adds a criterion named by a typed key; the value must match the key's type.
    pub fn add_key<T, V: Into<FieldValue>>(&mut self, key: FieldKey<T, V>, comparison: Comparison, value: V) -> &mut FilterNode {
        self.add(key.name(), comparison, value)
    }

    pub fn or_key<T, V: Into<FieldValue>>(&mut self, key: FieldKey<T, V>, comparison: Comparison, value: V) -> &mut FilterNode {
        self.or(key.name(), comparison, value)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a top-level criterion names `field`.
    pub fn exists(&self, field: &str) -> bool {
        self.nodes.iter().any(|n| n.field == field)
    }

    /// The first top-level criterion naming `field`.
    pub fn get(&self, field: &str) -> Option<&FilterNode> {
        self.nodes.iter().find(|n| n.field == field)
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Compiles a predicate for `T` with a fresh [`PredicateCompiler`].
    pub fn predicate<T: Record>(&self) -> Result<Predicate<T>, FilterError> {
        PredicateCompiler::new().compile(&self.nodes)
    }

    /// Generates a query clause for `T` with default options.
    pub fn query_clause<T: Record + Default>(&self) -> Result<QueryClause<T>, FilterError> {
        QueryClauseGenerator::new().generate(&self.nodes)
    }
}

impl From<Vec<FilterNode>> for Filter {
    fn from(nodes: Vec<FilterNode>) -> Self {
        Self { nodes }
    }
}
