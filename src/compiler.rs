//! Compiler module: compiles a filter list into a predicate over a record type.
//!
//! Unknown field names are skipped, so a filter written for one type degrades
//! gracefully when applied to another.

use crate::filter::{Comparison, FilterNode};
use crate::reduce::{leaf_constant, reduce, Junction, TOP_LEVEL};
use crate::schema::{FieldAccessor, Record};
use crate::types::FieldValue;
use crate::FilterError;
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, trace};

type Matcher<T> = Box<dyn Fn(&T) -> bool + Send + Sync + 'static>;

pub(crate) enum PredicateExpr<T: 'static> {
    Compare {
        field: &'static FieldAccessor<T>,
        comparison: Comparison,
        constant: FieldValue,
    },
    And(Box<PredicateExpr<T>>, Box<PredicateExpr<T>>),
    Or(Box<PredicateExpr<T>>, Box<PredicateExpr<T>>),
}

impl<T: 'static> Clone for PredicateExpr<T> {
    fn clone(&self) -> Self {
        match self {
            PredicateExpr::Compare { field, comparison, constant } => PredicateExpr::Compare {
                field: *field,
                comparison: *comparison,
                constant: constant.clone(),
            },
            PredicateExpr::And(l, r) => PredicateExpr::And(l.clone(), r.clone()),
            PredicateExpr::Or(l, r) => PredicateExpr::Or(l.clone(), r.clone()),
        }
    }
}

impl<T: 'static> Junction for PredicateExpr<T> {
    fn and(self, rhs: Self) -> Self {
        PredicateExpr::And(Box::new(self), Box::new(rhs))
    }

    fn or(self, rhs: Self) -> Self {
        PredicateExpr::Or(Box::new(self), Box::new(rhs))
    }
}

impl<T: 'static> fmt::Display for PredicateExpr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateExpr::Compare { field, comparison, constant } => {
                let op = match comparison {
                    Comparison::Contains => return write!(f, "obj.{}.contains({})", field.name(), constant),
                    Comparison::Equal => "==",
                    Comparison::NotEqual => "!=",
                    Comparison::LessThan => "<",
                    Comparison::LessThanOrEqual => "<=",
                    Comparison::GreaterThan => ">",
                    Comparison::GreaterThanOrEqual => ">=",
                };
                write!(f, "obj.{} {} {}", field.name(), op, constant)
            }
            PredicateExpr::And(l, r) => write!(f, "({} && {})", l, r),
            PredicateExpr::Or(l, r) => write!(f, "({} || {})", l, r),
        }
    }
}

fn compile_expr<T: 'static>(expr: PredicateExpr<T>) -> Matcher<T> {
    match expr {
        PredicateExpr::And(left, right) => {
            let l = compile_expr(*left);
            let r = compile_expr(*right);
            Box::new(move |record: &T| l(record) && r(record))
        }
        PredicateExpr::Or(left, right) => {
            let l = compile_expr(*left);
            let r = compile_expr(*right);
            Box::new(move |record: &T| l(record) || r(record))
        }
        PredicateExpr::Compare { field, comparison, constant } => {
            Box::new(move |record: &T| evaluate(comparison, &field.read(record), &constant))
        }
    }
}

fn evaluate(comparison: Comparison, value: &FieldValue, constant: &FieldValue) -> bool {
    match comparison {
        Comparison::Equal => value == constant,
        Comparison::NotEqual => value != constant,
        Comparison::LessThan => value.compare(constant) == Some(Ordering::Less),
        Comparison::LessThanOrEqual => matches!(value.compare(constant), Some(Ordering::Less | Ordering::Equal)),
        Comparison::GreaterThan => value.compare(constant) == Some(Ordering::Greater),
        Comparison::GreaterThanOrEqual => matches!(value.compare(constant), Some(Ordering::Greater | Ordering::Equal)),
        Comparison::Contains => match (value.as_text(), constant.as_text()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
    }
}

/// Builds predicates and remembers the text of the last one it built.
#[derive(Debug, Default)]
pub struct PredicateCompiler {
    last_rendered: Option<String>,
}

impl PredicateCompiler {
    pub fn new() -> Self {
        Self { last_rendered: None }
    }

    /// Text of the most recent successful compile. Cleared by a failed one.
    pub fn last_rendered(&self) -> Option<&str> {
        self.last_rendered.as_deref()
    }

    pub fn compile<T: Record>(&mut self, nodes: &[FilterNode]) -> Result<Predicate<T>, FilterError> {
        self.last_rendered = None;
        let schema = T::schema();
        debug!(record = schema.record_name(), nodes = nodes.len(), "compiling predicate");

        let mut atom = |node: &FilterNode| -> Result<Option<PredicateExpr<T>>, FilterError> {
            let Some(field) = schema.resolve(node.field()) else {
                trace!(field = node.field(), record = schema.record_name(), "skipping unresolved field");
                return Ok(None);
            };
            let constant = leaf_constant(node, field)?;
            Ok(Some(PredicateExpr::Compare {
                field,
                comparison: node.comparison(),
                constant,
            }))
        };
        let expr = reduce(nodes, TOP_LEVEL, &mut atom)?;

        let text = expr.to_string();
        debug!(text = %text, "predicate compiled");
        self.last_rendered = Some(text.clone());
        Ok(Predicate {
            matcher: compile_expr(expr),
            text,
        })
    }
}

/// A compiled filter, ready to test records of `T`.
///
/// Evaluation touches no shared mutable state, so one predicate can be used
/// from many threads at once.
pub struct Predicate<T> {
    matcher: Matcher<T>,
    text: String,
}

impl<T> Predicate<T> {
    pub fn matches(&self, record: &T) -> bool {
        (self.matcher)(record)
    }

    /// Human-readable form of the compiled expression.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lazily yields the records that match.
    pub fn filter<'a, I>(&'a self, records: I) -> impl Iterator<Item = &'a T> + 'a
    where
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: 'a,
    {
        records.into_iter().filter(move |record| self.matches(record))
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("text", &self.text).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::impl_record;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Reading {
        sensor: String,
        level: i32,
        ratio: f64,
        online: bool,
    }

    impl_record!(Reading { sensor, level, ratio, online });

    fn readings() -> Vec<Reading> {
        vec![
            Reading { sensor: "north-1".into(), level: 3, ratio: 0.5, online: true },
            Reading { sensor: "north-2".into(), level: 7, ratio: 1.5, online: false },
            Reading { sensor: "south-1".into(), level: 5, ratio: 2.0, online: true },
        ]
    }

    fn levels(predicate: &Predicate<Reading>) -> Vec<i32> {
        let data = readings();
        predicate.filter(&data).map(|r| r.level).collect()
    }

    #[test]
    fn test_compile_and_execute_comparisons() {
        let cases = [
            (Comparison::Equal, vec![5]),
            (Comparison::NotEqual, vec![3, 7]),
            (Comparison::LessThan, vec![3]),
            (Comparison::LessThanOrEqual, vec![3, 5]),
            (Comparison::GreaterThan, vec![7]),
            (Comparison::GreaterThanOrEqual, vec![7, 5]),
        ];
        for (comparison, expected) in cases {
            let predicate = Filter::with("level", comparison, 5).predicate::<Reading>().unwrap();
            assert_eq!(levels(&predicate), expected, "{:?}", comparison);
        }
    }

    #[test]
    fn test_compile_and_execute_contains() {
        let predicate = Filter::with("sensor", Comparison::Contains, "north").predicate::<Reading>().unwrap();
        assert_eq!(levels(&predicate), vec![3, 7]);
        assert_eq!(predicate.text(), r#"obj.sensor.contains("north")"#);
    }

    #[test]
    fn test_value_is_converted_to_field_type() {
        let predicate = Filter::with("ratio", Comparison::GreaterThan, 1).predicate::<Reading>().unwrap();
        assert_eq!(levels(&predicate), vec![7, 5]);
        let predicate = Filter::with("online", Comparison::Equal, "false").predicate::<Reading>().unwrap();
        assert_eq!(levels(&predicate), vec![7]);
    }

    #[test]
    fn test_conversion_failure_is_terminal() {
        let err = Filter::with("level", Comparison::Equal, "high").predicate::<Reading>().unwrap_err();
        assert!(matches!(err, FilterError::Conversion { ref field, .. } if field == "level"));
    }

    #[derive(Debug, Default)]
    struct Compact {
        slot: u8,
        weight: f32,
    }

    impl_record!(Compact { slot, weight });

    #[test]
    fn test_value_out_of_native_range_is_terminal() {
        let err = Filter::with("slot", Comparison::Equal, 300).predicate::<Compact>().unwrap_err();
        match err {
            FilterError::Conversion { field, source } => {
                assert_eq!(field, "slot");
                assert!(source.reason.contains("u8"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let clause_err = Filter::with("slot", Comparison::Equal, 300).query_clause::<Compact>().unwrap_err();
        assert!(matches!(clause_err, FilterError::Conversion { .. }));
    }

    #[test]
    fn test_f32_equality_uses_native_precision() {
        let predicate = Filter::with("weight", Comparison::Equal, 0.1).predicate::<Compact>().unwrap();
        assert!(predicate.matches(&Compact { slot: 1, weight: 0.1 }));
        assert!(!predicate.matches(&Compact { slot: 1, weight: 0.2 }));

        let at_most = Filter::with("weight", Comparison::LessThanOrEqual, "0.1").predicate::<Compact>().unwrap();
        assert!(at_most.matches(&Compact { slot: 2, weight: 0.1 }));
    }

    #[test]
    fn test_contains_on_non_text_field() {
        let err = Filter::with("level", Comparison::Contains, 5).predicate::<Reading>().unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedComparison { comparison: Comparison::Contains, .. }));
    }

    #[test]
    fn test_unknown_field_is_skipped() {
        let mut filter = Filter::new();
        filter.add("level", Comparison::GreaterThan, 3);
        filter.add("colour", Comparison::Equal, "red");
        let predicate = filter.predicate::<Reading>().unwrap();
        assert_eq!(levels(&predicate), vec![7, 5]);
        assert_eq!(predicate.text(), "obj.level > 3");
    }

    #[test]
    fn test_rendered_text_grouping() {
        let mut filter = Filter::new();
        filter.add("online", Comparison::Equal, true);
        filter.or("level", Comparison::GreaterThan, 6);
        filter.or("sensor", Comparison::Equal, "x");
        let predicate = filter.predicate::<Reading>().unwrap();
        assert_eq!(
            predicate.text(),
            r#"((obj.online == true || obj.level > 6) || obj.sensor == "x")"#
        );
        assert_eq!(levels(&predicate), vec![3, 7, 5]);
    }

    #[test]
    fn test_last_rendered_tracks_latest_compile() {
        let mut compiler = PredicateCompiler::new();
        assert!(compiler.last_rendered().is_none());
        let first = Filter::with("level", Comparison::Equal, 3);
        compiler.compile::<Reading>(first.nodes()).unwrap();
        assert_eq!(compiler.last_rendered(), Some("obj.level == 3"));

        let second = Filter::with("sensor", Comparison::Equal, "south-1");
        compiler.compile::<Reading>(second.nodes()).unwrap();
        assert_eq!(compiler.last_rendered(), Some(r#"obj.sensor == "south-1""#));

        assert!(compiler.compile::<Reading>(&[]).is_err());
        assert!(compiler.last_rendered().is_none());
    }

    #[test]
    fn test_predicate_is_send_sync() {
        fn assert_send_sync<P: Send + Sync>(_: &P) {}
        let predicate = Filter::with("level", Comparison::Equal, 3).predicate::<Reading>().unwrap();
        assert_send_sync(&predicate);
        let shared = std::sync::Arc::new(predicate);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = std::sync::Arc::clone(&shared);
                std::thread::spawn(move || readings().iter().filter(|r| p.matches(r)).count())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
    }

    #[test]
    fn test_leading_or_is_rejected() {
        let mut filter = Filter::new();
        filter
            .add("level", Comparison::GreaterThan, 6)
            .or("sensor", Comparison::Equal, "x");
        let err = filter.predicate::<Reading>().unwrap_err();
        assert!(matches!(err, FilterError::EmptyExpressionReduction { ref group } if group == "children of 'level'"));
    }
}
