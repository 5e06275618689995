//! Where-clause operators
//!
//! Tagged comparison operators used as values inside a filter map. Given the
//! target column fragment they produce the full comparison fragment, so the
//! same operator value works under any query alias.

use crate::fragment::{bind, join_fragments, raw, seq, Fragment};
use crate::symbolic::ColumnSelector;
use serde_json::Value;

/// The right-hand side of a comparison: a bound literal or an engine-produced
/// expression (another column, a sub-query).
#[derive(Debug, Clone)]
pub enum Expression {
    Value(Value),
    Fragment(Fragment),
}

impl Expression {
    pub fn into_fragment(self) -> Fragment {
        match self {
            // NULL carries no user data and cannot be bound untyped.
            Expression::Value(Value::Null) => raw("NULL"),
            Expression::Value(value) => bind(value),
            Expression::Fragment(fragment) => fragment,
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Value(value)
    }
}

impl From<Fragment> for Expression {
    fn from(fragment: Fragment) -> Self {
        Expression::Fragment(fragment)
    }
}

impl From<&ColumnSelector> for Expression {
    fn from(column: &ColumnSelector) -> Self {
        Expression::Fragment(column.fragment())
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Expression::Value(Value::String(value))
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::Value(Value::from(value))
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::Value(Value::from(value))
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::Value(Value::Bool(value))
    }
}

/// A comparison operator awaiting its target column.
#[derive(Debug, Clone)]
pub struct WhereOp {
    kind: OpKind,
}

#[derive(Debug, Clone)]
enum OpKind {
    Compare { operator: String, rhs: Expression },
    InValues(Vec<Value>),
    AnyExpr(Expression),
    /// Matches nothing; the rendering of `any_of` over an empty set.
    Never,
}

impl WhereOp {
    /// Produce the comparison fragment for a target column.
    pub fn clause(&self, column: Fragment) -> Fragment {
        match &self.kind {
            OpKind::Compare { operator, rhs } => seq(vec![
                column,
                raw(format!(" {operator} ")),
                rhs.clone().into_fragment(),
            ]),
            OpKind::InValues(values) => {
                let binds = values
                    .iter()
                    .map(|v| Some(Expression::Value(v.clone()).into_fragment()))
                    .collect();
                seq(vec![
                    column,
                    raw(" IN ("),
                    join_fragments(binds, raw(", ")),
                    raw(")"),
                ])
            }
            OpKind::AnyExpr(expr) => seq(vec![
                column,
                raw(" = ANY("),
                expr.clone().into_fragment(),
                raw(")"),
            ]),
            // `IN ()` is invalid SQL; an empty set can never match.
            OpKind::Never => raw("FALSE"),
        }
    }
}

fn compare(operator: &str, rhs: impl Into<Expression>) -> WhereOp {
    WhereOp {
        kind: OpKind::Compare {
            operator: operator.to_string(),
            rhs: rhs.into(),
        },
    }
}

pub fn equal(rhs: impl Into<Expression>) -> WhereOp {
    compare("=", rhs)
}

pub fn not_equal(rhs: impl Into<Expression>) -> WhereOp {
    compare("!=", rhs)
}

pub fn gt(rhs: impl Into<Expression>) -> WhereOp {
    compare(">", rhs)
}

pub fn lt(rhs: impl Into<Expression>) -> WhereOp {
    compare("<", rhs)
}

pub fn gte(rhs: impl Into<Expression>) -> WhereOp {
    compare(">=", rhs)
}

pub fn lte(rhs: impl Into<Expression>) -> WhereOp {
    compare("<=", rhs)
}

pub fn is(rhs: impl Into<Expression>) -> WhereOp {
    compare("IS", rhs)
}

pub fn is_not(rhs: impl Into<Expression>) -> WhereOp {
    compare("IS NOT", rhs)
}

/// An arbitrary binary operator, verbatim.
pub fn op(operator: &str, rhs: impl Into<Expression>) -> WhereOp {
    compare(operator, rhs)
}

/// Membership over a literal set. Empty sets compile to an always-false
/// predicate rather than invalid `IN ()`.
pub fn any_of(values: Vec<Value>) -> WhereOp {
    if values.is_empty() {
        return WhereOp { kind: OpKind::Never };
    }
    WhereOp {
        kind: OpKind::InValues(values),
    }
}

/// Membership over an expression-valued right-hand side, wrapped with
/// `ANY(...)` for array or sub-query results.
pub fn any_of_expr(expr: impl Into<Expression>) -> WhereOp {
    WhereOp {
        kind: OpKind::AnyExpr(expr.into()),
    }
}
