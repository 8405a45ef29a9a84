//! Row selection conditions.
//!
//! A `Condition` names columns; binding it against a table schema resolves
//! the names to positions and coerces each literal to its column type, so
//! evaluation is a walk over the bound tree.

use core::cmp::Ordering;
use core::fmt;
use verdict_core::schema::Table;
use verdict_core::{Error, Result, Value};
use verdict_index::keyops::CompareFn;
use verdict_index::KeyOps;

/// Comparison operator of a condition leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Returns the operator's source symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Returns true if `ord` (column value against literal) satisfies the operator.
    #[inline]
    pub fn accepts(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }

    /// Returns true for the ordering operators an index range can serve.
    pub fn is_range(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A boolean filter over the columns of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Matches every row.
    True,
    /// Compares a column with a literal.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::True
    }
}

impl Condition {
    /// Creates a comparison leaf.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates an equality leaf.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Conjunction, flattening nested ANDs.
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::True, c) | (c, Condition::True) => c,
            (Condition::And(mut a), Condition::And(b)) => {
                a.extend(b);
                Condition::And(a)
            }
            (Condition::And(mut a), c) => {
                a.push(c);
                Condition::And(a)
            }
            (c, Condition::And(mut b)) => {
                b.insert(0, c);
                Condition::And(b)
            }
            (a, b) => Condition::And(vec![a, b]),
        }
    }

    /// Disjunction, flattening nested ORs.
    pub fn or(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::Or(mut a), Condition::Or(b)) => {
                a.extend(b);
                Condition::Or(a)
            }
            (Condition::Or(mut a), c) => {
                a.push(c);
                Condition::Or(a)
            }
            (a, b) => Condition::Or(vec![a, b]),
        }
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Counts comparison leaves.
    pub fn comparisons(&self) -> usize {
        match self {
            Condition::True => 0,
            Condition::Compare { .. } => 1,
            Condition::And(cs) | Condition::Or(cs) => cs.iter().map(Condition::comparisons).sum(),
            Condition::Not(c) => c.comparisons(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, cs: &[Condition], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, c) in cs.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{}", c)?;
            }
            f.write_str(")")
        }
        match self {
            Condition::True => f.write_str("TRUE"),
            Condition::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op, KeyOps::<Value>::dynamic().display(value))
            }
            Condition::And(cs) => join(f, cs, " & "),
            Condition::Or(cs) => join(f, cs, " | "),
            Condition::Not(c) => write!(f, "!({})", c),
        }
    }
}

/// A condition resolved against one table schema.
#[derive(Clone, Debug)]
pub(crate) enum Bound {
    True,
    Compare {
        position: usize,
        op: CompareOp,
        value: Value,
        compare: CompareFn<Value>,
    },
    And(Vec<Bound>),
    Or(Vec<Bound>),
    Not(Box<Bound>),
}

impl Bound {
    /// Resolves column names and coerces literals to the column types.
    pub(crate) fn bind(condition: &Condition, schema: &Table, max_comparisons: usize) -> Result<Self> {
        let count = condition.comparisons();
        if count > max_comparisons {
            return Err(Error::exhausted(format!(
                "condition has {} comparisons, limit is {}",
                count, max_comparisons
            )));
        }
        Self::bind_node(condition, schema)
    }

    fn bind_node(condition: &Condition, schema: &Table) -> Result<Self> {
        Ok(match condition {
            Condition::True => Bound::True,
            Condition::Compare { column, op, value } => {
                let col = schema.column(column)?;
                let value = value.clone().coerce_to(col.data_type())?;
                Bound::Compare {
                    position: col.index(),
                    op: *op,
                    value,
                    compare: KeyOps::for_type(col.data_type()).compare,
                }
            }
            Condition::And(cs) => {
                Bound::And(cs.iter().map(|c| Self::bind_node(c, schema)).collect::<Result<_>>()?)
            }
            Condition::Or(cs) => {
                Bound::Or(cs.iter().map(|c| Self::bind_node(c, schema)).collect::<Result<_>>()?)
            }
            Condition::Not(c) => Bound::Not(Box::new(Self::bind_node(c, schema)?)),
        })
    }

    /// Evaluates the condition against a row's values.
    pub(crate) fn matches(&self, values: &[Value]) -> bool {
        match self {
            Bound::True => true,
            Bound::Compare {
                position,
                op,
                value,
                compare,
            } => match values.get(*position) {
                Some(v) => op.accepts(compare(v, value)),
                None => false,
            },
            Bound::And(cs) => cs.iter().all(|c| c.matches(values)),
            Bound::Or(cs) => cs.iter().any(|c| c.matches(values)),
            Bound::Not(c) => !c.matches(values),
        }
    }

    /// Returns the comparisons that must all hold for the condition to hold.
    ///
    /// Only top-level conjuncts are returned; anything under OR or NOT is
    /// left to full evaluation.
    pub(crate) fn conjuncts(&self) -> Vec<(usize, CompareOp, &Value)> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<(usize, CompareOp, &'a Value)>) {
        match self {
            Bound::Compare {
                position, op, value, ..
            } => out.push((*position, *op, value)),
            Bound::And(cs) => cs.iter().for_each(|c| c.collect_conjuncts(out)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::schema::TableBuilder;
    use verdict_core::{DataType, ErrorKind};

    fn schema() -> Table {
        TableBuilder::new("temp")
            .unwrap()
            .add_column("room", DataType::Varchar, 16)
            .unwrap()
            .add_column("degrees", DataType::Integer, 0)
            .unwrap()
            .build()
            .unwrap()
    }

    fn row(room: &str, degrees: i32) -> Vec<Value> {
        vec![Value::from(room), Value::Integer(degrees)]
    }

    #[test]
    fn test_compare_ops() {
        assert!(CompareOp::Le.accepts(Ordering::Equal));
        assert!(!CompareOp::Lt.accepts(Ordering::Equal));
        assert!(CompareOp::Ne.accepts(Ordering::Greater));
        assert!(CompareOp::Ge.is_range());
        assert!(!CompareOp::Eq.is_range());
    }

    #[test]
    fn test_bind_and_match() {
        let cond = Condition::eq("room", "kitchen").and(Condition::compare("degrees", CompareOp::Gt, 20));
        let bound = Bound::bind(&cond, &schema(), 64).unwrap();
        assert!(bound.matches(&row("kitchen", 25)));
        assert!(!bound.matches(&row("kitchen", 20)));
        assert!(!bound.matches(&row("hall", 25)));
        assert_eq!(bound.conjuncts().len(), 2);
    }

    #[test]
    fn test_or_not() {
        let cond = Condition::eq("room", "hall").or(Condition::eq("degrees", 5)).not();
        let bound = Bound::bind(&cond, &schema(), 64).unwrap();
        assert!(bound.matches(&row("kitchen", 6)));
        assert!(!bound.matches(&row("hall", 6)));
        assert!(bound.conjuncts().is_empty());
    }

    #[test]
    fn test_literal_coerced() {
        let cond = Condition::eq("degrees", Value::Unsigned(7));
        let bound = Bound::bind(&cond, &schema(), 64).unwrap();
        assert!(bound.matches(&row("x", 7)));

        let bad = Condition::eq("degrees", "seven");
        let err = Bound::bind(&bad, &schema(), 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_unknown_column() {
        let err = Bound::bind(&Condition::eq("nope", 1), &schema(), 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_comparison_limit() {
        let cond = (0..5).fold(Condition::True, |c, i| c.and(Condition::eq("degrees", i)));
        assert_eq!(cond.comparisons(), 5);
        let err = Bound::bind(&cond, &schema(), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_display() {
        let cond = Condition::eq("room", "hall").and(Condition::compare("degrees", CompareOp::Le, 3));
        assert_eq!(cond.to_string(), "(room = 'hall' & degrees <= 3)");
    }
}
