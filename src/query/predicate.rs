//! WHERE-clause predicates
//!
//! A [`Predicate`] renders to a SQL boolean expression with `?` placeholders
//! and the bind values for those placeholders, in the same order.

use indexmap::IndexMap;

use crate::row::Value;

/// Composable condition tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Predicate {
    /// No condition; renders no WHERE clause
    #[default]
    Empty,
    /// Conjunction of `column = value` tests, in insertion order
    Conditions(IndexMap<String, Value>),
    /// Both sides must hold
    And(Box<Predicate>, Box<Predicate>),
    /// Either side must hold
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// The empty predicate
    pub fn empty() -> Self {
        Predicate::Empty
    }

    /// A single `column = value` test
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::conditions([(column, value)])
    }

    /// A conjunction of equality tests, e.g. a composite key lookup
    pub fn conditions<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Predicate::Conditions(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Combine with `AND`
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Combine with `OR`
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Does this predicate render to an empty condition?
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Empty => true,
            Predicate::Conditions(pairs) => pairs.is_empty(),
            Predicate::And(l, r) | Predicate::Or(l, r) => l.is_empty() && r.is_empty(),
        }
    }

    /// The boolean expression, without the `WHERE` keyword
    pub fn condition_sql(&self) -> String {
        match self {
            Predicate::Empty => String::new(),
            Predicate::Conditions(pairs) => pairs
                .iter()
                .map(|(column, value)| {
                    if value.is_null() {
                        format!("{} IS NULL", column)
                    } else {
                        format!("{} = ?", column)
                    }
                })
                .collect::<Vec<_>>()
                .join(" AND "),
            Predicate::And(l, r) => combine(l, r, "AND"),
            Predicate::Or(l, r) => combine(l, r, "OR"),
        }
    }

    /// ` WHERE <condition>`, or an empty string for an empty predicate
    pub fn where_sql(&self) -> String {
        let condition = self.condition_sql();
        if condition.is_empty() {
            condition
        } else {
            format!(" WHERE {}", condition)
        }
    }

    /// Bind values for the placeholders of [`Predicate::condition_sql`]
    pub fn constants(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.collect_constants(&mut out);
        out
    }

    /// Every column the predicate refers to
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Predicate::Empty => Vec::new(),
            Predicate::Conditions(pairs) => pairs.keys().map(String::as_str).collect(),
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                let mut columns = l.columns();
                columns.extend(r.columns());
                columns
            }
        }
    }

    fn collect_constants<'a>(&'a self, out: &mut Vec<&'a Value>) {
        match self {
            Predicate::Empty => {}
            Predicate::Conditions(pairs) => out.extend(pairs.values().filter(|v| !v.is_null())),
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_constants(out);
                r.collect_constants(out);
            }
        }
    }
}

fn combine(left: &Predicate, right: &Predicate, op: &str) -> String {
    let l = left.condition_sql();
    let r = right.condition_sql();
    match (l.is_empty(), r.is_empty()) {
        (true, _) => r,
        (_, true) => l,
        _ => format!("({}) {} ({})", l, op, r),
    }
}

impl From<IndexMap<String, Value>> for Predicate {
    fn from(pairs: IndexMap<String, Value>) -> Self {
        Predicate::Conditions(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_placeholders_match(p: &Predicate) {
        let sql = p.condition_sql();
        assert_eq!(
            sql.matches('?').count(),
            p.constants().len(),
            "placeholder mismatch in `{}`",
            sql
        );
    }

    #[test]
    fn test_empty() {
        let p = Predicate::empty();
        assert_eq!(p.where_sql(), "");
        assert!(p.constants().is_empty());
        assert!(Predicate::conditions(Vec::<(String, Value)>::new()).is_empty());
    }

    #[test]
    fn test_composite_key() {
        let p = Predicate::conditions([("a", Value::Integer(1)), ("b", Value::from("x"))]);
        assert_eq!(p.where_sql(), " WHERE a = ? AND b = ?");
        assert_eq!(p.constants(), vec![&Value::Integer(1), &Value::from("x")]);
    }

    #[test]
    fn test_or_parenthesizes_and_orders_constants() {
        let p = Predicate::equals("id", 99).or(Predicate::equals("name", "account 99"));
        assert_eq!(p.condition_sql(), "(id = ?) OR (name = ?)");
        assert_eq!(
            p.constants(),
            vec![&Value::Integer(99), &Value::from("account 99")]
        );
    }

    #[test]
    fn test_nested_precedence() {
        let p = Predicate::equals("a", 1)
            .or(Predicate::equals("b", 2))
            .and(Predicate::equals("c", 3));
        assert_eq!(p.condition_sql(), "((a = ?) OR (b = ?)) AND (c = ?)");
        assert_placeholders_match(&p);
    }

    #[test]
    fn test_empty_side_collapses() {
        let p = Predicate::empty().and(Predicate::equals("a", 1));
        assert_eq!(p.condition_sql(), "a = ?");
        let p = Predicate::equals("a", 1).or(Predicate::empty());
        assert_eq!(p.condition_sql(), "a = ?");
        let p = Predicate::empty().or(Predicate::empty());
        assert_eq!(p.where_sql(), "");
        assert!(p.is_empty());
    }

    #[test]
    fn test_null_renders_is_null_without_parameter() {
        let p = Predicate::conditions([("a", Value::Null), ("b", Value::Integer(2))]);
        assert_eq!(p.condition_sql(), "a IS NULL AND b = ?");
        assert_eq!(p.constants(), vec![&Value::Integer(2)]);
    }

    #[test]
    fn test_placeholders_always_match_constants() {
        let leaves = vec![
            Predicate::empty(),
            Predicate::equals("a", 1),
            Predicate::conditions([("b", Value::Null), ("c", Value::from("z"))]),
            Predicate::conditions([("d", 1), ("e", 2), ("f", 3)]),
        ];
        for l in &leaves {
            for r in &leaves {
                assert_placeholders_match(&l.clone().and(r.clone()));
                assert_placeholders_match(&l.clone().or(r.clone()));
                assert_placeholders_match(&l.clone().and(r.clone()).or(l.clone()));
            }
        }
    }

    #[test]
    fn test_columns() {
        let p = Predicate::equals("a", 1).or(Predicate::conditions([("b", 2), ("c", 3)]));
        assert_eq!(p.columns(), vec!["a", "b", "c"]);
    }
}
