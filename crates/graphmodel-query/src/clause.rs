//! Filter and ordering clauses attached to a traversal hop.

use graphmodel_core::Value;
use std::collections::BTreeMap;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl Comparison {
    const fn operator(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::In => "IN",
            Comparison::Contains => "CONTAINS",
            Comparison::StartsWith => "STARTS WITH",
            Comparison::EndsWith => "ENDS WITH",
            Comparison::IsNull => "IS NULL",
            Comparison::IsNotNull => "IS NOT NULL",
        }
    }

    const fn takes_operand(self) -> bool {
        !matches!(self, Comparison::IsNull | Comparison::IsNotNull)
    }
}

/// A property condition on the nodes matched by a hop.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    property: String,
    op: Comparison,
    value: Value,
}

impl Filter {
    /// Create a filter from its parts.
    pub fn new(property: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Eq, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Ne, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Gt, value)
    }

    pub fn gte(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Gte, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Lt, value)
    }

    pub fn lte(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Comparison::Lte, value)
    }

    /// Property value is one of `values`.
    pub fn is_in<I, V>(property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            property,
            Comparison::In,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn contains(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, Comparison::Contains, Value::Text(value.into()))
    }

    pub fn starts_with(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, Comparison::StartsWith, Value::Text(value.into()))
    }

    pub fn ends_with(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, Comparison::EndsWith, Value::Text(value.into()))
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::new(property, Comparison::IsNull, Value::Null)
    }

    pub fn is_not_null(property: impl Into<String>) -> Self {
        Self::new(property, Comparison::IsNotNull, Value::Null)
    }

    /// Render against `ident`, binding the operand as `$param`.
    pub fn build(&self, ident: &str, param: &str, params: &mut BTreeMap<String, Value>) -> String {
        let target = property_ref(ident, &self.property);
        if self.op.takes_operand() {
            params.insert(param.to_string(), self.value.clone());
            format!("{} {} ${}", target, self.op.operator(), param)
        } else {
            format!("{} {}", target, self.op.operator())
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY entry on a node property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    property: String,
    direction: OrderDirection,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Render against `ident`.
    pub fn build(&self, ident: &str) -> String {
        let mut out = property_ref(ident, &self.property);
        out.push_str(match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        });
        out
    }
}

/// Quote a name as a backtick identifier.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn property_ref(ident: &str, property: &str) -> String {
    format!("{}.{}", ident, quote_ident(property))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_binds_operand() {
        let mut params = BTreeMap::new();
        let sql = Filter::gt("year", 2010).build("n1", "n1_p0", &mut params);
        assert_eq!(sql, "n1.`year` > $n1_p0");
        assert_eq!(params.get("n1_p0"), Some(&Value::BigInt(2010)));
    }

    #[test]
    fn null_checks_bind_nothing() {
        let mut params = BTreeMap::new();
        let sql = Filter::is_null("sold_at").build("n2", "n2_p0", &mut params);
        assert_eq!(sql, "n2.`sold_at` IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn in_filter_uses_list() {
        let mut params = BTreeMap::new();
        let sql = Filter::is_in("make", ["Volvo", "Saab"]).build("n1", "p", &mut params);
        assert_eq!(sql, "n1.`make` IN $p");
        assert_eq!(
            params.get("p"),
            Some(&Value::Array(vec![
                Value::Text("Volvo".into()),
                Value::Text("Saab".into())
            ]))
        );
    }

    #[test]
    fn order_by_and_quoting() {
        assert_eq!(OrderBy::desc("year").build("n1"), "n1.`year` DESC");
        assert_eq!(OrderBy::asc("odd`name").build("n0"), "n0.`odd``name` ASC");
        assert_eq!(quote_ident("OWNS"), "`OWNS`");
    }
}
