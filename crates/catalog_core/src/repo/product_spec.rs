//! Composable product predicates.
//!
//! A `ProductSpec` compiles to a `WHERE` fragment over `products p` joined
//! with `categories c`. Values are always bound as parameters.

use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductSpec {
    NameEquals(String),
    /// SQL `LIKE` pattern, e.g. `%Apple%`.
    NameLike(String),
    /// Inclusive bounds; `None` leaves that side open.
    PriceBetween {
        min: Option<i64>,
        max: Option<i64>,
    },
    CategoryNameEquals(String),
    And(Vec<ProductSpec>),
    Or(Vec<ProductSpec>),
    Not(Box<ProductSpec>),
}

impl ProductSpec {
    pub fn name_equals(name: impl Into<String>) -> Self {
        Self::NameEquals(name.into())
    }

    pub fn name_like(pattern: impl Into<String>) -> Self {
        Self::NameLike(pattern.into())
    }

    pub fn category_name_equals(name: impl Into<String>) -> Self {
        Self::CategoryNameEquals(name.into())
    }

    pub fn price_at_least(min: i64) -> Self {
        Self::PriceBetween {
            min: Some(min),
            max: None,
        }
    }

    pub fn and(self, other: ProductSpec) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            current => Self::And(vec![current, other]),
        }
    }

    pub fn or(self, other: ProductSpec) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            current => Self::Or(vec![current, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Renders this predicate, appending bind values in placeholder order.
    pub(crate) fn to_sql(&self, binds: &mut Vec<Value>) -> String {
        match self {
            Self::NameEquals(name) => {
                binds.push(Value::Text(name.clone()));
                "p.name = ?".to_string()
            }
            Self::NameLike(pattern) => {
                binds.push(Value::Text(pattern.clone()));
                "p.name LIKE ?".to_string()
            }
            Self::PriceBetween { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    binds.push(Value::Integer(*min));
                    binds.push(Value::Integer(*max));
                    "p.price BETWEEN ? AND ?".to_string()
                }
                (Some(min), None) => {
                    binds.push(Value::Integer(*min));
                    "p.price >= ?".to_string()
                }
                (None, Some(max)) => {
                    binds.push(Value::Integer(*max));
                    "p.price <= ?".to_string()
                }
                (None, None) => "1 = 1".to_string(),
            },
            Self::CategoryNameEquals(name) => {
                binds.push(Value::Text(name.clone()));
                "c.name = ?".to_string()
            }
            Self::And(parts) => join_parts(parts, " AND ", "1 = 1", binds),
            Self::Or(parts) => join_parts(parts, " OR ", "1 = 0", binds),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(binds)),
        }
    }
}

fn join_parts(parts: &[ProductSpec], separator: &str, empty: &str, binds: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered = parts
        .iter()
        .map(|part| format!("({})", part.to_sql(binds)))
        .collect::<Vec<_>>();
    rendered.join(separator)
}

#[cfg(test)]
mod tests {
    use super::ProductSpec;
    use rusqlite::types::Value;

    #[test]
    fn or_of_two_names_binds_both_values() {
        let spec = ProductSpec::name_equals("a").or(ProductSpec::name_equals("b"));
        let mut binds = Vec::new();
        let sql = spec.to_sql(&mut binds);
        assert_eq!(sql, "(p.name = ?) OR (p.name = ?)");
        assert_eq!(
            binds,
            vec![Value::Text("a".to_string()), Value::Text("b".to_string())]
        );
    }

    #[test]
    fn empty_combinators_are_neutral() {
        let mut binds = Vec::new();
        assert_eq!(ProductSpec::And(Vec::new()).to_sql(&mut binds), "1 = 1");
        assert_eq!(ProductSpec::Or(Vec::new()).to_sql(&mut binds), "1 = 0");
        assert!(binds.is_empty());
    }
}
