//! Filter expressions for remote entity queries.
//!
//! A [`Filter`] is a conjunction of field comparisons. It is sent to the
//! remote as JSON and evaluated locally by in-memory stores.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Contains substring (for strings)
    Contains,
    /// In list of values
    In,
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value.into())
    }

    /// Evaluate against a JSON record. A missing field only satisfies `Ne`.
    pub fn matches(&self, record: &Value) -> bool {
        let actual = record.get(&self.field);
        match self.operator {
            FilterOperator::Eq => actual == Some(&self.value),
            FilterOperator::Ne => actual != Some(&self.value),
            FilterOperator::Contains => match (actual, &self.value) {
                (Some(Value::String(haystack)), Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
            FilterOperator::In => match (&self.value, actual) {
                (Value::Array(options), Some(actual)) => options.contains(actual),
                _ => false,
            },
        }
    }
}

/// Conjunction of [`FilterExpr`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Vec<FilterExpr>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, expr: FilterExpr) -> Self {
        self.0.push(expr);
        self
    }

    pub fn exprs(&self) -> &[FilterExpr] {
        &self.0
    }

    /// Drop every comparison on `field`.
    pub fn without_field(mut self, field: &str) -> Self {
        self.0.retain(|expr| expr.field != field);
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.0.iter().all(|expr| expr.matches(record))
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Filter(vec![expr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_conjunction() {
        let filter = Filter::new()
            .and(FilterExpr::eq("tenant_id", "A"))
            .and(FilterExpr::contains("name", "bloco"));
        assert!(filter.matches(&json!({"tenant_id": "A", "name": "bloco 2"})));
        assert!(!filter.matches(&json!({"tenant_id": "B", "name": "bloco 2"})));
        assert!(!filter.matches(&json!({"name": "bloco 2"})));
    }

    #[test]
    fn test_in_and_ne_operators() {
        let expr = FilterExpr::new("status", FilterOperator::In, json!(["pendente", "inativo"]));
        assert!(expr.matches(&json!({"status": "inativo"})));
        assert!(!expr.matches(&json!({"status": "aprovado"})));

        let expr = FilterExpr::new("status", FilterOperator::Ne, json!("aprovado"));
        assert!(expr.matches(&json!({})));
    }

    #[test]
    fn test_filter_serializes_as_list() {
        let filter = Filter::from(FilterExpr::eq("tenant_id", "A"));
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            json!([{"field": "tenant_id", "operator": "eq", "value": "A"}])
        );
    }
}
