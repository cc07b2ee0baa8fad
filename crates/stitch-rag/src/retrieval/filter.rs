//! Metadata filters applied during vector search

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::{Metadata, META_FILETYPE, META_SOURCE};

/// Description of a filterable metadata attribute, shown to the self-query LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub attr_type: String,
}

impl AttributeInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        attr_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            attr_type: attr_type.into(),
        }
    }

    /// `source` and `filetype`, attached to every chunk at ingestion
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(META_SOURCE, "The source or URL of the document", "string"),
            Self::new(META_FILETYPE, "The file type of the document", "string"),
        ]
    }
}

/// Boolean filter over chunk metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MetadataFilter {
    Eq { attribute: String, value: Value },
    Ne { attribute: String, value: Value },
    Gt { attribute: String, value: Value },
    Gte { attribute: String, value: Value },
    Lt { attribute: String, value: Value },
    Lte { attribute: String, value: Value },
    In { attribute: String, values: Vec<Value> },
    And { filters: Vec<MetadataFilter> },
    Or { filters: Vec<MetadataFilter> },
    Not { filter: Box<MetadataFilter> },
}

impl MetadataFilter {
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<MetadataFilter>) -> Self {
        Self::And { filters }
    }

    pub fn or(filters: Vec<MetadataFilter>) -> Self {
        Self::Or { filters }
    }

    pub fn negate(filter: MetadataFilter) -> Self {
        Self::Not {
            filter: Box::new(filter),
        }
    }

    /// Evaluate against a metadata map.
    ///
    /// A missing attribute never satisfies a comparison, including `ne`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { attribute, value } => metadata
                .get(attribute)
                .map(|v| values_equal(v, value))
                .unwrap_or(false),
            Self::Ne { attribute, value } => metadata
                .get(attribute)
                .map(|v| !values_equal(v, value))
                .unwrap_or(false),
            Self::Gt { attribute, value } => compare_attr(metadata, attribute, value, |o| o.is_gt()),
            Self::Gte { attribute, value } => compare_attr(metadata, attribute, value, |o| o.is_ge()),
            Self::Lt { attribute, value } => compare_attr(metadata, attribute, value, |o| o.is_lt()),
            Self::Lte { attribute, value } => compare_attr(metadata, attribute, value, |o| o.is_le()),
            Self::In { attribute, values } => metadata
                .get(attribute)
                .map(|v| values.iter().any(|candidate| values_equal(v, candidate)))
                .unwrap_or(false),
            Self::And { filters } => filters.iter().all(|f| f.matches(metadata)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(metadata)),
            Self::Not { filter } => !filter.matches(metadata),
        }
    }

    /// Every attribute name referenced anywhere in the filter
    pub fn attributes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_attributes(&mut names);
        names
    }

    fn collect_attributes<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Eq { attribute, .. }
            | Self::Ne { attribute, .. }
            | Self::Gt { attribute, .. }
            | Self::Gte { attribute, .. }
            | Self::Lt { attribute, .. }
            | Self::Lte { attribute, .. }
            | Self::In { attribute, .. } => names.push(attribute),
            Self::And { filters } | Self::Or { filters } => {
                for f in filters {
                    f.collect_attributes(names);
                }
            }
            Self::Not { filter } => filter.collect_attributes(names),
        }
    }

    /// Fail if the filter names an attribute outside `known`
    pub fn validate(&self, known: &[AttributeInfo]) -> Result<()> {
        for name in self.attributes() {
            if !known.iter().any(|a| a.name == name) {
                return Err(Error::BadRequest(format!("Unknown filter attribute: {}", name)));
            }
        }
        Ok(())
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_attr(
    metadata: &Metadata,
    attribute: &str,
    value: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    metadata
        .get(attribute)
        .and_then(|v| compare(v, value))
        .map(accept)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_eq_and_in() {
        let m = meta(&[("filetype", json!("pdf")), ("chunk_index", json!(3))]);

        assert!(MetadataFilter::eq("filetype", "pdf").matches(&m));
        assert!(!MetadataFilter::eq("filetype", "html").matches(&m));
        assert!(MetadataFilter::eq("chunk_index", 3.0).matches(&m));

        let f = MetadataFilter::In {
            attribute: "filetype".into(),
            values: vec![json!("docx"), json!("pdf")],
        };
        assert!(f.matches(&m));
    }

    #[test]
    fn test_numeric_and_string_ordering() {
        let m = meta(&[("year", json!(2021)), ("source", json!("b.txt"))]);

        let gt = MetadataFilter::Gt { attribute: "year".into(), value: json!(2020) };
        let lte = MetadataFilter::Lte { attribute: "year".into(), value: json!(2020.5) };
        let lt_str = MetadataFilter::Lt { attribute: "source".into(), value: json!("c") };
        let mixed = MetadataFilter::Gt { attribute: "year".into(), value: json!("2000") };

        assert!(gt.matches(&m));
        assert!(!lte.matches(&m));
        assert!(lt_str.matches(&m));
        assert!(!mixed.matches(&m));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let m = Metadata::new();
        assert!(!MetadataFilter::eq("filetype", "pdf").matches(&m));
        assert!(!MetadataFilter::Ne { attribute: "filetype".into(), value: json!("pdf") }.matches(&m));
        assert!(!MetadataFilter::Gte { attribute: "n".into(), value: json!(0) }.matches(&m));
    }

    #[test]
    fn test_boolean_combinators() {
        let m = meta(&[("filetype", json!("pdf")), ("source", json!("a"))]);

        let both = MetadataFilter::and(vec![
            MetadataFilter::eq("filetype", "pdf"),
            MetadataFilter::eq("source", "a"),
        ]);
        let either = MetadataFilter::or(vec![
            MetadataFilter::eq("filetype", "html"),
            MetadataFilter::eq("source", "a"),
        ]);
        let not_pdf = MetadataFilter::negate(MetadataFilter::eq("filetype", "pdf"));

        assert!(both.matches(&m));
        assert!(either.matches(&m));
        assert!(!not_pdf.matches(&m));
        assert!(MetadataFilter::and(vec![]).matches(&m));
        assert!(!MetadataFilter::or(vec![]).matches(&m));
    }

    #[test]
    fn test_deserialize_tagged_json() {
        let f: MetadataFilter = serde_json::from_value(json!({
            "op": "and",
            "filters": [
                {"op": "eq", "attribute": "filetype", "value": "pdf"},
                {"op": "not", "filter": {"op": "eq", "attribute": "source", "value": "x"}}
            ]
        }))
        .unwrap();

        assert_eq!(f.attributes(), vec!["filetype", "source"]);
        assert!(f.validate(&AttributeInfo::defaults()).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_attribute() {
        let f = MetadataFilter::eq("author", "me");
        assert!(f.validate(&AttributeInfo::defaults()).is_err());
    }
}
