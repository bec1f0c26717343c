//! Translation of [`FilterExpr`] into Pinecone's metadata filter dialect.

use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Comparator, FilterExpr, Operator};
use crate::schema::{AttributeType, MetadataSchema};

#[derive(Debug, Error, PartialEq)]
pub enum TranslateError {
    #[error("`not` can only wrap a single comparison")]
    UnsupportedNot,
}

pub struct PineconeTranslator {
    schema: MetadataSchema,
}

impl PineconeTranslator {
    pub fn new(schema: MetadataSchema) -> Self {
        Self { schema }
    }

    /// Returns `None` when nothing filterable remains, e.g. every comparison
    /// referenced an attribute outside the schema.
    pub fn translate(&self, filter: &FilterExpr) -> Result<Option<Value>, TranslateError> {
        match filter {
            FilterExpr::Comparison {
                comparator,
                attribute,
                value,
            } => Ok(self.comparison(*comparator, attribute, value)),
            FilterExpr::Operation {
                operator: Operator::Not,
                arguments,
            } => match arguments.as_slice() {
                [FilterExpr::Comparison {
                    comparator,
                    attribute,
                    value,
                }] => Ok(self.comparison(negate(*comparator), attribute, value)),
                _ => Err(TranslateError::UnsupportedNot),
            },
            FilterExpr::Operation {
                operator,
                arguments,
            } => {
                let mut translated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    if let Some(value) = self.translate(argument)? {
                        translated.push(value);
                    }
                }
                Ok(match translated.len() {
                    0 => None,
                    1 => translated.pop(),
                    _ => {
                        let mut clause = Map::new();
                        clause.insert(format!("${}", operator.as_str()), Value::Array(translated));
                        Some(Value::Object(clause))
                    }
                })
            }
        }
    }

    fn comparison(&self, comparator: Comparator, attribute: &str, value: &Value) -> Option<Value> {
        let Some(info) = self.schema.attribute(attribute) else {
            warn!("Dropping filter on unknown attribute `{}`", attribute);
            return None;
        };

        // List-valued metadata only matches membership operators.
        let (comparator, value) = match (info.kind, comparator, value) {
            (AttributeType::StringList | AttributeType::StringOrStringList, Comparator::Eq, v)
                if !v.is_array() =>
            {
                (Comparator::In, Value::Array(vec![v.clone()]))
            }
            (AttributeType::StringList | AttributeType::StringOrStringList, Comparator::Ne, v)
                if !v.is_array() =>
            {
                (Comparator::Nin, Value::Array(vec![v.clone()]))
            }
            (_, Comparator::In | Comparator::Nin, v) if !v.is_array() => {
                (comparator, Value::Array(vec![v.clone()]))
            }
            _ => (comparator, value.clone()),
        };

        let mut condition = Map::new();
        condition.insert(format!("${}", comparator.as_str()), value);
        let mut clause = Map::new();
        clause.insert(attribute.to_string(), Value::Object(condition));
        Some(Value::Object(clause))
    }
}

fn negate(comparator: Comparator) -> Comparator {
    match comparator {
        Comparator::Eq => Comparator::Ne,
        Comparator::Ne => Comparator::Eq,
        Comparator::Gt => Comparator::Lte,
        Comparator::Gte => Comparator::Lt,
        Comparator::Lt => Comparator::Gte,
        Comparator::Lte => Comparator::Gt,
        Comparator::In => Comparator::Nin,
        Comparator::Nin => Comparator::In,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_filter;
    use serde_json::json;

    fn translate(expr: &str) -> Result<Option<Value>, TranslateError> {
        let filter = parse_filter(expr).unwrap().unwrap();
        PineconeTranslator::new(MetadataSchema::musician_profile()).translate(&filter)
    }

    #[test]
    fn scalar_comparison_uses_dollar_operator() {
        assert_eq!(
            translate(r#"eq("location", "san mateo, ca")"#),
            Ok(Some(json!({ "location": { "$eq": "san mateo, ca" } })))
        );
    }

    #[test]
    fn equality_on_list_attribute_becomes_membership() {
        assert_eq!(
            translate(r#"eq("songs", "anthropology")"#),
            Ok(Some(json!({ "songs": { "$in": ["anthropology"] } })))
        );
        assert_eq!(
            translate(r#"ne("instruments", "trombone")"#),
            Ok(Some(json!({ "instruments": { "$nin": ["trombone"] } })))
        );
    }

    #[test]
    fn operations_nest() {
        assert_eq!(
            translate(r#"and(eq("instruments", "drums"), or(eq("name", "sam"), eq("name", "joe")))"#),
            Ok(Some(json!({
                "$and": [
                    { "instruments": { "$in": ["drums"] } },
                    { "$or": [
                        { "name": { "$eq": "sam" } },
                        { "name": { "$eq": "joe" } }
                    ] }
                ]
            })))
        );
    }

    #[test]
    fn unknown_attributes_are_dropped_and_operations_collapse() {
        assert_eq!(
            translate(r#"and(eq("genre", "bebop"), eq("experience", "pro"))"#),
            Ok(Some(json!({ "experience": { "$eq": "pro" } })))
        );
        assert_eq!(translate(r#"eq("genre", "bebop")"#), Ok(None));
    }

    #[test]
    fn not_negates_a_single_comparison() {
        assert_eq!(
            translate(r#"not(eq("location", "oakland"))"#),
            Ok(Some(json!({ "location": { "$ne": "oakland" } })))
        );
        assert_eq!(
            translate(r#"not(and(eq("name", "a"), eq("name", "b")))"#),
            Err(TranslateError::UnsupportedNot)
        );
    }
}
