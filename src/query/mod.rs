pub mod constructor;
pub mod parser;
pub mod translator;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use constructor::LlmQueryConstructor;
pub use parser::{parse_filter, ParseError};
pub use translator::PineconeTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Comparator {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "nin" => Self::Nin,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }
}

/// A metadata filter as produced by the query constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison {
        comparator: Comparator,
        attribute: String,
        value: Value,
    },
    Operation {
        operator: Operator,
        arguments: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn comparison(comparator: Comparator, attribute: &str, value: impl Into<Value>) -> Self {
        Self::Comparison {
            comparator,
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn operation(operator: Operator, arguments: Vec<FilterExpr>) -> Self {
        Self::Operation {
            operator,
            arguments,
        }
    }
}

/// Semantic search text plus an optional metadata filter.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    pub query: String,
    pub filter: Option<FilterExpr>,
}

impl StructuredQuery {
    /// A plain similarity search with no filter.
    pub fn unfiltered(query: &str) -> Self {
        Self {
            query: query.to_string(),
            filter: None,
        }
    }
}

/// Turns a natural-language question into a [`StructuredQuery`].
#[async_trait]
pub trait QueryConstructor: Send + Sync {
    async fn construct(&self, question: &str) -> Result<StructuredQuery>;
}
