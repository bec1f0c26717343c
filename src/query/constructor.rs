use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use super::{parse_filter, QueryConstructor, StructuredQuery};
use crate::model::CompletionModel;
use crate::schema::MetadataSchema;

const INSTRUCTIONS: &str = r#"Your goal is to structure the user's query to match the request schema provided below.

<< Structured Request Schema >>
When responding use a markdown code snippet with a JSON object formatted in the following schema:

```json
{
    "query": string \ text string to compare to document contents
    "filter": string \ logical condition statement for filtering documents
}
```

The query string should contain only text that is expected to match the contents of documents. Any conditions in the filter should not be mentioned in the query as well.

A logical condition statement is composed of one or more comparison and logical operation statements.

A comparison statement takes the form: `comp(attr, val)`:
- `comp` (eq | ne | gt | gte | lt | lte | in | nin): comparator
- `attr` (string): name of attribute to apply the comparison to
- `val` (string or list of strings): is the comparison value

A logical operation statement takes the form `op(statement1, statement2, ...)`:
- `op` (and | or | not): logical operator
- `statement1`, `statement2`, ... (comparison statements or logical operation statements): one or more statements to apply the operation to

Make sure that you only use the comparators and logical operators listed above and no others.
Make sure that filters only refer to attributes that exist in the data source.
Make sure that filters only use the attributed names with its function names if there are functions applied on them.
Make sure that filters take into account the descriptions of attributes and only make comparisons that are feasible given the type of data being stored.
Make sure that filters are only used as needed. If there are no filters that should be applied return "NO_FILTER" for the filter value."#;

const EXAMPLE: &str = r#"<< Example 1. >>
Data Source:
```json
{
    "content": "Profile of a jazz musician.",
    "attributes": {
        "instruments": {"description": "The instruments the musician knows", "type": "string or list[string]"},
        "location": {"description": "The location of the musician", "type": "string"}
    }
}
```

User Query:
trombone players in oakland who know donna lee

Structured Request:
```json
{
    "query": "donna lee",
    "filter": "and(eq(\"instruments\", \"trombone\"), eq(\"location\", \"oakland\"))"
}
```"#;

#[derive(Debug, Deserialize)]
struct RawStructuredQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filter: Option<String>,
}

/// Builds structured queries by prompting a completion model with the schema.
pub struct LlmQueryConstructor {
    llm: Arc<dyn CompletionModel>,
    schema: MetadataSchema,
}

impl LlmQueryConstructor {
    pub fn new(llm: Arc<dyn CompletionModel>, schema: MetadataSchema) -> Self {
        Self { llm, schema }
    }

    pub fn prompt(&self, question: &str) -> String {
        let data_source = serde_json::json!({
            "content": self.schema.document_contents,
            "attributes": self.schema.attributes_json(),
        });
        let data_source =
            serde_json::to_string_pretty(&data_source).unwrap_or_else(|_| data_source.to_string());

        format!(
            "{INSTRUCTIONS}\n\n{EXAMPLE}\n\n<< Example 2. >>\nData Source:\n```json\n{data_source}\n```\n\nUser Query:\n{question}\n\nStructured Request:\n"
        )
    }
}

/// Parses the model's answer, tolerating a surrounding markdown fence.
pub fn parse_output(output: &str) -> Result<StructuredQuery> {
    let json = extract_json(output).ok_or_else(|| anyhow!("No JSON object in query constructor output"))?;
    let raw: RawStructuredQuery = serde_json::from_str(json)
        .with_context(|| format!("Invalid structured request: {}", json))?;

    let filter = match raw.filter.as_deref() {
        Some(filter) => parse_filter(filter).with_context(|| format!("Invalid filter `{}`", filter))?,
        None => None,
    };

    // A filter-only request leaves nothing for similarity search to match on.
    let query = if raw.query.trim().is_empty() {
        " ".to_string()
    } else {
        raw.query
    };

    Ok(StructuredQuery { query, filter })
}

fn extract_json(output: &str) -> Option<&str> {
    let body = match output.find("```") {
        Some(fence) => {
            let after = &output[fence + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => output,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

#[async_trait]
impl QueryConstructor for LlmQueryConstructor {
    async fn construct(&self, question: &str) -> Result<StructuredQuery> {
        let output = self.llm.complete(&self.prompt(question)).await?;
        debug!("Query constructor output: {}", output);
        parse_output(&output)
    }
}
