//! Declarative description of the metadata the query constructor may filter on.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "list[string]")]
    StringList,
    #[serde(rename = "string or list[string]")]
    StringOrStringList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
}

impl AttributeInfo {
    pub fn new(name: &str, description: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema has no attributes")]
    Empty,
    #[error("attribute name must not be blank")]
    BlankName,
    #[error("attribute `{0}` is declared more than once")]
    Duplicate(String),
    #[error("document contents description must not be blank")]
    MissingContents,
}

/// Versioned set of filterable attributes together with a description of what a
/// stored document is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataSchema {
    pub version: u32,
    pub document_contents: String,
    pub attributes: Vec<AttributeInfo>,
}

impl MetadataSchema {
    pub const MUSICIAN_PROFILE_VERSION: u32 = 1;

    /// The schema of the musician index.
    pub fn musician_profile() -> Self {
        Self {
            version: Self::MUSICIAN_PROFILE_VERSION,
            document_contents: "Profile of a jazz musician.".to_string(),
            attributes: vec![
                AttributeInfo::new("name", "The name of the musician", AttributeType::String),
                AttributeInfo::new(
                    "experience",
                    "The experience level of the musician",
                    AttributeType::String,
                ),
                AttributeInfo::new(
                    "songs",
                    "The list of songs the musician can play",
                    AttributeType::StringList,
                ),
                AttributeInfo::new(
                    "instruments",
                    "The instruments the musician knows",
                    AttributeType::StringOrStringList,
                ),
                AttributeInfo::new(
                    "location",
                    "The location of the musician",
                    AttributeType::String,
                ),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.document_contents.trim().is_empty() {
            return Err(SchemaError::MissingContents);
        }
        if self.attributes.is_empty() {
            return Err(SchemaError::Empty);
        }
        for (i, attribute) in self.attributes.iter().enumerate() {
            if attribute.name.trim().is_empty() {
                return Err(SchemaError::BlankName);
            }
            if self.attributes[..i].iter().any(|a| a.name == attribute.name) {
                return Err(SchemaError::Duplicate(attribute.name.clone()));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Attributes keyed by name, in the JSON shape shown to the query constructor.
    pub fn attributes_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for attribute in &self.attributes {
            map.insert(
                attribute.name.clone(),
                serde_json::json!({
                    "description": attribute.description,
                    "type": attribute.kind,
                }),
            );
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn musician_profile_is_valid() {
        let schema = MetadataSchema::musician_profile();
        assert_eq!(schema.validate(), Ok(()));
        assert_eq!(schema.version, 1);

        let names: Vec<_> = schema.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["name", "experience", "songs", "instruments", "location"]);
        assert_eq!(
            schema.attribute("instruments").map(|a| a.kind),
            Some(AttributeType::StringOrStringList)
        );
        assert!(!schema.has_attribute("genre"));
    }

    #[test]
    fn duplicate_attributes_are_rejected() {
        let mut schema = MetadataSchema::musician_profile();
        schema
            .attributes
            .push(AttributeInfo::new("songs", "again", AttributeType::String));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::Duplicate("songs".to_string()))
        );
    }

    #[test]
    fn empty_and_blank_schemas_are_rejected() {
        let mut schema = MetadataSchema::musician_profile();
        schema.attributes.clear();
        assert_eq!(schema.validate(), Err(SchemaError::Empty));

        let mut schema = MetadataSchema::musician_profile();
        schema.attributes[0].name = " ".to_string();
        assert_eq!(schema.validate(), Err(SchemaError::BlankName));

        let mut schema = MetadataSchema::musician_profile();
        schema.document_contents.clear();
        assert_eq!(schema.validate(), Err(SchemaError::MissingContents));
    }

    #[test]
    fn attribute_types_serialize_to_query_language_names() {
        let json = MetadataSchema::musician_profile().attributes_json();
        assert_eq!(json["songs"]["type"], "list[string]");
        assert_eq!(json["instruments"]["type"], "string or list[string]");
        assert_eq!(json["name"]["description"], "The name of the musician");
    }
}
