//! Logical content-model schema as authored in a content repository.
//!
//! The JSON shape mirrors the schema export produced by the content tooling:
//! a list of collections, each mapping field names to typed elements.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default schema file name resolved relative to the project root.
pub const SCHEMA_FILE_NAME: &str = "mimsy.schema.json";

/// Project configuration file name at the root of a content repository.
pub const PROJECT_CONFIG_FILE_NAME: &str = "mimsy.config.json";

/// A complete logical schema: the set of collections in a content project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collections declared by the project.
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// Export timestamp written by the schema tooling, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Schema {
    /// Parse a schema from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the document is not a
    /// valid schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the schema to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Look up a collection by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections
            .iter()
            .find(|collection| collection.name == name)
    }

    /// Whether two schemas declare the same collections.
    ///
    /// The export timestamp is ignored so that re-exporting an unchanged
    /// schema is recognised as identical.
    #[must_use]
    pub fn same_collections(&self, other: &Self) -> bool {
        self.collections == other.collections
    }
}

/// A named collection and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Collection name, also used as the base table name.
    pub name: String,
    /// Field definitions keyed by field name.
    #[serde(default)]
    pub schema: BTreeMap<String, SchemaElement>,
    /// Whether the collection holds a single global document.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_global: bool,
}

impl Collection {
    /// Look up a field definition by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaElement> {
        self.schema.get(name)
    }

    /// Iterate over relation fields in name order.
    pub fn relation_fields(&self) -> impl Iterator<Item = (&String, &SchemaElement)> {
        self.schema.iter().filter(|(_, element)| element.is_relation())
    }
}

/// Declared type of a field.
///
/// Unknown tags are preserved as [`FieldType::Unsupported`] so that parsing
/// always succeeds and compilation reports the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Short text stored as `varchar`.
    String,
    /// Structured rich text stored as `jsonb`.
    RichText,
    /// Creation timestamp defaulting to the insert time.
    CreatedAt,
    /// Many-to-one reference to another collection.
    Relation,
    /// Many-to-many reference to another collection.
    MultiRelation,
    /// Any tag outside the supported set.
    Unsupported(String),
}

impl FieldType {
    /// Wire tag for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::RichText => "rich_text",
            Self::CreatedAt => "created_at",
            Self::Relation => "relation",
            Self::MultiRelation => "multi_relation",
            Self::Unsupported(tag) => tag.as_str(),
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => Self::String,
            "rich_text" => Self::RichText,
            "created_at" => Self::CreatedAt,
            "relation" => Self::Relation,
            "multi_relation" => Self::MultiRelation,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Unsupported(tag) => tag,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElement {
    /// Declared field type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Target collection for relation types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<String>,
    /// Optional description and constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SchemaElementOptions>,
}

impl SchemaElement {
    /// Create an element of the given type with no options.
    #[must_use]
    pub const fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            relates_to: None,
            options: None,
        }
    }

    /// Set the relation target.
    #[must_use]
    pub fn relating_to(mut self, target: impl Into<String>) -> Self {
        self.relates_to = Some(target.into());
        self
    }

    /// Mark the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        let options = self.options.get_or_insert_with(SchemaElementOptions::default);
        options
            .constraints
            .get_or_insert_with(SchemaElementConstraints::default)
            .required = true;
        self
    }

    /// Whether the field references another collection.
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(
            self.field_type,
            FieldType::Relation | FieldType::MultiRelation
        )
    }

    /// Whether the field carries a `required` constraint.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|options| options.constraints.as_ref())
            .is_some_and(|constraints| constraints.required)
    }

    /// Field description, or an empty string.
    #[must_use]
    pub fn description(&self) -> &str {
        self.options
            .as_ref()
            .and_then(|options| options.description.as_deref())
            .unwrap_or_default()
    }
}

/// Presentation and validation options for a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElementOptions {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<SchemaElementConstraints>,
}

/// Value constraints declared on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElementConstraints {
    /// Whether a value must be present.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Minimum length for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    /// Maximum length for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Project configuration read from `mimsy.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Explicit path to the schema file.
    #[serde(rename = "manifestPath", default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
    /// Directory holding the default schema file.
    #[serde(rename = "basePath", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl ProjectConfig {
    /// Parse the project configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the document is not a
    /// valid configuration object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Resolve the schema file path.
    ///
    /// Precedence is the explicit schema path, then `<basePath>/mimsy.schema.json`,
    /// then `<project_prefix>mimsy.schema.json`. Empty values count as absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use content_schema::ProjectConfig;
    ///
    /// let config = ProjectConfig {
    ///     schema_path: None,
    ///     base_path: Some("cms".to_owned()),
    /// };
    /// assert_eq!(config.schema_file_path(""), "cms/mimsy.schema.json");
    /// ```
    #[must_use]
    pub fn schema_file_path(&self, project_prefix: &str) -> String {
        let non_empty = |value: &Option<String>| value.clone().filter(|path| !path.is_empty());
        match (non_empty(&self.schema_path), non_empty(&self.base_path)) {
            (Some(schema_path), _) => schema_path,
            (None, Some(base_path)) => format!("{base_path}/{SCHEMA_FILE_NAME}"),
            (None, None) => format!("{project_prefix}{SCHEMA_FILE_NAME}"),
        }
    }
}
