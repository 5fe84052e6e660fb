//! Storage-level SQL intermediate representation.
//!
//! Tables, columns and constraints produced by the compiler. Constraint
//! identity is the derived [`Constraint::name`], which the differ uses to
//! match constraints across snapshots.

use serde::{Deserialize, Serialize};

use crate::naming::{quote_identifier, strip_schema_qualifier};

/// A compiled set of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSchema {
    /// Tables in compilation order.
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl SqlSchema {
    /// Parse an IR snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed snapshots,
    /// including constraints with an unknown `type` tag.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the IR snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Look up a table by exact name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// A table with its columns and table-level constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Unqualified table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Constraints in declaration order.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Look up a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Look up a constraint by derived name.
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|constraint| constraint.name() == name)
    }

    /// Render the table as a `CREATE TABLE` statement.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.create_statement(&quote_identifier(&self.name))
    }

    /// `CREATE TABLE` statement addressing the table as `target`.
    pub(crate) fn create_statement(&self, target: &str) -> String {
        let body: Vec<String> = self
            .columns
            .iter()
            .map(Column::to_sql)
            .chain(self.constraints.iter().map(Constraint::to_sql))
            .map(|line| format!("  {line}"))
            .collect();
        format!("CREATE TABLE {target} (\n{}\n);", body.join(",\n"))
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Postgres type expression, for example `varchar(60)`.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column is the table's primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Whether the column rejects `NULL`.
    #[serde(default)]
    pub is_not_null: bool,
    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Expression deriving the column value from other tables.
    ///
    /// Recorded for snapshot comparison only. Postgres rejects sub-selects
    /// in generated columns, so the rendered DDL declares a plain column and
    /// writers keep it in step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_as: Option<String>,
}

impl Column {
    /// Create a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            is_primary_key: false,
            is_not_null: false,
            default_value: None,
            generated_as: None,
        }
    }

    /// Mark the column `NOT NULL` when `is_not_null` holds.
    #[must_use]
    pub const fn not_null(mut self, is_not_null: bool) -> Self {
        self.is_not_null = is_not_null;
        self
    }

    /// Mark the column as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Set the default value expression.
    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Set the generation expression.
    #[must_use]
    pub fn generated_as(mut self, expression: impl Into<String>) -> Self {
        self.generated_as = Some(expression.into());
        self
    }

    /// Render the column definition clause.
    ///
    /// The generation expression is not part of the clause.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.column_type);
        if self.is_not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(default_value);
        }
        sql
    }
}

/// Table-level constraint.
///
/// Serialized with an explicit discriminant so that the variant survives a
/// storage round trip; the derived name alone does not identify the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "constraint", rename_all = "snake_case")]
pub enum Constraint {
    /// Single-column uniqueness.
    Unique {
        /// Owning table.
        table: String,
        /// Unique column.
        key: String,
    },
    /// Single-column primary key.
    PrimaryKey {
        /// Owning table.
        table: String,
        /// Key column.
        key: String,
    },
    /// Multi-column primary key.
    CompositePrimaryKey {
        /// Owning table.
        table: String,
        /// Key columns in order.
        columns: Vec<String>,
    },
    /// Foreign key to another table's column.
    ForeignKey {
        /// Owning table.
        table: String,
        /// Referencing column.
        column: String,
        /// Schema-qualified referenced table.
        reference_table: String,
        /// Referenced column.
        reference_column: String,
    },
}

impl Constraint {
    /// Deterministic constraint name derived from the variant's fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use content_schema::Constraint;
    ///
    /// let fk = Constraint::ForeignKey {
    ///     table: "comments".to_owned(),
    ///     column: "post_id".to_owned(),
    ///     reference_table: "mimsy_collections.\"posts\"".to_owned(),
    ///     reference_column: "id".to_owned(),
    /// };
    /// assert_eq!(fk.name(), "fk__comments__post_id__posts");
    /// ```
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Unique { table, key } => format!("uq__{table}__{key}"),
            Self::PrimaryKey { table, .. } | Self::CompositePrimaryKey { table, .. } => {
                format!("pk__{table}")
            }
            Self::ForeignKey {
                table,
                column,
                reference_table,
                ..
            } => format!(
                "fk__{table}__{column}__{}",
                strip_schema_qualifier(reference_table)
            ),
        }
    }

    /// Table owning the constraint.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Unique { table, .. }
            | Self::PrimaryKey { table, .. }
            | Self::CompositePrimaryKey { table, .. }
            | Self::ForeignKey { table, .. } => table,
        }
    }

    /// Columns covered by the constraint on the owning table.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        match self {
            Self::Unique { key, .. } | Self::PrimaryKey { key, .. } => vec![key.clone()],
            Self::CompositePrimaryKey { columns, .. } => columns.clone(),
            Self::ForeignKey { column, .. } => vec![column.clone()],
        }
    }

    /// Whether the constraint is a primary key of either shape.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        matches!(
            self,
            Self::PrimaryKey { .. } | Self::CompositePrimaryKey { .. }
        )
    }

    /// Whether the constraint references another table.
    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey { .. })
    }

    /// Render the constraint clause used inside `CREATE TABLE` or
    /// `ALTER TABLE ... ADD`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let name = quote_identifier(&self.name());
        match self {
            Self::Unique { key, .. } => {
                format!("CONSTRAINT {name} UNIQUE ({})", quote_identifier(key))
            }
            Self::PrimaryKey { key, .. } => {
                format!("CONSTRAINT {name} PRIMARY KEY ({})", quote_identifier(key))
            }
            Self::CompositePrimaryKey { columns, .. } => {
                let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
                format!("CONSTRAINT {name} PRIMARY KEY ({})", quoted.join(", "))
            }
            Self::ForeignKey {
                column,
                reference_table,
                reference_column,
                ..
            } => format!(
                "CONSTRAINT {name} FOREIGN KEY ({}) REFERENCES {reference_table} ({})",
                quote_identifier(column),
                quote_identifier(reference_column)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for IR naming, rendering and serialization.

    use super::*;
    use rstest::rstest;

    fn unique(table: &str, key: &str) -> Constraint {
        Constraint::Unique {
            table: table.to_owned(),
            key: key.to_owned(),
        }
    }

    #[rstest]
    #[case(unique("posts", "slug"), "uq__posts__slug")]
    #[case(
        Constraint::PrimaryKey { table: "posts".to_owned(), key: "id".to_owned() },
        "pk__posts"
    )]
    #[case(
        Constraint::CompositePrimaryKey {
            table: "posts_tags_relation_tags".to_owned(),
            columns: vec!["posts_id".to_owned(), "tags_id".to_owned()],
        },
        "pk__posts_tags_relation_tags"
    )]
    #[case(
        Constraint::ForeignKey {
            table: "posts".to_owned(),
            column: "author_id".to_owned(),
            reference_table: "mimsy_internal.\"user\"".to_owned(),
            reference_column: "id".to_owned(),
        },
        "fk__posts__author_id__user"
    )]
    fn derived_names(#[case] constraint: Constraint, #[case] expected: &str) {
        assert_eq!(constraint.name(), expected);
    }

    #[rstest]
    fn foreign_key_sql_keeps_qualified_reference() {
        let constraint = Constraint::ForeignKey {
            table: "posts".to_owned(),
            column: "author_id".to_owned(),
            reference_table: "mimsy_internal.\"user\"".to_owned(),
            reference_column: "id".to_owned(),
        };
        assert_eq!(
            constraint.to_sql(),
            "CONSTRAINT \"fk__posts__author_id__user\" FOREIGN KEY (\"author_id\") \
             REFERENCES mimsy_internal.\"user\" (\"id\")"
        );
    }

    #[rstest]
    fn constraints_serialize_with_type_tag() {
        let json = serde_json::to_value(unique("posts", "slug")).expect("serializes");
        assert_eq!(json["type"], "unique");
        assert_eq!(json["constraint"]["key"], "slug");
    }

    #[rstest]
    fn unknown_constraint_tag_is_rejected() {
        let json = r#"{"tables":[{"name":"posts","columns":[],"constraints":[
            {"type":"check","constraint":{"table":"posts"}}
        ]}]}"#;
        assert!(SqlSchema::from_json(json).is_err());
    }

    #[rstest]
    fn column_rendering_includes_modifiers() {
        let column = Column::new("created", "timestamptz")
            .not_null(true)
            .with_default("CURRENT_TIMESTAMP");
        assert_eq!(
            column.to_sql(),
            "\"created\" timestamptz NOT NULL DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[rstest]
    fn derived_columns_render_as_plain_columns() {
        let column = Column::new("author_slug", "varchar")
            .generated_as("SELECT slug FROM mimsy_internal.\"user\" WHERE id = \"author_id\"");
        assert_eq!(column.to_sql(), "\"author_slug\" varchar");
        assert!(column.generated_as.is_some());
    }

    #[rstest]
    fn table_rendering_lists_columns_then_constraints() {
        let table = Table {
            name: "posts".to_owned(),
            columns: vec![Column::new("id", "bigint").primary_key().not_null(true)],
            constraints: vec![Constraint::PrimaryKey {
                table: "posts".to_owned(),
                key: "id".to_owned(),
            }],
        };
        assert_eq!(
            table.to_sql(),
            "CREATE TABLE \"posts\" (\n  \"id\" bigint NOT NULL,\n  \
             CONSTRAINT \"pk__posts\" PRIMARY KEY (\"id\")\n);"
        );
    }

    #[rstest]
    fn lookups_match_exact_names() {
        let schema = SqlSchema {
            tables: vec![Table {
                name: "posts".to_owned(),
                columns: vec![Column::new("slug", "varchar(60)")],
                constraints: vec![unique("posts", "slug")],
            }],
        };
        let table = schema.table("posts").expect("table present");
        assert!(table.column("slug").is_some());
        assert!(table.constraint("uq__posts__slug").is_some());
        assert!(schema.table("Posts").is_none());
    }
}
