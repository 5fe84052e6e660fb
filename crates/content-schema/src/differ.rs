//! Compare two SQL IR snapshots and emit migration operations.
//!
//! Output order is emission order and always creates before it drops:
//!
//! 1. table creation, column addition and column alteration
//! 2. constraint creation: foreign keys of new tables, then anything
//!    missing on tables present in both snapshots
//! 3. table drops
//! 4. column drops
//! 5. unique and foreign-key constraint drops
//!
//! New tables are created without their foreign keys so that a reference to
//! a table declared later in the snapshot resolves once pass 2 runs.
//!
//! Only the first differing aspect of a column (type, then nullability, then
//! default) is emitted per call. A column with several changes converges over
//! successive diff/apply cycles. Primary keys are never dropped and columns
//! are never considered renamed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ir::{Column, Constraint, SqlSchema, Table};
use crate::naming::quote_identifier;

/// A single schema change understood by the migration engine.
///
/// The serialized form follows the engine's externally tagged operation
/// format, for example `{"add_column": {"table": "posts", ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Create a table with its columns and constraints.
    CreateTable {
        /// Table name.
        name: String,
        /// Column definitions.
        columns: Vec<Column>,
        /// Table-level constraints.
        constraints: Vec<Constraint>,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// New column.
        column: Column,
    },
    /// Change one aspect of an existing column.
    AlterColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The aspect being changed.
        change: ColumnChange,
    },
    /// Remove a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Remove a table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Add a constraint to an existing table.
    CreateConstraint {
        /// The constraint to add.
        constraint: Constraint,
        /// Backfill expression per column while old and new shapes coexist.
        up: BTreeMap<String, String>,
        /// Reverse backfill expression per column.
        down: BTreeMap<String, String>,
    },
    /// Remove a unique or foreign-key constraint.
    DropMultiColumnConstraint {
        /// Table name.
        table: String,
        /// Derived constraint name.
        name: String,
        /// Backfill expression per column while old and new shapes coexist.
        up: BTreeMap<String, String>,
        /// Reverse backfill expression per column.
        down: BTreeMap<String, String>,
    },
}

/// The single column aspect changed by [`Operation::AlterColumn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChange {
    /// New column type.
    Type(String),
    /// New nullability; `true` allows `NULL`.
    Nullable(bool),
    /// New default expression, or `None` to drop the default.
    Default(Option<String>),
}

impl Operation {
    /// Table the operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { name, .. } | Self::DropTable { name } => name,
            Self::AddColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::DropMultiColumnConstraint { table, .. } => table,
            Self::CreateConstraint { constraint, .. } => constraint.table(),
        }
    }

    /// Whether the operation removes structure and belongs to the contract
    /// phase of an expand/contract migration.
    #[must_use]
    pub const fn is_contracting(&self) -> bool {
        matches!(
            self,
            Self::DropColumn { .. } | Self::DropTable { .. } | Self::DropMultiColumnConstraint { .. }
        )
    }

    /// Render the operation as DDL against tables in `schema`.
    ///
    /// Table drops cascade to foreign keys that reference the table, and
    /// constraint drops tolerate a constraint already removed along with its
    /// column or referenced table earlier in the same migration.
    ///
    /// # Examples
    ///
    /// ```
    /// use content_schema::Operation;
    ///
    /// let op = Operation::DropColumn {
    ///     table: "posts".to_owned(),
    ///     column: "summary".to_owned(),
    /// };
    /// assert_eq!(
    ///     op.to_sql("mimsy_collections"),
    ///     "ALTER TABLE \"mimsy_collections\".\"posts\" DROP COLUMN \"summary\";"
    /// );
    /// ```
    #[must_use]
    pub fn to_sql(&self, schema: &str) -> String {
        let target = format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(self.table())
        );
        match self {
            Self::CreateTable {
                name,
                columns,
                constraints,
            } => Table {
                name: name.clone(),
                columns: columns.clone(),
                constraints: constraints.clone(),
            }
            .create_statement(&target),
            Self::AddColumn { column, .. } => {
                format!("ALTER TABLE {target} ADD COLUMN {};", column.to_sql())
            }
            Self::AlterColumn { column, change, .. } => {
                let quoted = quote_identifier(column);
                let clause = match change {
                    ColumnChange::Type(new_type) => {
                        format!("TYPE {new_type} USING {quoted}::{new_type}")
                    }
                    ColumnChange::Nullable(true) => "DROP NOT NULL".to_owned(),
                    ColumnChange::Nullable(false) => "SET NOT NULL".to_owned(),
                    ColumnChange::Default(Some(value)) => format!("SET DEFAULT {value}"),
                    ColumnChange::Default(None) => "DROP DEFAULT".to_owned(),
                };
                format!("ALTER TABLE {target} ALTER COLUMN {quoted} {clause};")
            }
            Self::DropColumn { column, .. } => {
                format!("ALTER TABLE {target} DROP COLUMN {};", quote_identifier(column))
            }
            Self::DropTable { .. } => format!("DROP TABLE {target} CASCADE;"),
            Self::CreateConstraint { constraint, .. } => {
                format!("ALTER TABLE {target} ADD {};", constraint.to_sql())
            }
            Self::DropMultiColumnConstraint { name, .. } => {
                format!(
                    "ALTER TABLE {target} DROP CONSTRAINT IF EXISTS {};",
                    quote_identifier(name)
                )
            }
        }
    }
}

/// A named batch of operations submitted to the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Unique migration name.
    pub name: String,
    /// Operations in application order.
    pub operations: Vec<Operation>,
}

impl Migration {
    /// Migration name for a content commit: `"<message> (hash:<sha prefix>)"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use content_schema::Migration;
    ///
    /// assert_eq!(
    ///     Migration::name_for_commit("Add posts", "0123456789abcdef"),
    ///     "Add posts (hash:01234567)"
    /// );
    /// ```
    #[must_use]
    pub fn name_for_commit(message: &str, sha: &str) -> String {
        let short = sha.get(..8).unwrap_or(sha);
        format!("{message} (hash:{short})")
    }
}

fn identity_map(columns: &[String]) -> BTreeMap<String, String> {
    columns
        .iter()
        .map(|column| (column.clone(), column.clone()))
        .collect()
}

/// Compare `old` against `new` and return the operations that move a
/// database from `old` to `new`.
///
/// # Examples
///
/// ```
/// use content_schema::{Column, Operation, SqlSchema, Table, diff};
///
/// let users = |columns: Vec<Column>| SqlSchema {
///     tables: vec![Table { name: "users".to_owned(), columns, constraints: vec![] }],
/// };
/// let old = users(vec![Column::new("id", "bigint"), Column::new("name", "varchar")]);
/// let new = users(vec![
///     Column::new("id", "bigint"),
///     Column::new("name", "varchar"),
///     Column::new("email", "varchar"),
/// ]);
///
/// let operations = diff(&old, &new);
/// assert!(matches!(
///     operations.as_slice(),
///     [Operation::AddColumn { table, column }] if table == "users" && column.name == "email"
/// ));
/// ```
#[must_use]
pub fn diff(old: &SqlSchema, new: &SqlSchema) -> Vec<Operation> {
    let mut operations = Vec::new();
    create_and_alter(old, new, &mut operations);
    create_constraints(old, new, &mut operations);
    drop_tables(old, new, &mut operations);
    drop_columns(old, new, &mut operations);
    drop_constraints(old, new, &mut operations);
    operations
}

/// Tables present in both snapshots, as `(old, new)` pairs in `new` order.
fn shared_tables<'a>(
    old: &'a SqlSchema,
    new: &'a SqlSchema,
) -> impl Iterator<Item = (&'a Table, &'a Table)> {
    new.tables
        .iter()
        .filter_map(|new_table| old.table(&new_table.name).map(|old_table| (old_table, new_table)))
}

/// Tables present in both snapshots, as `(old, new)` pairs in `old` order.
fn retained_tables<'a>(
    old: &'a SqlSchema,
    new: &'a SqlSchema,
) -> impl Iterator<Item = (&'a Table, &'a Table)> {
    old.tables
        .iter()
        .filter_map(|old_table| new.table(&old_table.name).map(|new_table| (old_table, new_table)))
}

fn create_and_alter(old: &SqlSchema, new: &SqlSchema, operations: &mut Vec<Operation>) {
    for table in &new.tables {
        let Some(old_table) = old.table(&table.name) else {
            operations.push(Operation::CreateTable {
                name: table.name.clone(),
                columns: table.columns.clone(),
                constraints: table
                    .constraints
                    .iter()
                    .filter(|constraint| !constraint.is_foreign_key())
                    .cloned()
                    .collect(),
            });
            continue;
        };

        for column in &table.columns {
            match old_table.column(&column.name) {
                None => operations.push(Operation::AddColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                }),
                Some(old_column) => {
                    if let Some(change) = first_column_change(old_column, column) {
                        operations.push(Operation::AlterColumn {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            change,
                        });
                    }
                }
            }
        }
    }
}

fn first_column_change(old: &Column, new: &Column) -> Option<ColumnChange> {
    if old.column_type != new.column_type {
        Some(ColumnChange::Type(new.column_type.clone()))
    } else if old.is_not_null != new.is_not_null {
        Some(ColumnChange::Nullable(!new.is_not_null))
    } else if old.default_value != new.default_value {
        Some(ColumnChange::Default(new.default_value.clone()))
    } else {
        None
    }
}

fn create_constraints(old: &SqlSchema, new: &SqlSchema, operations: &mut Vec<Operation>) {
    let deferred = new
        .tables
        .iter()
        .filter(|table| old.table(&table.name).is_none())
        .flat_map(|table| &table.constraints)
        .filter(|constraint| constraint.is_foreign_key());
    let missing = shared_tables(old, new).flat_map(|(old_table, new_table)| {
        new_table
            .constraints
            .iter()
            .filter(move |constraint| old_table.constraint(&constraint.name()).is_none())
    });

    for constraint in deferred.chain(missing) {
        let columns = constraint.columns();
        operations.push(Operation::CreateConstraint {
            constraint: constraint.clone(),
            up: identity_map(&columns),
            down: identity_map(&columns),
        });
    }
}

fn drop_tables(old: &SqlSchema, new: &SqlSchema, operations: &mut Vec<Operation>) {
    for table in &old.tables {
        if new.table(&table.name).is_none() {
            operations.push(Operation::DropTable {
                name: table.name.clone(),
            });
        }
    }
}

fn drop_columns(old: &SqlSchema, new: &SqlSchema, operations: &mut Vec<Operation>) {
    for (old_table, new_table) in retained_tables(old, new) {
        for column in &old_table.columns {
            if new_table.column(&column.name).is_none() {
                operations.push(Operation::DropColumn {
                    table: old_table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }
    }
}

fn drop_constraints(old: &SqlSchema, new: &SqlSchema, operations: &mut Vec<Operation>) {
    for (old_table, new_table) in retained_tables(old, new) {
        for constraint in &old_table.constraints {
            let name = constraint.name();
            if constraint.is_primary_key() || new_table.constraint(&name).is_some() {
                continue;
            }
            let columns = constraint.columns();
            operations.push(Operation::DropMultiColumnConstraint {
                table: old_table.name.clone(),
                name,
                up: identity_map(&columns),
                down: identity_map(&columns),
            });
        }
    }
}

/// Project `operations` onto `schema`, returning the resulting snapshot.
///
/// Operations that reference missing tables or columns leave the snapshot
/// unchanged.
#[must_use]
pub fn apply(schema: &SqlSchema, operations: &[Operation]) -> SqlSchema {
    let mut result = schema.clone();
    for operation in operations {
        apply_one(&mut result, operation);
    }
    result
}

fn table_mut<'a>(schema: &'a mut SqlSchema, name: &str) -> Option<&'a mut Table> {
    schema.tables.iter_mut().find(|table| table.name == name)
}

fn apply_one(schema: &mut SqlSchema, operation: &Operation) {
    match operation {
        Operation::CreateTable {
            name,
            columns,
            constraints,
        } => {
            if schema.table(name).is_none() {
                schema.tables.push(Table {
                    name: name.clone(),
                    columns: columns.clone(),
                    constraints: constraints.clone(),
                });
            }
        }
        Operation::DropTable { name } => schema.tables.retain(|table| &table.name != name),
        Operation::AddColumn { table, column } => {
            if let Some(target) = table_mut(schema, table) {
                target.columns.push(column.clone());
            }
        }
        Operation::AlterColumn {
            table,
            column,
            change,
        } => {
            let target = table_mut(schema, table)
                .and_then(|t| t.columns.iter_mut().find(|c| &c.name == column));
            if let Some(target) = target {
                match change {
                    ColumnChange::Type(new_type) => target.column_type.clone_from(new_type),
                    ColumnChange::Nullable(nullable) => target.is_not_null = !nullable,
                    ColumnChange::Default(value) => target.default_value.clone_from(value),
                }
            }
        }
        Operation::DropColumn { table, column } => {
            if let Some(target) = table_mut(schema, table) {
                target.columns.retain(|c| &c.name != column);
            }
        }
        Operation::CreateConstraint { constraint, .. } => {
            if let Some(target) = table_mut(schema, constraint.table()) {
                target.constraints.push(constraint.clone());
            }
        }
        Operation::DropMultiColumnConstraint { table, name, .. } => {
            if let Some(target) = table_mut(schema, table) {
                target.constraints.retain(|c| &c.name() != name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for operation emission, ordering and rendering.

    use super::*;
    use crate::naming::strip_schema_qualifier;
    use rstest::rstest;

    fn table(name: &str, columns: Vec<Column>, constraints: Vec<Constraint>) -> Table {
        Table {
            name: name.to_owned(),
            columns,
            constraints,
        }
    }

    fn schema(tables: Vec<Table>) -> SqlSchema {
        SqlSchema { tables }
    }

    fn users(columns: Vec<Column>, constraints: Vec<Constraint>) -> SqlSchema {
        schema(vec![table("users", columns, constraints)])
    }

    fn id() -> Column {
        Column::new("id", "bigint").primary_key().not_null(true)
    }

    fn unique_email() -> Constraint {
        Constraint::Unique {
            table: "users".to_owned(),
            key: "email".to_owned(),
        }
    }

    #[rstest]
    fn identical_snapshots_produce_nothing() {
        let snapshot = users(vec![id(), Column::new("email", "varchar")], vec![unique_email()]);
        assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[rstest]
    fn new_table_is_created_with_its_constraints() {
        let new = users(vec![id()], vec![unique_email()]);
        let operations = diff(&SqlSchema::default(), &new);

        assert_eq!(
            operations,
            [Operation::CreateTable {
                name: "users".to_owned(),
                columns: vec![id()],
                constraints: vec![unique_email()],
            }]
        );
    }

    #[rstest]
    #[case(
        Column::new("name", "varchar").with_default("'x'"),
        Column::new("name", "text").not_null(true).with_default("'y'"),
        ColumnChange::Type("text".to_owned())
    )]
    #[case(
        Column::new("name", "varchar").with_default("'x'"),
        Column::new("name", "varchar").not_null(true).with_default("'y'"),
        ColumnChange::Nullable(false)
    )]
    #[case(
        Column::new("name", "varchar").with_default("'x'"),
        Column::new("name", "varchar"),
        ColumnChange::Default(None)
    )]
    fn only_first_differing_aspect_is_emitted(
        #[case] before: Column,
        #[case] after: Column,
        #[case] expected: ColumnChange,
    ) {
        let operations = diff(&users(vec![before], vec![]), &users(vec![after], vec![]));

        assert_eq!(
            operations,
            [Operation::AlterColumn {
                table: "users".to_owned(),
                column: "name".to_owned(),
                change: expected,
            }]
        );
    }

    #[rstest]
    fn multi_aspect_changes_converge_over_cycles() {
        let old = users(vec![Column::new("name", "varchar")], vec![]);
        let new = users(
            vec![
                Column::new("name", "text")
                    .not_null(true)
                    .with_default("''"),
            ],
            vec![],
        );

        let mut current = old;
        let mut cycles = 0;
        while !diff(&current, &new).is_empty() {
            current = apply(&current, &diff(&current, &new));
            cycles += 1;
            assert!(cycles <= 3, "diff did not converge");
        }

        assert_eq!(cycles, 3);
        assert_eq!(current, new);
    }

    #[rstest]
    fn constraint_is_created_on_existing_table() {
        let old = users(vec![id(), Column::new("email", "varchar")], vec![]);
        let new = users(vec![id(), Column::new("email", "varchar")], vec![unique_email()]);

        let operations = diff(&old, &new);

        let expected_map: BTreeMap<String, String> =
            [("email".to_owned(), "email".to_owned())].into_iter().collect();
        assert_eq!(
            operations,
            [Operation::CreateConstraint {
                constraint: unique_email(),
                up: expected_map.clone(),
                down: expected_map,
            }]
        );
    }

    /// `posts` relates to `tags`, which is declared after it.
    fn blog_with_forward_references() -> SqlSchema {
        use crate::model::{Collection, FieldType, Schema, SchemaElement};

        let collection = |name: &str, fields: Vec<(&str, SchemaElement)>| Collection {
            name: name.to_owned(),
            schema: fields
                .into_iter()
                .map(|(field, element)| (field.to_owned(), element))
                .collect(),
            is_global: false,
        };
        let schema = Schema {
            collections: vec![
                collection(
                    "posts",
                    vec![
                        ("title", SchemaElement::new(FieldType::String)),
                        (
                            "author",
                            SchemaElement::new(FieldType::Relation).relating_to("<builtins.user>"),
                        ),
                        (
                            "featured",
                            SchemaElement::new(FieldType::Relation).relating_to("tags"),
                        ),
                        (
                            "tags",
                            SchemaElement::new(FieldType::MultiRelation).relating_to("tags"),
                        ),
                    ],
                ),
                collection("tags", vec![("label", SchemaElement::new(FieldType::String))]),
            ],
            generated_at: None,
        };
        crate::compile(&schema).expect("blog compiles")
    }

    #[rstest]
    fn foreign_keys_follow_every_table_they_reference() {
        let operations = diff(&SqlSchema::default(), &blog_with_forward_references());

        let mut created: Vec<String> = Vec::new();
        for operation in &operations {
            match operation {
                Operation::CreateTable {
                    name, constraints, ..
                } => {
                    assert!(
                        !constraints.iter().any(Constraint::is_foreign_key),
                        "{name} is created with an inline foreign key"
                    );
                    created.push(name.clone());
                }
                Operation::CreateConstraint {
                    constraint:
                        Constraint::ForeignKey {
                            table,
                            reference_table,
                            ..
                        },
                    ..
                } => {
                    assert!(created.contains(table), "{table} does not exist yet");
                    let referenced = strip_schema_qualifier(reference_table);
                    assert!(
                        referenced == "user" || created.contains(&referenced),
                        "{table} references {referenced} before it is created"
                    );
                }
                other => panic!("unexpected operation {other:?}"),
            }
        }

        assert_eq!(created, ["posts", "posts_tags_relation_tags", "tags"]);
        let foreign_keys = operations
            .iter()
            .filter(|operation| matches!(operation, Operation::CreateConstraint { .. }))
            .count();
        assert_eq!(foreign_keys, 4);
    }

    #[rstest]
    fn deferred_foreign_keys_still_reach_the_new_snapshot() {
        let new = blog_with_forward_references();
        let applied = apply(&SqlSchema::default(), &diff(&SqlSchema::default(), &new));

        assert_eq!(applied, new);
    }

    #[rstest]
    fn drops_tolerate_cascaded_removal() {
        let drop_table = Operation::DropTable {
            name: "tags".to_owned(),
        };
        let drop_constraint = Operation::DropMultiColumnConstraint {
            table: "posts".to_owned(),
            name: "fk__posts__featured_id__tags".to_owned(),
            up: BTreeMap::new(),
            down: BTreeMap::new(),
        };

        assert_eq!(drop_table.to_sql("s"), "DROP TABLE \"s\".\"tags\" CASCADE;");
        assert_eq!(
            drop_constraint.to_sql("s"),
            "ALTER TABLE \"s\".\"posts\" DROP CONSTRAINT IF EXISTS \"fk__posts__featured_id__tags\";"
        );
    }

    #[rstest]
    fn removed_unique_constraint_is_dropped_by_name() {
        let old = users(vec![id()], vec![unique_email()]);
        let new = users(vec![id()], vec![]);

        let operations = diff(&old, &new);

        assert!(matches!(
            operations.as_slice(),
            [Operation::DropMultiColumnConstraint { table, name, .. }]
                if table == "users" && name == "uq__users__email"
        ));
    }

    #[rstest]
    fn removed_primary_key_is_never_dropped() {
        let primary_key = Constraint::PrimaryKey {
            table: "users".to_owned(),
            key: "id".to_owned(),
        };
        let old = users(vec![id()], vec![primary_key]);
        let new = users(vec![id()], vec![]);

        assert!(diff(&old, &new).is_empty());
    }

    #[rstest]
    fn creates_are_emitted_before_drops() {
        let old = schema(vec![
            table("legacy", vec![id()], vec![]),
            table(
                "users",
                vec![id(), Column::new("nickname", "varchar")],
                vec![unique_email()],
            ),
        ]);
        let new = schema(vec![
            table("users", vec![id(), Column::new("email", "varchar")], vec![]),
            table("posts", vec![id()], vec![]),
        ]);

        let kinds: Vec<&str> = diff(&old, &new)
            .iter()
            .map(|operation| match operation {
                Operation::CreateTable { .. } => "create_table",
                Operation::AddColumn { .. } => "add_column",
                Operation::AlterColumn { .. } => "alter_column",
                Operation::DropColumn { .. } => "drop_column",
                Operation::DropTable { .. } => "drop_table",
                Operation::CreateConstraint { .. } => "create_constraint",
                Operation::DropMultiColumnConstraint { .. } => "drop_constraint",
            })
            .collect();

        assert_eq!(
            kinds,
            ["add_column", "create_table", "drop_table", "drop_column", "drop_constraint"]
        );
    }

    #[rstest]
    fn renamed_column_is_drop_plus_add() {
        let old = users(vec![id(), Column::new("name", "varchar")], vec![]);
        let new = users(vec![id(), Column::new("full_name", "varchar")], vec![]);

        let operations = diff(&old, &new);

        assert!(matches!(
            operations.as_slice(),
            [Operation::AddColumn { .. }, Operation::DropColumn { column, .. }] if column == "name"
        ));
    }

    #[rstest]
    fn applying_a_diff_reaches_a_fixed_point() {
        let old = schema(vec![
            table("legacy", vec![id()], vec![]),
            table(
                "users",
                vec![id(), Column::new("name", "varchar")],
                vec![unique_email()],
            ),
        ]);
        let new = schema(vec![
            table(
                "users",
                vec![
                    id(),
                    Column::new("name", "text"),
                    Column::new("email", "varchar"),
                ],
                vec![Constraint::ForeignKey {
                    table: "users".to_owned(),
                    column: "email".to_owned(),
                    reference_table: "mimsy_collections.\"emails\"".to_owned(),
                    reference_column: "id".to_owned(),
                }],
            ),
            table("posts", vec![id()], vec![]),
        ]);

        let applied = apply(&old, &diff(&old, &new));

        assert!(diff(&applied, &new).is_empty());
    }

    #[rstest]
    #[case(
        ColumnChange::Type("text".to_owned()),
        "ALTER TABLE \"s\".\"users\" ALTER COLUMN \"name\" TYPE text USING \"name\"::text;"
    )]
    #[case(
        ColumnChange::Nullable(true),
        "ALTER TABLE \"s\".\"users\" ALTER COLUMN \"name\" DROP NOT NULL;"
    )]
    #[case(
        ColumnChange::Default(Some("'n/a'".to_owned())),
        "ALTER TABLE \"s\".\"users\" ALTER COLUMN \"name\" SET DEFAULT 'n/a';"
    )]
    fn alter_column_rendering(#[case] change: ColumnChange, #[case] expected: &str) {
        let operation = Operation::AlterColumn {
            table: "users".to_owned(),
            column: "name".to_owned(),
            change,
        };
        assert_eq!(operation.to_sql("s"), expected);
    }

    #[rstest]
    fn operations_serialize_externally_tagged() {
        let operation = Operation::DropTable {
            name: "users".to_owned(),
        };
        let json = serde_json::to_value(&operation).expect("serializes");
        assert_eq!(json["drop_table"]["name"], "users");
    }

    #[rstest]
    fn drops_are_contracting() {
        assert!(Operation::DropTable { name: "t".to_owned() }.is_contracting());
        assert!(
            !Operation::AddColumn {
                table: "t".to_owned(),
                column: Column::new("c", "varchar"),
            }
            .is_contracting()
        );
    }

    #[rstest]
    #[case("Add posts", "abc", "Add posts (hash:abc)")]
    #[case("Initial", "0123456789", "Initial (hash:01234567)")]
    fn migration_names(#[case] message: &str, #[case] sha: &str, #[case] expected: &str) {
        assert_eq!(Migration::name_for_commit(message, sha), expected);
    }
}
