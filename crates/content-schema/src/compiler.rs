//! Compile a logical [`Schema`] into the SQL IR.
//!
//! Every collection yields a base table seeded with `id` and `slug`. Fields
//! are visited non-relations first, then relations, each in name order, so
//! repeated compilation of the same input yields identical output.

use std::collections::BTreeSet;

use crate::error::CompileError;
use crate::ir::{Column, Constraint, SqlSchema, Table};
use crate::model::{Collection, FieldType, Schema, SchemaElement};
use crate::naming::{builtin_name, prefixed_table_name, quote_identifier, simple_table_name};

const ID_COLUMN: &str = "id";
const SLUG_COLUMN: &str = "slug";

/// Compile a logical schema to the SQL IR.
///
/// # Errors
///
/// Returns [`CompileError`] for unsupported field types, relation fields with
/// a missing or unknown target, and table name collisions.
///
/// # Examples
///
/// ```
/// use content_schema::{Collection, FieldType, Schema, SchemaElement, compile};
///
/// let schema = Schema {
///     collections: vec![Collection {
///         name: "posts".to_owned(),
///         schema: [("title".to_owned(), SchemaElement::new(FieldType::String).required())]
///             .into_iter()
///             .collect(),
///         is_global: false,
///     }],
///     generated_at: None,
/// };
///
/// let compiled = compile(&schema).expect("schema compiles");
/// let posts = compiled.table("posts").expect("posts table");
/// let names: Vec<&str> = posts.columns.iter().map(|c| c.name.as_str()).collect();
/// assert_eq!(names, ["id", "slug", "title"]);
/// ```
pub fn compile(schema: &Schema) -> Result<SqlSchema, CompileError> {
    let mut compiled = SqlSchema::default();
    for collection in &schema.collections {
        let tables = compile_collection(schema, collection)?;
        compiled.tables.extend(tables);
    }
    ensure_unique_table_names(&compiled)?;
    Ok(compiled)
}

fn compile_collection(schema: &Schema, collection: &Collection) -> Result<Vec<Table>, CompileError> {
    let mut base = base_table(&collection.name);
    let mut join_tables = Vec::new();

    for (name, element) in ordered_fields(collection) {
        match element.field_type {
            FieldType::Relation => {
                let target = relation_target(schema, collection, name, element)?;
                add_many_to_one(&mut base, name, element, &target);
            }
            FieldType::MultiRelation => {
                let target = relation_target(schema, collection, name, element)?;
                join_tables.push(many_to_many_table(&collection.name, name, &target));
            }
            _ => base.columns.push(direct_column(collection, name, element)?),
        }
    }

    let mut tables = Vec::with_capacity(join_tables.len() + 1);
    tables.push(base);
    tables.extend(join_tables);
    Ok(tables)
}

fn base_table(name: &str) -> Table {
    let mut table = Table::new(name);
    table.columns.push(
        Column::new(ID_COLUMN, "bigint")
            .primary_key()
            .not_null(true),
    );
    table
        .columns
        .push(Column::new(SLUG_COLUMN, "varchar(60)").not_null(true));
    table.constraints.push(Constraint::PrimaryKey {
        table: name.to_owned(),
        key: ID_COLUMN.to_owned(),
    });
    table.constraints.push(Constraint::Unique {
        table: name.to_owned(),
        key: SLUG_COLUMN.to_owned(),
    });
    table
}

/// Non-relation fields first, then relation fields, each alphabetical.
fn ordered_fields(collection: &Collection) -> impl Iterator<Item = (&String, &SchemaElement)> {
    collection
        .schema
        .iter()
        .filter(|(_, element)| !element.is_relation())
        .chain(collection.relation_fields())
}

fn direct_column(
    collection: &Collection,
    name: &str,
    element: &SchemaElement,
) -> Result<Column, CompileError> {
    let required = element.is_required();
    match &element.field_type {
        FieldType::String => Ok(Column::new(name, "varchar").not_null(required)),
        FieldType::RichText => Ok(Column::new(name, "jsonb").not_null(required)),
        FieldType::CreatedAt => Ok(Column::new(name, "timestamptz")
            .not_null(required)
            .with_default("CURRENT_TIMESTAMP")),
        other => Err(CompileError::UnsupportedFieldType {
            collection: collection.name.clone(),
            field: name.to_owned(),
            field_type: other.as_str().to_owned(),
        }),
    }
}

/// Resolved relation target: bare name for column naming, qualified
/// reference for foreign keys and slug lookups.
struct RelationTarget {
    simple: String,
    qualified: String,
}

fn relation_target(
    schema: &Schema,
    collection: &Collection,
    field: &str,
    element: &SchemaElement,
) -> Result<RelationTarget, CompileError> {
    let Some(target) = element.relates_to.as_deref().filter(|t| !t.is_empty()) else {
        return Err(CompileError::MissingRelationTarget {
            collection: collection.name.clone(),
            field: field.to_owned(),
        });
    };

    if builtin_name(target).is_none() && schema.collection(target).is_none() {
        return Err(CompileError::UnknownRelationTarget {
            collection: collection.name.clone(),
            field: field.to_owned(),
            target: target.to_owned(),
        });
    }

    let resolved = simple_table_name(target).zip(prefixed_table_name(target));
    let Some((simple, qualified)) = resolved else {
        return Err(CompileError::UnknownBuiltin {
            collection: collection.name.clone(),
            field: field.to_owned(),
            target: target.to_owned(),
        });
    };

    Ok(RelationTarget {
        simple: simple.to_owned(),
        qualified,
    })
}

fn slug_lookup(qualified_target: &str, id_column: &str) -> String {
    format!(
        "SELECT slug FROM {qualified_target} WHERE id = {}",
        quote_identifier(id_column)
    )
}

fn add_many_to_one(table: &mut Table, field: &str, element: &SchemaElement, target: &RelationTarget) {
    let id_column = format!("{field}_id");
    table
        .columns
        .push(Column::new(&id_column, "bigint").not_null(element.is_required()));
    table.columns.push(
        Column::new(format!("{field}_slug"), "varchar")
            .generated_as(slug_lookup(&target.qualified, &id_column)),
    );
    table.constraints.push(Constraint::ForeignKey {
        table: table.name.clone(),
        column: id_column,
        reference_table: target.qualified.clone(),
        reference_column: ID_COLUMN.to_owned(),
    });
}

/// Join table for a many-to-many field.
///
/// A collection relating to itself names the related side after the field,
/// since `<owner>_id` is already taken by the owning side.
fn many_to_many_table(owner: &str, field: &str, target: &RelationTarget) -> Table {
    let name = format!("{owner}_{field}_relation_{}", target.simple);
    let owner_id = format!("{owner}_id");
    let related = if target.simple == owner {
        field
    } else {
        target.simple.as_str()
    };
    let target_id = format!("{related}_id");
    let target_slug = format!("{related}_slug");
    let owner_reference = prefixed_table_name(owner)
        .unwrap_or_else(|| quote_identifier(owner));

    Table {
        columns: vec![
            Column::new(&owner_id, "bigint").not_null(true),
            Column::new(&target_id, "bigint").not_null(true),
            Column::new(target_slug, "varchar")
                .not_null(true)
                .generated_as(slug_lookup(&target.qualified, &target_id)),
        ],
        constraints: vec![
            Constraint::CompositePrimaryKey {
                table: name.clone(),
                columns: vec![owner_id.clone(), target_id.clone()],
            },
            Constraint::ForeignKey {
                table: name.clone(),
                column: owner_id,
                reference_table: owner_reference,
                reference_column: ID_COLUMN.to_owned(),
            },
            Constraint::ForeignKey {
                table: name.clone(),
                column: target_id,
                reference_table: target.qualified.clone(),
                reference_column: ID_COLUMN.to_owned(),
            },
        ],
        name,
    }
}

fn ensure_unique_table_names(schema: &SqlSchema) -> Result<(), CompileError> {
    let mut seen = BTreeSet::new();
    for table in &schema.tables {
        if !seen.insert(table.name.as_str()) {
            return Err(CompileError::DuplicateTable {
                name: table.name.clone(),
            });
        }
    }
    Ok(())
}
