//! Content-model schema compilation and SQL schema differencing.
//!
//! This crate turns a declarative content schema (collections of typed
//! fields) into a storage-level SQL intermediate representation and compares
//! two such representations to produce an ordered list of migration
//! operations. It performs no I/O so the backend can drive it from any
//! execution context.
//!
//! # Overview
//!
//! - [`Schema`] is the logical model authored in a content repository.
//! - [`compile`] maps a [`Schema`] to a [`SqlSchema`] with deterministic
//!   table, column and constraint naming.
//! - [`diff`] compares two [`SqlSchema`] snapshots and emits create-before-drop
//!   [`Operation`]s.
//!
//! # Example
//!
//! ```
//! use content_schema::{Schema, SqlSchema, compile, diff};
//!
//! let json = r#"{
//!     "collections": [
//!         {
//!             "name": "posts",
//!             "schema": {
//!                 "title": {"type": "string", "options": {"constraints": {"required": true}}}
//!             }
//!         }
//!     ]
//! }"#;
//!
//! let schema = Schema::from_json(json).expect("valid schema");
//! let compiled = compile(&schema).expect("schema compiles");
//! let operations = diff(&SqlSchema::default(), &compiled);
//!
//! assert_eq!(operations.len(), 1);
//! ```

mod compiler;
mod differ;
mod error;
mod ir;
mod model;
mod naming;

pub use compiler::compile;
pub use differ::{ColumnChange, Migration, Operation, apply, diff};
pub use error::CompileError;
pub use ir::{Column, Constraint, SqlSchema, Table};
pub use model::{
    Collection, FieldType, PROJECT_CONFIG_FILE_NAME, ProjectConfig, SCHEMA_FILE_NAME, Schema,
    SchemaElement, SchemaElementConstraints, SchemaElementOptions,
};
pub use naming::{
    COLLECTIONS_SCHEMA, INTERNAL_SCHEMA, prefixed_table_name, quote_identifier,
    strip_schema_qualifier,
};
