//! Error types for schema compilation.

use thiserror::Error;

/// Errors raised while compiling a logical schema to the SQL IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A field declares a type outside the supported set.
    #[error("unsupported type '{field_type}' for field '{collection}.{field}'")]
    UnsupportedFieldType {
        /// Collection declaring the field.
        collection: String,
        /// Field name.
        field: String,
        /// Declared type tag.
        field_type: String,
    },

    /// A relation field has no target collection.
    #[error("relation field '{collection}.{field}' is missing relatesTo")]
    MissingRelationTarget {
        /// Collection declaring the field.
        collection: String,
        /// Field name.
        field: String,
    },

    /// A relation field targets a collection that does not exist.
    #[error("relation field '{collection}.{field}' targets unknown collection '{target}'")]
    UnknownRelationTarget {
        /// Collection declaring the field.
        collection: String,
        /// Field name.
        field: String,
        /// Declared target.
        target: String,
    },

    /// A relation field targets a builtin that does not exist.
    #[error("unknown builtin reference '{target}' on field '{collection}.{field}'")]
    UnknownBuiltin {
        /// Collection declaring the field.
        collection: String,
        /// Field name.
        field: String,
        /// Declared builtin target.
        target: String,
    },

    /// Two collections or join tables compile to the same table name.
    #[error("duplicate table '{name}' in compiled schema")]
    DuplicateTable {
        /// Colliding table name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    //! Display formatting checks.

    use super::*;
    use rstest::rstest;

    #[rstest]
    fn unsupported_type_names_field() {
        let error = CompileError::UnsupportedFieldType {
            collection: "posts".to_owned(),
            field: "score".to_owned(),
            field_type: "number".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "unsupported type 'number' for field 'posts.score'"
        );
    }

    #[rstest]
    fn duplicate_table_names_table() {
        let error = CompileError::DuplicateTable {
            name: "posts".to_owned(),
        };
        assert!(error.to_string().contains("'posts'"));
    }
}
