//! Identifier quoting and relation target resolution.

/// Postgres schema holding compiled collection tables.
pub const COLLECTIONS_SCHEMA: &str = "mimsy_collections";

/// Postgres schema holding builtin tables such as users and media.
pub const INTERNAL_SCHEMA: &str = "mimsy_internal";

const BUILTIN_PREFIX: &str = "<builtins.";
const BUILTIN_SUFFIX: &str = ">";

/// Quote a Postgres identifier, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use content_schema::quote_identifier;
///
/// assert_eq!(quote_identifier("user"), "\"user\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Remove a schema qualifier and identifier quoting from a table reference.
///
/// # Examples
///
/// ```
/// use content_schema::strip_schema_qualifier;
///
/// assert_eq!(strip_schema_qualifier("mimsy_collections.\"posts\""), "posts");
/// assert_eq!(strip_schema_qualifier("posts"), "posts");
/// ```
#[must_use]
pub fn strip_schema_qualifier(reference: &str) -> String {
    let unqualified = reference
        .rsplit_once('.')
        .map_or(reference, |(_, table)| table);
    unqualified.trim_matches('"').replace("\"\"", "\"")
}

/// Builtin relation target, if `relates_to` uses the `<builtins.name>` form.
pub(crate) fn builtin_name(relates_to: &str) -> Option<&str> {
    relates_to
        .strip_prefix(BUILTIN_PREFIX)
        .and_then(|rest| rest.strip_suffix(BUILTIN_SUFFIX))
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Schema-qualified reference for a relation target.
///
/// Builtins resolve to the internal schema; collections to the collections
/// schema. Returns `None` for builtins other than `user` and `media`.
///
/// # Examples
///
/// ```
/// use content_schema::prefixed_table_name;
///
/// assert_eq!(
///     prefixed_table_name("<builtins.user>").as_deref(),
///     Some("mimsy_internal.\"user\"")
/// );
/// assert_eq!(
///     prefixed_table_name("posts").as_deref(),
///     Some("mimsy_collections.\"posts\"")
/// );
/// assert_eq!(prefixed_table_name("<builtins.tags>"), None);
/// ```
#[must_use]
pub fn prefixed_table_name(relates_to: &str) -> Option<String> {
    match builtin_name(relates_to) {
        Some(builtin @ ("user" | "media")) => {
            Some(format!("{INTERNAL_SCHEMA}.{}", quote_identifier(builtin)))
        }
        Some(_) => None,
        None => Some(format!(
            "{COLLECTIONS_SCHEMA}.{}",
            quote_identifier(relates_to)
        )),
    }
}

/// Bare table name for a relation target, used when naming columns.
pub(crate) fn simple_table_name(relates_to: &str) -> Option<&str> {
    match builtin_name(relates_to) {
        Some(builtin @ ("user" | "media")) => Some(builtin),
        Some(_) => None,
        None => Some(relates_to),
    }
}
