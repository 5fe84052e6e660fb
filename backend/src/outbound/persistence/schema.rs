//! Diesel table definitions for the sync service's own tables.
//!
//! These definitions must match `backend/migrations` exactly. Collection data
//! tables under `mimsy_collections` are created at runtime by the migration
//! engine and are deliberately absent here.

diesel::table! {
    /// Sync-status ledger: one row per observed `(repo, commit)` pair.
    sync_status (id) {
        /// Surrogate key.
        id -> Int8,
        /// Repository reference, for example `owner/name`.
        repo -> Text,
        /// Commit SHA.
        commit -> Text,
        /// Commit message captured at creation.
        commit_message -> Text,
        /// Commit timestamp captured at creation.
        commit_date -> Timestamptz,
        /// Schema document fetched for the commit.
        manifest -> Nullable<Text>,
        /// Serialised SQL IR the commit migrates to.
        applied_migration -> Nullable<Text>,
        /// When the row was last processed.
        applied_at -> Nullable<Timestamptz>,
        /// Whether the row is the live baseline for its repository.
        is_active -> Bool,
        /// Whether the commit was skipped as unchanged.
        is_skipped -> Bool,
        /// Recorded failure, if any.
        error_message -> Nullable<Text>,
    }
}

diesel::table! {
    /// Fleet-wide lease locks keyed by job name.
    cron_locks (key) {
        /// Lock key.
        key -> Varchar,
        /// Holder token, `<hostname>-<unix nanos>`.
        locked_by -> Varchar,
        /// When the current holder took the lease.
        locked_at -> Timestamptz,
        /// When the lease becomes stealable.
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    /// Registry of collections known to the CMS.
    collection (id) {
        /// Surrogate key.
        id -> Int8,
        /// Collection slug; equals the collection name.
        slug -> Varchar,
        /// Display name.
        name -> Varchar,
        /// Field definitions as authored.
        fields -> Jsonb,
        /// Whether the collection holds a single global document.
        is_global -> Bool,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Migration engine state store.
    mimsy_collections_roll.migrations (name) {
        /// Migration name.
        name -> Text,
        /// Serialised migration (name and operations).
        migration -> Jsonb,
        /// Whether the contract phase has run.
        done -> Bool,
        /// When the expand phase ran.
        created_at -> Timestamptz,
        /// When the row last changed.
        updated_at -> Timestamptz,
    }
}
