//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed ledger, lease locks, collection
//!   registry and migration engine using Diesel ORM
//! - **github**: GitHub REST source repository using reqwest
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod github;
pub mod persistence;
