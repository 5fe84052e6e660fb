//! GitHub outbound adapters.
//!
//! This module provides a thin HTTP implementation of the
//! `SourceRepository` port.

mod dto;
mod http_source;

pub use http_source::{DEFAULT_GITHUB_API_URL, GithubSourceRepository};
