//! Sync service configuration loaded via OrthoConfig.
//!
//! Every value can come from a `MIMSY_*` environment variable or a
//! configuration file. Only the database URL and the repository reference
//! are required; everything else has a default.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_LEASE, DEFAULT_SYNC_SCHEDULE, SyncConfig};
use crate::outbound::github::DEFAULT_GITHUB_API_URL;

/// Errors raised when required settings are absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// A required setting was not supplied.
    #[error("missing required setting {name} (set {env})")]
    Missing {
        /// Setting name.
        name: &'static str,
        /// Environment variable that supplies it.
        env: &'static str,
    },
}

/// Configuration values for the `mimsy-sync` process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MIMSY")]
pub struct SyncSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Tracked repository, `owner/name`.
    pub repository: Option<String>,
    /// Token sent as a bearer credential to GitHub.
    pub github_token: Option<String>,
    /// GitHub REST base URL override, for GitHub Enterprise.
    pub github_api_url: Option<String>,
    /// Schedule for the sync job.
    pub sync_schedule: Option<String>,
    /// Lease length in seconds for the sync job lock.
    pub lock_lease_secs: Option<u64>,
    /// Prefix for project files inside the repository, such as `site/`.
    pub project_path: Option<String>,
}

impl SyncSettings {
    /// Return the database URL.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when unset or blank.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        required(&self.database_url, "database_url", "MIMSY_DATABASE_URL")
    }

    /// Return the tracked repository reference.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when unset or blank.
    pub fn repository(&self) -> Result<&str, SettingsError> {
        required(&self.repository, "repository", "MIMSY_REPOSITORY")
    }

    /// Return the GitHub token, ignoring blank values.
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Return the GitHub API base URL, falling back to the public endpoint.
    pub fn github_api_url(&self) -> &str {
        self.github_api_url
            .as_deref()
            .unwrap_or(DEFAULT_GITHUB_API_URL)
    }

    /// Return the sync schedule, falling back to every minute.
    pub fn sync_schedule(&self) -> &str {
        self.sync_schedule
            .as_deref()
            .unwrap_or(DEFAULT_SYNC_SCHEDULE)
    }

    /// Return the lock lease length, falling back to the default lease.
    pub fn lock_lease(&self) -> Duration {
        self.lock_lease_secs
            .map_or(DEFAULT_LEASE, Duration::from_secs)
    }

    /// Return the project path prefix, empty when unset.
    pub fn project_path(&self) -> &str {
        self.project_path.as_deref().unwrap_or_default()
    }

    /// Build the orchestrator's repository settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when no repository is configured.
    pub fn sync_config(&self) -> Result<SyncConfig, SettingsError> {
        Ok(SyncConfig {
            repository: self.repository()?.to_owned(),
            project_path: self.project_path().to_owned(),
            schedule: self.sync_schedule().to_owned(),
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
    env: &'static str,
) -> Result<&'a str, SettingsError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SettingsError::Missing { name, env })
}

#[cfg(test)]
mod tests {
    //! Unit tests for sync configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 7] = [
        "MIMSY_DATABASE_URL",
        "MIMSY_REPOSITORY",
        "MIMSY_GITHUB_TOKEN",
        "MIMSY_GITHUB_API_URL",
        "MIMSY_SYNC_SCHEDULE",
        "MIMSY_LOCK_LEASE_SECS",
        "MIMSY_PROJECT_PATH",
    ];

    fn load_from_empty_args() -> SyncSettings {
        SyncSettings::load_from_iter([OsString::from("mimsy-sync")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.database_url(),
            Err(SettingsError::Missing {
                name: "database_url",
                env: "MIMSY_DATABASE_URL",
            })
        );
        assert!(settings.repository().is_err());
        assert!(settings.github_token().is_none());
        assert_eq!(settings.github_api_url(), DEFAULT_GITHUB_API_URL);
        assert_eq!(settings.sync_schedule(), "*/1 * * * *");
        assert_eq!(settings.lock_lease(), Duration::from_secs(30));
        assert_eq!(settings.project_path(), "");
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("MIMSY_DATABASE_URL", Some("postgres://localhost/mimsy".to_owned())),
            ("MIMSY_REPOSITORY", Some("acme/site".to_owned())),
            ("MIMSY_GITHUB_TOKEN", Some("ghp_example".to_owned())),
            ("MIMSY_GITHUB_API_URL", Some("https://ghe.example/api/v3".to_owned())),
            ("MIMSY_SYNC_SCHEDULE", Some("@every 5m".to_owned())),
            ("MIMSY_LOCK_LEASE_SECS", Some("90".to_owned())),
            ("MIMSY_PROJECT_PATH", Some("site/".to_owned())),
        ]);

        let settings = load_from_empty_args();

        assert_eq!(settings.database_url(), Ok("postgres://localhost/mimsy"));
        assert_eq!(settings.github_token(), Some("ghp_example"));
        assert_eq!(settings.github_api_url(), "https://ghe.example/api/v3");
        assert_eq!(settings.lock_lease(), Duration::from_secs(90));
        assert_eq!(
            settings.sync_config(),
            Ok(SyncConfig {
                repository: "acme/site".to_owned(),
                project_path: "site/".to_owned(),
                schedule: "@every 5m".to_owned(),
            })
        );
    }

    #[rstest]
    fn blank_required_values_count_as_missing() {
        let _guard = lock_env([
            ("MIMSY_DATABASE_URL", Some("   ".to_owned())),
            ("MIMSY_REPOSITORY", None::<String>),
            ("MIMSY_GITHUB_TOKEN", Some(String::new())),
        ]);

        let settings = load_from_empty_args();

        assert!(settings.database_url().is_err());
        assert!(settings.github_token().is_none());
    }
}
