//! CLI command implementations.

mod auth;

pub use auth::{login, logout, register, status, token};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use auth_engine::{ApiClient, NoopBiometrics, SessionManager};
use client_config_and_utils::{Config, Paths};
use client_storage::{CredentialStore, FileStorage};

/// Wire up the full client stack from the on-disk config.
pub fn build_session_manager() -> anyhow::Result<SessionManager> {
    let paths = Paths::new().context("could not resolve the data directory")?;
    paths
        .ensure_dirs()
        .context("could not create the data directory")?;
    let config = Config::load(&paths).context("could not load configuration")?;
    tracing::debug!(api = %config.api_base_url, "client configured");

    let storage = FileStorage::open(paths.credentials_file())
        .context("could not open the credential file")?;
    let credentials = Arc::new(CredentialStore::new(Box::new(storage)));

    let api = ApiClient::new(
        config.api_base_url().context("invalid API base URL")?,
        Duration::from_secs(config.request_timeout_secs),
        credentials.clone(),
    )
    .context("could not build the HTTP client")?;

    Ok(SessionManager::new(
        Arc::new(api),
        credentials,
        Box::new(NoopBiometrics),
    ))
}
