use std::path::Path;
use thiserror::Error;

use crate::config::{Settings, SettingsError};
use crate::domain::{ProgressSink, SyncError, ValidationError};
use crate::infrastructure::{GithubContentStore, GithubError};

use super::list::{self, ListedBook};
use super::publish::{PublishError, PublishOptions, PublishPlan, PublishReport, PublishRequest, Publisher};

/// Errors that can occur during command orchestration
#[derive(Debug, Error)]
pub enum AppError {
    /// The settings file could not be read or written.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Settings or input were incomplete.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The Github client could not be initialized.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// The publish failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The catalog could not be read.
    #[error(transparent)]
    Catalog(#[from] SyncError),
}

/// Publish a book with the given settings.
///
/// Settings are validated into a remote config once, before anything else, and
/// that config is used unchanged for the whole run.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if settings or the request are incomplete,
/// [`AppError::Github`] if the client cannot be created, and
/// [`AppError::Publish`] if a stage fails.
pub fn publish(
    settings: &Settings,
    request: &PublishRequest,
    options: PublishOptions,
    progress: &mut dyn ProgressSink,
) -> Result<PublishReport, AppError> {
    let plan = plan(settings, request)?;
    let config = settings.remote_config()?;
    let store = GithubContentStore::new(config)?;

    let report = Publisher::new(store, settings.layout())
        .with_options(options)
        .execute(&plan, progress)?;
    Ok(report)
}

/// Validate settings and request and return the plan a publish would run.
/// Makes no network call.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for the first missing or unusable input.
pub fn plan(settings: &Settings, request: &PublishRequest) -> Result<PublishPlan, AppError> {
    settings.remote_config()?;
    Ok(PublishPlan::prepare(request, &settings.layout())?)
}

/// List the books in the remote catalog.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if settings are incomplete,
/// [`AppError::Github`] if the client cannot be created, and
/// [`AppError::Catalog`] if the manifest cannot be read.
pub fn list(settings: &Settings) -> Result<Vec<ListedBook>, AppError> {
    let store = GithubContentStore::new(settings.remote_config()?)?;
    Ok(list::run(&store, &settings.layout())?)
}

/// Merge `update` into the settings file at `path` and return the result.
///
/// # Errors
///
/// Returns [`AppError::Settings`] if the file cannot be read or written.
pub fn configure(path: &Path, update: Settings) -> Result<Settings, AppError> {
    let mut settings = Settings::load(path)?;
    settings.merge(update);
    settings.save(path)?;
    Ok(settings)
}
