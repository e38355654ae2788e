use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{ContentLayout, ValidationError};

pub const DEFAULT_BRANCH: &str = "main";
pub const SETTINGS_DIR_NAME: &str = "shelf";
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Errors that can occur when working with the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no configuration directory available on this system; pass --config")]
    NoConfigDir,

    #[error("failed to read settings file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("failed to write settings file: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings to TOML")]
    Serialize(#[source] toml::ser::Error),
}

/// Coordinates of the content repository, validated and fixed for one publish.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    owner: String,
    repository: String,
    branch: String,
    token: String,
}

impl RemoteConfig {
    /// Build a config, rejecting any empty field so that blanks never reach a
    /// request URL. `branch` defaults to [`DEFAULT_BRANCH`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] naming the first empty field.
    pub fn new(
        owner: &str,
        repository: &str,
        branch: Option<&str>,
        token: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            owner: required("owner", owner)?,
            repository: required("repository", repository)?,
            branch: required("branch", branch.unwrap_or(DEFAULT_BRANCH))?,
            token: required("token", token)?,
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("owner", &self.owner)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("token", &"***")
            .finish()
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Settings persisted on the admin's machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_root: Option<String>,
}

impl Settings {
    /// `<config dir>/shelf/settings.toml`
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoConfigDir`] if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load settings from `path`. A missing file yields empty settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Read`] or [`SettingsError::Parse`] if the file
    /// exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Write settings to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Serialize`] or [`SettingsError::Write`].
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overwrite every field that is set in `update`.
    pub fn merge(&mut self, update: Self) {
        let Self {
            owner,
            repository,
            branch,
            token,
            content_root,
        } = update;
        if owner.is_some() {
            self.owner = owner;
        }
        if repository.is_some() {
            self.repository = repository;
        }
        if branch.is_some() {
            self.branch = branch;
        }
        if token.is_some() {
            self.token = token;
        }
        if content_root.is_some() {
            self.content_root = content_root;
        }
    }

    /// Replace the stored token, typically with `GITHUB_TOKEN` from the environment.
    #[must_use]
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.token = Some(token);
        }
        self
    }

    /// Validate into the config used for one publish.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] for the first unset or blank field.
    pub fn remote_config(&self) -> Result<RemoteConfig, ValidationError> {
        RemoteConfig::new(
            self.owner.as_deref().unwrap_or_default(),
            self.repository.as_deref().unwrap_or_default(),
            self.branch.as_deref().filter(|b| !b.trim().is_empty()),
            self.token.as_deref().unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn layout(&self) -> ContentLayout {
        self.content_root
            .as_deref()
            .map(ContentLayout::new)
            .unwrap_or_default()
    }
}
