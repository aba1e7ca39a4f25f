use std::{env, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{default_config as defaults, report_mod::AlertFamily};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown report scope {0:?} (expected enterprise, organization or repository)")]
    UnknownScope(String),
    #[error("No scope target set. Set SCOPE_NAME (or run inside Actions, where GITHUB_REPOSITORY is provided).")]
    MissingScopeName,
    #[error("No GitHub credential found. Set GITHUB_PAT or GITHUB_TOKEN.")]
    MissingToken,
}

/// What the report covers: a single repository, an organization, or a whole
/// enterprise. Fixes the URL template and whether alerts carry a repository
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Repository,
    Organization,
    Enterprise,
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repository" => Ok(Self::Repository),
            "organization" => Ok(Self::Organization),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(ConfigError::UnknownScope(other.to_owned())),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Tokens {
    pub github: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// REST endpoint ([defaults::CLOUD_API_ENDPOINT] unless targeting GHES / GHAE)
    pub api_endpoint: String,
    /// Web endpoint, only used for the staff repository report on legacy servers
    pub web_endpoint: String,
    pub scope: Scope,
    /// Enterprise slug, organization login, or `owner/repo`, matching [Config::scope]
    pub scope_name: String,
    /// Alert families to report on
    pub features: Vec<AlertFamily>,
    /// Directory the CSV files are written into
    pub output_dir: PathBuf,
    pub tokens: Tokens,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: defaults::CLOUD_API_ENDPOINT.to_owned(),
            web_endpoint: defaults::CLOUD_WEB_ENDPOINT.to_owned(),
            scope: Scope::Repository,
            scope_name: String::new(),
            features: AlertFamily::ALL.to_vec(),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            tokens: Tokens::default(),
        }
    }
}

impl Config {
    /// Read the configuration from the environment (a `.env` file is honored).
    ///
    /// `GITHUB_PAT` falls back to the ambient `GITHUB_TOKEN` Actions provides,
    /// and `SCOPE_NAME` falls back to `GITHUB_REPOSITORY`, so a workflow run
    /// against its own repository needs no configuration at all.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let api_endpoint = env::var("GITHUB_API_ENDPOINT")
            .unwrap_or_else(|_| defaults::CLOUD_API_ENDPOINT.to_owned());
        let web_endpoint = env::var("GITHUB_SERVER_ENDPOINT")
            .unwrap_or_else(|_| defaults::CLOUD_WEB_ENDPOINT.to_owned());

        let token = env::var("GITHUB_PAT")
            .or_else(|_| env::var("GITHUB_TOKEN"))
            .map_err(|_| ConfigError::MissingToken)?;

        let scope = match env::var("GITHUB_REPORT_SCOPE") {
            Ok(value) => value.parse()?,
            Err(_) => Scope::Repository,
        };
        let scope_name = env::var("SCOPE_NAME")
            .or_else(|_| env::var("GITHUB_REPOSITORY"))
            .map_err(|_| ConfigError::MissingScopeName)?;

        let features =
            parse_features(&env::var("GHAS_FEATURES").unwrap_or_else(|_| "all".to_owned()));

        let output_dir = env::var("GHAS_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::OUTPUT_DIR));

        Ok(Self {
            api_endpoint,
            web_endpoint,
            scope,
            scope_name,
            features,
            output_dir,
            tokens: Tokens {
                github: Some(token),
            },
        })
    }

    pub fn feature_enabled(&self, family: AlertFamily) -> bool {
        self.features.contains(&family)
    }
}

/// Parse the comma-separated feature selection. `all` enables every family;
/// unrecognized names are dropped with a warning, never a hard error.
pub fn parse_features(selection: &str) -> Vec<AlertFamily> {
    if selection.trim() == "all" {
        return AlertFamily::ALL.to_vec();
    }

    let mut features = Vec::new();
    for name in selection.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match AlertFamily::ALL
            .into_iter()
            .find(|family| family.feature_str() == name)
        {
            Some(family) => {
                if !features.contains(&family) {
                    features.push(family);
                }
            }
            None => log::warn!("Ignoring unknown feature {name:?}"),
        }
    }
    if features.is_empty() {
        log::warn!("No recognized features selected, nothing will be reported");
    }
    features
}
