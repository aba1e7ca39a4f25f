//! # ghas_report
//!
//! Pulls security alerts (code scanning, secret scanning, Dependabot) out of
//! the GitHub REST API at repository, organization or enterprise scope and
//! lands them in CSV files. Designed to run as a scheduled or on-demand job
//! against github.com as well as GHES / GitHub AE deployments.
//!
//! The retrieval layer lives in [report_mod]; this module wires the configured
//! scope and feature selection to the per-family retrievers and writers, and
//! classifies per-family failures so one disabled feature never takes down the
//! rest of the run.

pub mod config;
pub mod default_config;
pub mod report_mod;

use std::path::Path;

use config::{Config, Scope};
use report_mod::{
    code_scanning::{self, EnterpriseCodeScanning, EnterpriseScanError},
    csv_output,
    dependabot, enterprise,
    enterprise::EnterpriseEdition,
    paginated_api::ApiError,
    secret_scanning, AlertFamily,
};

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Enterprise(#[from] EnterpriseScanError),
    #[error(transparent)]
    Version(#[from] enterprise::VersionError),
    #[error(transparent)]
    Write(#[from] csv_output::WriteError),
}

impl FamilyError {
    /// True when the failure means the family is simply not enabled on the
    /// target, which is a skip, not an error.
    fn indicates_disabled(&self, family: AlertFamily) -> bool {
        match self {
            Self::Api(err) => err.indicates_disabled(family),
            Self::Enterprise(EnterpriseScanError::Api(err)) => err.indicates_disabled(family),
            _ => false,
        }
    }
}

/// What happened to each requested family during one run.
#[derive(Debug, Default)]
pub struct ReportSummary {
    pub completed: Vec<AlertFamily>,
    pub skipped_disabled: Vec<AlertFamily>,
    pub failed: Vec<(AlertFamily, String)>,
}

impl ReportSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportRunError {
    #[error("No GitHub credential found. Set GITHUB_PAT or GITHUB_TOKEN.")]
    MissingToken,
}

/// Run every enabled alert family for the configured scope. Families run
/// independently: a disabled feature is skipped, any other failure is recorded
/// in the summary and the remaining families still run.
pub async fn run_report(
    config: &Config,
    client: &reqwest::Client,
) -> Result<ReportSummary, ReportRunError> {
    let token = config
        .tokens
        .github
        .as_deref()
        .ok_or(ReportRunError::MissingToken)?;

    // Resolved at most once per run; only enterprise code scanning splits by
    // edition.
    let mut edition: Option<EnterpriseEdition> = None;

    let mut summary = ReportSummary::default();
    for family in AlertFamily::ALL {
        if !config.feature_enabled(family) {
            continue;
        }

        let result = match family {
            AlertFamily::CodeScanning => {
                run_code_scanning(config, client, token, &mut edition).await
            }
            AlertFamily::SecretScanning => run_secret_scanning(config, client, token).await,
            AlertFamily::Dependabot => run_dependabot(config, client, token).await,
        };

        match result {
            Ok(()) => summary.completed.push(family),
            Err(err) if err.indicates_disabled(family) => {
                log::info!(
                    "{} is not enabled for {}; skipping",
                    family,
                    config.scope_name
                );
                summary.skipped_disabled.push(family);
            }
            Err(err) => {
                log::error!("{} report for {} failed: {}", family, config.scope_name, err);
                summary.failed.push((family, err.to_string()));
            }
        }
    }
    Ok(summary)
}

async fn run_code_scanning(
    config: &Config,
    client: &reqwest::Client,
    token: &str,
    edition: &mut Option<EnterpriseEdition>,
) -> Result<(), FamilyError> {
    let path = config.output_dir.join(default_config::CS_LIST_FILE);
    match config.scope {
        Scope::Repository => {
            let alerts =
                code_scanning::repo_alerts(client, &config.api_endpoint, token, &config.scope_name)
                    .await?;
            csv_output::write_repo_cs_list(&path, &alerts)?;
        }
        Scope::Organization => {
            let alerts =
                code_scanning::org_alerts(client, &config.api_endpoint, token, &config.scope_name)
                    .await?;
            csv_output::write_org_cs_list(&path, &alerts)?;
        }
        Scope::Enterprise => {
            let edition = match edition {
                Some(edition) => *edition,
                None => {
                    let resolved =
                        EnterpriseEdition::resolve(client, &config.api_endpoint).await?;
                    *edition = Some(resolved);
                    resolved
                }
            };
            let EnterpriseCodeScanning { alerts, excluded } = code_scanning::enterprise_alerts(
                client,
                &config.api_endpoint,
                &config.web_endpoint,
                token,
                &config.scope_name,
                edition,
            )
            .await?;
            csv_output::write_org_cs_list(&path, &alerts)?;
            if !excluded.is_empty() {
                let excluded_path = config.output_dir.join(default_config::EXCLUDED_REPOS_FILE);
                csv_output::write_excluded_repos(&excluded_path, &excluded)?;
                log::warn!(
                    "{} repositories could not be read, see {:?}",
                    excluded.len(),
                    excluded_path
                );
            }
        }
    }
    log_written(&path);
    Ok(())
}

async fn run_secret_scanning(
    config: &Config,
    client: &reqwest::Client,
    token: &str,
) -> Result<(), FamilyError> {
    let path = config.output_dir.join(default_config::SECRETS_LIST_FILE);
    match config.scope {
        Scope::Repository => {
            let alerts = secret_scanning::repo_alerts(
                client,
                &config.api_endpoint,
                token,
                &config.scope_name,
            )
            .await?;
            csv_output::write_repo_secrets_list(&path, &alerts)?;
        }
        Scope::Organization => {
            let alerts = secret_scanning::org_alerts(
                client,
                &config.api_endpoint,
                token,
                &config.scope_name,
            )
            .await?;
            csv_output::write_org_secrets_list(&path, &alerts)?;
        }
        Scope::Enterprise => {
            let alerts = secret_scanning::enterprise_alerts(
                client,
                &config.api_endpoint,
                token,
                &config.scope_name,
            )
            .await?;
            csv_output::write_org_secrets_list(&path, &alerts)?;
        }
    }
    log_written(&path);
    Ok(())
}

async fn run_dependabot(
    config: &Config,
    client: &reqwest::Client,
    token: &str,
) -> Result<(), FamilyError> {
    let path = config.output_dir.join(default_config::DEPENDABOT_LIST_FILE);
    match config.scope {
        Scope::Repository => {
            let alerts =
                dependabot::repo_alerts(client, &config.api_endpoint, token, &config.scope_name)
                    .await?;
            csv_output::write_repo_dependabot_list(&path, &alerts)?;
        }
        Scope::Organization => {
            let alerts =
                dependabot::org_alerts(client, &config.api_endpoint, token, &config.scope_name)
                    .await?;
            csv_output::write_org_dependabot_list(&path, &alerts)?;
        }
        Scope::Enterprise => {
            let alerts = dependabot::enterprise_alerts(
                client,
                &config.api_endpoint,
                token,
                &config.scope_name,
            )
            .await?;
            csv_output::write_org_dependabot_list(&path, &alerts)?;
        }
    }
    log_written(&path);
    Ok(())
}

fn log_written(path: &Path) {
    log::info!("Report written to {:?}", path);
}
