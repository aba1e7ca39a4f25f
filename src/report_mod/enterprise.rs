//! Enterprise edition differences.
//!
//! GHEC, GHES >= 3.7 and GitHub AE expose an enterprise-wide code scanning
//! alerts endpoint. Older GHES does not, so alerts have to be collected
//! repo-by-repo from the `all_repositories.csv` staff report. Everything that
//! decides between those two worlds lives here.

use std::{fmt::Display, io, time::Duration};

use serde::Deserialize;

use crate::default_config as defaults;

/// Fixed back-off between polls of the report-generation endpoint.
const REPORT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Owner-type, owner-login and repo-name column positions inside
/// `all_repositories.csv`.
const REPORT_OWNER_TYPE_COLUMN: usize = 2;
const REPORT_OWNER_LOGIN_COLUMN: usize = 3;
const REPORT_REPO_NAME_COLUMN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Failed to make request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub meta endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("installed_version missing from the meta response; refusing to guess the server edition")]
    Unresolved,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to make request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Repository report returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Which kind of GitHub deployment the report is running against. Decides the
/// enterprise code scanning retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterpriseEdition {
    /// github.com
    Cloud,
    /// GHES 3.5 / 3.6, no enterprise-wide code scanning endpoint
    ServerLegacy,
    /// GHES >= 3.7 and GitHub AE
    ServerModern,
}

impl EnterpriseEdition {
    /// Classify a server's `installed_version` string.
    pub fn classify_version(installed_version: &str) -> Self {
        if installed_version.starts_with("3.5") || installed_version.starts_with("3.6") {
            Self::ServerLegacy
        } else {
            Self::ServerModern
        }
    }

    /// Determine the edition for an API endpoint. The public cloud endpoint is
    /// recognized without any network call; anything else is asked via its
    /// unauthenticated `/meta` endpoint.
    pub async fn resolve(
        client: &reqwest::Client,
        api_endpoint: &str,
    ) -> Result<Self, VersionError> {
        if api_endpoint == defaults::CLOUD_API_ENDPOINT {
            return Ok(Self::Cloud);
        }

        let url = format!("{api_endpoint}/meta");
        log::debug!("Resolving server edition via {url}");
        let response = client
            .get(&url)
            .header(reqwest::header::USER_AGENT, "ghas-report")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VersionError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let meta = response.json::<MetaResponse>().await?;
        match meta.installed_version {
            Some(version) => {
                let edition = Self::classify_version(&version);
                log::info!("Server reports version {version} ({edition:?})");
                Ok(edition)
            }
            None => Err(VersionError::Unresolved),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    installed_version: Option<String>,
}

/// An `owner/name` repository identifier from the staff report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Lazy, single-pass sequence of organization-owned repositories parsed out of
/// the `all_repositories.csv` report.
///
/// Rows owned by users are skipped — personal repositories cannot enable code
/// scanning. The header row falls out of the same filter. Each row is read
/// exactly once; the sequence is not restartable.
pub struct OrgRepositories {
    records: csv::StringRecordsIntoIter<io::Cursor<String>>,
}

impl OrgRepositories {
    /// Wrap an already-downloaded report body.
    pub fn from_report_body(body: String) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(io::Cursor::new(body));
        Self {
            records: reader.into_records(),
        }
    }
}

impl Iterator for OrgRepositories {
    type Item = Result<RepoId, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err)),
            };
            if record.get(REPORT_OWNER_TYPE_COLUMN) != Some("Organization") {
                continue;
            }
            return Some(Ok(RepoId {
                owner: record
                    .get(REPORT_OWNER_LOGIN_COLUMN)
                    .unwrap_or_default()
                    .to_owned(),
                name: record
                    .get(REPORT_REPO_NAME_COLUMN)
                    .unwrap_or_default()
                    .to_owned(),
            }));
        }
    }
}

/// Request the `all_repositories.csv` report from the server's web (not API)
/// endpoint and hand back the organization-owned repositories it lists.
///
/// A 202 means the server is still generating the report; the same URL is
/// polled on a fixed interval until it answers something else. Only a 200 ever
/// yields repositories — anything else is fatal for the caller.
pub async fn fetch_all_repositories_report(
    client: &reqwest::Client,
    web_endpoint: &str,
    token: &str,
) -> Result<OrgRepositories, ReportError> {
    let url = format!("{web_endpoint}{}", defaults::REPO_REPORT_PATH);
    loop {
        let response = client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .header(reqwest::header::USER_AGENT, "ghas-report")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::ACCEPTED {
            log::info!(
                "Repository report is still being generated, waiting {}s before the next check ...",
                REPORT_POLL_INTERVAL.as_secs()
            );
            tokio::time::sleep(REPORT_POLL_INTERVAL).await;
            continue;
        }
        if status != reqwest::StatusCode::OK {
            return Err(ReportError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        log::info!("Repository report is ready, reading it now ...");
        let body = response.text().await?;
        return Ok(OrgRepositories::from_report_body(body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_versions_classified() {
        assert_eq!(
            EnterpriseEdition::classify_version("3.5.11"),
            EnterpriseEdition::ServerLegacy
        );
        assert_eq!(
            EnterpriseEdition::classify_version("3.6.4"),
            EnterpriseEdition::ServerLegacy
        );
    }

    #[test]
    fn modern_versions_classified() {
        assert_eq!(
            EnterpriseEdition::classify_version("3.7.0"),
            EnterpriseEdition::ServerModern
        );
        assert_eq!(
            EnterpriseEdition::classify_version("3.8.0"),
            EnterpriseEdition::ServerModern
        );
        assert_eq!(
            EnterpriseEdition::classify_version("GitHub AE"),
            EnterpriseEdition::ServerModern
        );
    }

    #[tokio::test]
    async fn cloud_endpoint_resolved_without_network() {
        // No server is listening anywhere in this test; a request would error.
        let client = reqwest::Client::new();
        let edition = EnterpriseEdition::resolve(&client, defaults::CLOUD_API_ENDPOINT)
            .await
            .unwrap();
        assert_eq!(edition, EnterpriseEdition::Cloud);
    }

    #[test]
    fn report_rows_filtered_to_organizations_in_order() {
        let body = "\
id,url,owner_type,owner_login,owner_id,repo_name,visibility
1,https://ghes.example.com/acme/api,Organization,acme,10,api,private
2,https://ghes.example.com/jdoe/dotfiles,User,jdoe,11,dotfiles,public
3,https://ghes.example.com/acme/web,Organization,acme,10,web,private
"
        .to_owned();

        let repos: Vec<RepoId> = OrgRepositories::from_report_body(body)
            .map(|row| row.unwrap())
            .collect();
        assert_eq!(
            repos,
            vec![
                RepoId {
                    owner: "acme".to_owned(),
                    name: "api".to_owned()
                },
                RepoId {
                    owner: "acme".to_owned(),
                    name: "web".to_owned()
                },
            ]
        );
        assert_eq!(repos[0].to_string(), "acme/api");
    }

    #[test]
    fn empty_report_yields_nothing() {
        let mut repos = OrgRepositories::from_report_body(String::new());
        assert!(repos.next().is_none());
    }
}
