//! Dependabot alert retrieval.
//!
//! These endpoints paginate with an opaque `after=` cursor instead of page
//! numbers; the shared fetch loop follows the `Link` header either way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    paginated_api::{ApiError, PaginatedAlertsIter},
    Actor, RepositoryInfo,
};

// https://docs.github.com/en/rest/dependabot/alerts#list-dependabot-alerts-for-a-repository
#[derive(Debug, Serialize, Deserialize)]
pub struct DependabotAlert {
    pub number: u64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fixed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dismissed_by: Option<Actor>,
    #[serde(default)]
    pub dismissed_reason: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub dependency: Dependency,
    pub security_vulnerability: SecurityVulnerability,
    pub security_advisory: SecurityAdvisory,
    #[serde(default)]
    pub repository: Option<RepositoryInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub manifest_path: Option<String>,
    #[serde(default)]
    pub package: Option<DependencyPackage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyPackage {
    #[serde(default)]
    pub ecosystem: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecurityVulnerability {
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecurityAdvisory {
    #[serde(default)]
    pub ghsa_id: Option<String>,
    #[serde(default)]
    pub cve_id: Option<String>,
    #[serde(default)]
    pub cvss: Option<Cvss>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cvss {
    #[serde(default)]
    pub score: Option<f64>,
}

/// Get all the Dependabot alerts on a given repository.
pub async fn repo_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    repo_name: &str,
) -> Result<Vec<DependabotAlert>, ApiError> {
    let url = format!("{api_endpoint}/repos/{repo_name}/dependabot/alerts?per_page=100&after=");
    let alerts: Vec<DependabotAlert> =
        PaginatedAlertsIter::new(client, &url, token)?.exhaust().await?;
    log::info!("Found {} Dependabot alerts in {}", alerts.len(), repo_name);
    Ok(alerts)
}

/// Get all the Dependabot alerts on a given organization.
pub async fn org_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    org_name: &str,
) -> Result<Vec<DependabotAlert>, ApiError> {
    let url = format!("{api_endpoint}/orgs/{org_name}/dependabot/alerts?per_page=100&after=");
    let alerts: Vec<DependabotAlert> =
        PaginatedAlertsIter::new(client, &url, token)?.exhaust().await?;
    log::info!("Found {} Dependabot alerts in {}", alerts.len(), org_name);
    Ok(alerts)
}

/// Get all the Dependabot alerts on a given enterprise. All editions share
/// this endpoint.
pub async fn enterprise_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    enterprise_slug: &str,
) -> Result<Vec<DependabotAlert>, ApiError> {
    let url = format!(
        "{api_endpoint}/enterprises/{enterprise_slug}/dependabot/alerts?per_page=100&after="
    );
    let alerts: Vec<DependabotAlert> =
        PaginatedAlertsIter::new(client, &url, token)?.exhaust().await?;
    log::info!(
        "Found {} Dependabot alerts in {}",
        alerts.len(),
        enterprise_slug
    );
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_deserializes_from_api_shape() {
        let alert: DependabotAlert = serde_json::from_value(serde_json::json!({
            "number": 2,
            "state": "dismissed",
            "created_at": "2022-06-15T07:43:03Z",
            "updated_at": "2022-08-23T14:29:47Z",
            "fixed_at": null,
            "dismissed_at": "2022-08-23T14:29:47Z",
            "dismissed_by": { "login": "octocat", "type": "User", "site_admin": false },
            "dismissed_reason": "tolerable_risk",
            "html_url": "https://github.com/octo-org/hello-world/security/dependabot/2",
            "dependency": {
                "manifest_path": "path/to/requirements.txt",
                "package": { "ecosystem": "pip", "name": "ansible" },
                "scope": "runtime"
            },
            "security_vulnerability": {
                "severity": "critical",
                "vulnerable_version_range": "< 2.8.4",
                "first_patched_version": { "identifier": "2.8.4" }
            },
            "security_advisory": {
                "ghsa_id": "GHSA-rm8v-mxj3-5rmq",
                "cve_id": "CVE-2021-20191",
                "cvss": { "score": 5.5, "vector_string": "CVSS:3.1/AV:L/AC:L/PR:L/UI:N/S:U/C:H/I:N/A:N" }
            }
        }))
        .unwrap();

        assert_eq!(alert.number, 2);
        assert_eq!(
            alert.dependency.package.as_ref().unwrap().ecosystem.as_deref(),
            Some("pip")
        );
        assert_eq!(
            alert.security_advisory.cvss.as_ref().unwrap().score,
            Some(5.5)
        );
        assert_eq!(alert.dismissed_by.unwrap().login.as_deref(), Some("octocat"));
    }

    #[test]
    fn auto_dismissed_state_passes_through() {
        // Newer deployments report states the original enum-less schema never
        // anticipated; state is a plain string for exactly that reason.
        let alert: DependabotAlert = serde_json::from_value(serde_json::json!({
            "number": 9,
            "state": "auto_dismissed",
            "created_at": "2023-01-09T09:00:00Z",
            "dependency": {},
            "security_vulnerability": {},
            "security_advisory": {}
        }))
        .unwrap();
        assert_eq!(alert.state, "auto_dismissed");
    }
}
