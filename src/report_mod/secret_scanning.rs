//! Secret scanning alert retrieval.
//!
//! Every invocation performs two fetches: the default query, which only covers
//! the provider-pattern secret types, and a second query filtered to the
//! generic patterns the API leaves out unless asked. The two result sets are
//! merged with a set union keyed on the composite alert identity.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    paginated_api::{ApiError, PaginatedAlertsIter},
    Actor, AlertIdentity, RepositoryInfo,
};

/// Secret types the default query does not return. Kept as an explicit list so
/// a change in the API's default subset shows up as duplicate warnings rather
/// than silently missing rows.
pub const GENERIC_SECRET_TYPES: &[&str] = &[
    "http_basic_authentication_header",
    "http_bearer_authentication_header",
    "mongodb_connection_string",
    "mysql_connection_string",
    "openssh_private_key",
    "pgp_private_key",
    "postgres_connection_string",
    "rsa_private_key",
];

// https://docs.github.com/en/rest/secret-scanning/secret-scanning#list-secret-scanning-alerts-for-a-repository
//
// The trailing optionals only exist on newer deployments; GHES 3.5/3.6
// responses simply omit them.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretScanningAlert {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<Actor>,
    pub secret_type: String,
    #[serde(default)]
    pub secret_type_display_name: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub publicly_leaked: Option<bool>,
    #[serde(default)]
    pub multi_repo: Option<bool>,
    #[serde(default)]
    pub push_protection_bypassed: Option<bool>,
    #[serde(default)]
    pub push_protection_bypassed_by: Option<Actor>,
    #[serde(default)]
    pub push_protection_bypassed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_location_detected: Option<SecretLocation>,
    #[serde(default)]
    pub repository: Option<RepositoryInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecretLocation {
    #[serde(default)]
    pub path: Option<String>,
}

impl SecretScanningAlert {
    /// Composite identity for dedup. Repository-scoped responses carry no
    /// repository payload, so the requested repository name stands in.
    fn identity(&self, fallback_repo: &str) -> AlertIdentity {
        match &self.repository {
            Some(repository) => AlertIdentity::new(&repository.full_name, self.number),
            None => AlertIdentity::new(fallback_repo, self.number),
        }
    }
}

/// Get all the secret scanning alerts on a given repository.
pub async fn repo_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    repo_name: &str,
) -> Result<Vec<SecretScanningAlert>, ApiError> {
    let base = format!("{api_endpoint}/repos/{repo_name}/secret-scanning/alerts");
    fetch_default_and_generic(client, &base, token, repo_name).await
}

/// Get all the secret scanning alerts on a given organization.
pub async fn org_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    org_name: &str,
) -> Result<Vec<SecretScanningAlert>, ApiError> {
    let base = format!("{api_endpoint}/orgs/{org_name}/secret-scanning/alerts");
    fetch_default_and_generic(client, &base, token, org_name).await
}

/// Get all the secret scanning alerts on a given enterprise. All editions
/// share this endpoint.
pub async fn enterprise_alerts(
    client: &reqwest::Client,
    api_endpoint: &str,
    token: &str,
    enterprise_slug: &str,
) -> Result<Vec<SecretScanningAlert>, ApiError> {
    let base = format!("{api_endpoint}/enterprises/{enterprise_slug}/secret-scanning/alerts");
    fetch_default_and_generic(client, &base, token, enterprise_slug).await
}

/// Run the default query and the generic-pattern query, then merge.
async fn fetch_default_and_generic(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    scope_name: &str,
) -> Result<Vec<SecretScanningAlert>, ApiError> {
    let default_url = format!("{base_url}?per_page=100&page=1");
    let default_alerts: Vec<SecretScanningAlert> =
        PaginatedAlertsIter::new(client, &default_url, token)?.exhaust().await?;

    let generic_url = format!(
        "{base_url}?per_page=100&page=1&secret_type={}",
        GENERIC_SECRET_TYPES.join(",")
    );
    let generic_alerts: Vec<SecretScanningAlert> =
        PaginatedAlertsIter::new(client, &generic_url, token)?.exhaust().await?;

    let merged = merge_deduplicated(default_alerts, generic_alerts, scope_name);
    log::info!(
        "Found {} secret scanning alerts in {}",
        merged.len(),
        scope_name
    );
    Ok(merged)
}

/// Set union of the two result sets, keyed on the composite identity. A
/// repeated identity is counted once and warned about: the generic-pattern
/// query is expected to be disjoint from the default one, so overlap means the
/// API's default subset changed upstream.
fn merge_deduplicated(
    default_alerts: Vec<SecretScanningAlert>,
    generic_alerts: Vec<SecretScanningAlert>,
    fallback_repo: &str,
) -> Vec<SecretScanningAlert> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(default_alerts.len() + generic_alerts.len());
    for alert in default_alerts.into_iter().chain(generic_alerts) {
        let identity = alert.identity(fallback_repo);
        if seen.insert(identity.clone()) {
            merged.push(alert);
        } else {
            log::warn!(
                "Secret scanning alert {identity} was returned by both the default and the generic-pattern query; counting it once"
            );
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(number: u64, repo: Option<&str>) -> SecretScanningAlert {
        SecretScanningAlert {
            number,
            created_at: "2022-09-15T10:00:00Z".parse().unwrap(),
            updated_at: None,
            html_url: String::new(),
            state: "open".to_owned(),
            resolution: None,
            resolved_at: None,
            resolved_by: None,
            secret_type: "rsa_private_key".to_owned(),
            secret_type_display_name: Some("RSA Private Key".to_owned()),
            validity: None,
            publicly_leaked: None,
            multi_repo: None,
            push_protection_bypassed: None,
            push_protection_bypassed_by: None,
            push_protection_bypassed_at: None,
            first_location_detected: None,
            repository: repo.map(|full_name| RepositoryInfo {
                id: None,
                full_name: full_name.to_owned(),
                owner: None,
                html_url: None,
                fork: None,
                private: None,
            }),
        }
    }

    #[test]
    fn overlapping_queries_are_union_merged() {
        let default_alerts = vec![alert(1, None), alert(2, None), alert(3, None)];
        let generic_alerts = vec![alert(3, None), alert(4, None)];

        let merged = merge_deduplicated(default_alerts, generic_alerts, "acme/api");
        let numbers: Vec<u64> = merged.iter().map(|a| a.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn same_number_across_repositories_is_not_collapsed() {
        let default_alerts = vec![alert(1, Some("acme/api")), alert(1, Some("acme/web"))];
        let merged = merge_deduplicated(default_alerts, Vec::new(), "acme");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn later_shape_fields_deserialize_and_default() {
        let alert: SecretScanningAlert = serde_json::from_value(serde_json::json!({
            "number": 42,
            "created_at": "2020-11-06T18:18:30Z",
            "html_url": "https://github.com/owner/private-repo/security/secret-scanning/42",
            "state": "resolved",
            "resolution": "used_in_tests",
            "resolved_at": "2020-11-07T02:47:13Z",
            "resolved_by": { "login": "monalisa", "type": "User", "site_admin": true },
            "secret_type": "mailchimp_api_key",
            "secret_type_display_name": "Mailchimp API Key",
            "validity": "inactive",
            "publicly_leaked": false,
            "multi_repo": false,
            "push_protection_bypassed": true,
            "push_protection_bypassed_by": { "login": "monalisa", "type": "User", "site_admin": true },
            "push_protection_bypassed_at": "2020-11-06T21:48:51Z",
            "first_location_detected": { "path": "/example/secrets.txt", "start_line": 1 }
        }))
        .unwrap();
        assert_eq!(alert.validity.as_deref(), Some("inactive"));
        assert_eq!(
            alert.first_location_detected.unwrap().path.as_deref(),
            Some("/example/secrets.txt")
        );

        // GHES 3.5-era shape: none of the newer fields present.
        let alert: SecretScanningAlert = serde_json::from_value(serde_json::json!({
            "number": 2,
            "created_at": "2020-11-06T18:18:30Z",
            "html_url": "",
            "state": "open",
            "secret_type": "adafruit_io_key"
        }))
        .unwrap();
        assert_eq!(alert.validity, None);
        assert_eq!(alert.push_protection_bypassed, None);
        assert_eq!(alert.secret_type_display_name, None);
    }
}
