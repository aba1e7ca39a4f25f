//! # GitHub Advanced Security reporting
//!
//! This module includes functionality for retrieving security alert data from the
//! GitHub REST API and flattening it into CSV reports.
//!
//! This module is subdivided in different parts. See each submodule for details.
//!
//!  - [paginated_api]: The paginated fetch loop shared by every retriever. Follows
//!    the `Link: rel="next"` header until exhausted. Requires token.
//!  - [code_scanning], [secret_scanning], [dependabot]: Per-family retrievers for
//!    repository, organization and enterprise scope. The returned records carry an
//!    optional repository payload so one row schema covers every scope.
//!  - [enterprise]: GHES/GHEC edition resolution and the `all_repositories.csv`
//!    staff report enumerator used on servers without an enterprise-wide
//!    code scanning endpoint.
//!  - [csv_output]: Row flattening and file writing. Pure formatting.

pub mod code_scanning;
pub mod csv_output;
pub mod dependabot;
pub mod enterprise;
pub mod paginated_api;
pub mod secret_scanning;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One of the three alert APIs a report can cover.
///
/// Parameterizes feature selection, URL construction and the disabled-feature
/// error classification in [paginated_api].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFamily {
    CodeScanning,
    SecretScanning,
    Dependabot,
}

impl AlertFamily {
    pub const ALL: [Self; 3] = [Self::CodeScanning, Self::SecretScanning, Self::Dependabot];

    /// Path segment used by the alerts endpoints (`.../{path_str}/alerts`).
    pub fn path_str(self) -> &'static str {
        match self {
            Self::CodeScanning => "code-scanning",
            Self::SecretScanning => "secret-scanning",
            Self::Dependabot => "dependabot",
        }
    }

    /// Name accepted in the feature selection list.
    pub fn feature_str(self) -> &'static str {
        match self {
            Self::CodeScanning => "codescanning",
            Self::SecretScanning => "secretscanning",
            Self::Dependabot => "dependabot",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::CodeScanning => "code scanning",
            Self::SecretScanning => "secret scanning",
            Self::Dependabot => "Dependabot",
        }
    }
}

impl Display for AlertFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The user attached to `resolved_by`, `dismissed_by` and repository `owner`
/// payloads. Every field is optional because GHES trims this object down in
/// some shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub site_admin: Option<bool>,
}

/// Repository payload attached to alerts retrieved at organization or
/// enterprise scope. Repository-scoped responses omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub id: Option<u64>,
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<Actor>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub fork: Option<bool>,
    #[serde(default)]
    pub private: Option<bool>,
}

impl RepositoryInfo {
    /// Minimal payload for alerts fetched repo-by-repo on legacy servers,
    /// where the per-repository endpoints return no repository object.
    pub fn from_repo_id(repo: &enterprise::RepoId) -> Self {
        Self {
            id: None,
            full_name: repo.full_name(),
            owner: Some(Actor {
                login: Some(repo.owner.clone()),
                kind: Some("Organization".to_owned()),
                site_admin: None,
            }),
            html_url: None,
            fork: None,
            private: None,
        }
    }
}

/// Composite alert identity. Alert numbers restart at 1 in every repository,
/// so dedup across repositories has to key on the owning repository as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertIdentity {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl AlertIdentity {
    /// Build from an `owner/name` repository string and the alert number.
    pub fn new(full_name: &str, number: u64) -> Self {
        let (owner, repo) = match full_name.split_once('/') {
            Some((owner, repo)) => (owner.to_owned(), repo.to_owned()),
            None => (String::new(), full_name.to_owned()),
        };
        Self {
            owner,
            repo,
            number,
        }
    }
}

impl Display for AlertIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_splits_full_name() {
        let identity = AlertIdentity::new("octo-org/hello-world", 7);
        assert_eq!(identity.owner, "octo-org");
        assert_eq!(identity.repo, "hello-world");
        assert_eq!(identity.number, 7);
        assert_eq!(identity.to_string(), "octo-org/hello-world#7");
    }

    #[test]
    fn same_number_in_different_repos_is_distinct() {
        let a = AlertIdentity::new("octo-org/alpha", 1);
        let b = AlertIdentity::new("octo-org/beta", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn family_names() {
        assert_eq!(AlertFamily::CodeScanning.path_str(), "code-scanning");
        assert_eq!(AlertFamily::SecretScanning.feature_str(), "secretscanning");
        assert_eq!(AlertFamily::Dependabot.to_string(), "Dependabot");
    }
}
