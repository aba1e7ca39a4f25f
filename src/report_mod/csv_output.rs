//! CSV flattening and file writing.
//!
//! Pure formatting: every retriever hands over its normalized records and the
//! writers flatten them into the per-scope column layouts. Organization and
//! enterprise layouts append the repository context columns; absent values
//! become empty cells.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{
    code_scanning::CodeScanningAlert, dependabot::DependabotAlert, enterprise::RepoId,
    secret_scanning::SecretScanningAlert, Actor, RepositoryInfo,
};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

const CS_COLUMNS: &[&str] = &[
    "number",
    "created_at",
    "html_url",
    "state",
    "fixed_at",
    "dismissed_by",
    "dismissed_at",
    "dismissed_reason",
    "rule_id",
    "rule_severity",
    "security_severity_level",
    "rule_tags",
    "rule_description",
    "rule_name",
    "tool_name",
    "tool_version",
    "most_recent_instance_ref",
    "most_recent_instance_state",
    "most_recent_instance_sha",
    "most_recent_instance_category",
    "most_recent_instance_location_path",
    "instances_url",
];

const SECRETS_COLUMNS: &[&str] = &[
    "number",
    "created_at",
    "html_url",
    "state",
    "resolution",
    "resolved_at",
    "resolved_by_username",
    "resolved_by_type",
    "resolved_by_isadmin",
    "secret_type",
    "secret_type_display_name",
    "validity",
    "publicly_leaked",
    "multi_repo",
    "push_protection_bypassed",
    "push_protection_bypassed_by",
    "push_protection_bypassed_at",
    "first_location_path",
];

const DEPENDABOT_COLUMNS: &[&str] = &[
    "number",
    "state",
    "created_at",
    "updated_at",
    "fixed_at",
    "dismissed_at",
    "dismissed_by",
    "dismissed_reason",
    "html_url",
    "dependency_manifest",
    "dependency_ecosystem",
    "dependency_name",
    "severity",
    "ghsa_id",
    "cve_id",
    "cvss_score",
];

const REPO_CONTEXT_COLUMNS: &[&str] = &[
    "repo_name",
    "repo_owner",
    "repo_owner_type",
    "repo_owner_isadmin",
    "repo_url",
    "repo_isfork",
    "repo_isprivate",
];

fn time(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_bool(value: &Option<bool>) -> String {
    value.map(|b| b.to_string()).unwrap_or_default()
}

fn actor_login(actor: &Option<Actor>) -> String {
    actor
        .as_ref()
        .and_then(|a| a.login.clone())
        .unwrap_or_default()
}

fn actor_kind(actor: &Option<Actor>) -> String {
    actor
        .as_ref()
        .and_then(|a| a.kind.clone())
        .unwrap_or_default()
}

fn actor_admin(actor: &Option<Actor>) -> String {
    actor
        .as_ref()
        .and_then(|a| a.site_admin)
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub(crate) fn cs_base_row(alert: &CodeScanningAlert) -> Vec<String> {
    let instance = &alert.most_recent_instance;
    vec![
        alert.number.to_string(),
        alert.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        alert.html_url.clone(),
        alert.state.clone(),
        time(&alert.fixed_at),
        actor_login(&alert.dismissed_by),
        time(&alert.dismissed_at),
        opt(&alert.dismissed_reason),
        opt(&alert.rule.id),
        opt(&alert.rule.severity),
        opt(&alert.rule.security_severity_level),
        alert.rule.tags.as_deref().unwrap_or_default().join(","),
        opt(&alert.rule.description),
        opt(&alert.rule.name),
        opt(&alert.tool.name),
        opt(&alert.tool.version),
        opt(&instance.git_ref),
        opt(&instance.state),
        opt(&instance.commit_sha),
        opt(&instance.category),
        instance
            .location
            .as_ref()
            .and_then(|location| location.path.clone())
            .unwrap_or_default(),
        alert.instances_url.clone(),
    ]
}

pub(crate) fn secrets_base_row(alert: &SecretScanningAlert) -> Vec<String> {
    vec![
        alert.number.to_string(),
        alert.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        alert.html_url.clone(),
        alert.state.clone(),
        opt(&alert.resolution),
        time(&alert.resolved_at),
        actor_login(&alert.resolved_by),
        actor_kind(&alert.resolved_by),
        actor_admin(&alert.resolved_by),
        alert.secret_type.clone(),
        opt(&alert.secret_type_display_name),
        opt(&alert.validity),
        opt_bool(&alert.publicly_leaked),
        opt_bool(&alert.multi_repo),
        opt_bool(&alert.push_protection_bypassed),
        actor_login(&alert.push_protection_bypassed_by),
        time(&alert.push_protection_bypassed_at),
        alert
            .first_location_detected
            .as_ref()
            .and_then(|location| location.path.clone())
            .unwrap_or_default(),
    ]
}

pub(crate) fn dependabot_base_row(alert: &DependabotAlert) -> Vec<String> {
    let package = alert.dependency.package.as_ref();
    vec![
        alert.number.to_string(),
        alert.state.clone(),
        alert.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        time(&alert.updated_at),
        time(&alert.fixed_at),
        time(&alert.dismissed_at),
        actor_login(&alert.dismissed_by),
        opt(&alert.dismissed_reason),
        alert.html_url.clone(),
        opt(&alert.dependency.manifest_path),
        package.map(|p| opt(&p.ecosystem)).unwrap_or_default(),
        package.map(|p| opt(&p.name)).unwrap_or_default(),
        opt(&alert.security_vulnerability.severity),
        alert
            .security_advisory
            .ghsa_id
            .clone()
            .unwrap_or_default(),
        alert.security_advisory.cve_id.clone().unwrap_or_default(),
        alert
            .security_advisory
            .cvss
            .as_ref()
            .and_then(|cvss| cvss.score)
            .map(|score| score.to_string())
            .unwrap_or_default(),
    ]
}

pub(crate) fn context_row(repository: Option<&RepositoryInfo>) -> Vec<String> {
    match repository {
        Some(repo) => vec![
            repo.full_name.clone(),
            actor_login(&repo.owner),
            actor_kind(&repo.owner),
            actor_admin(&repo.owner),
            opt(&repo.html_url),
            opt_bool(&repo.fork),
            opt_bool(&repo.private),
        ],
        None => vec![String::new(); REPO_CONTEXT_COLUMNS.len()],
    }
}

fn write_rows<'a, T: 'a, I, F>(
    path: &Path,
    columns: &[&str],
    with_context: bool,
    records: I,
    base_row: F,
    repository: fn(&T) -> Option<&RepositoryInfo>,
) -> Result<(), WriteError>
where
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> Vec<String>,
{
    let mut writer = csv::WriterBuilder::new().from_path(path)?;

    let mut header: Vec<&str> = columns.to_vec();
    if with_context {
        header.extend_from_slice(REPO_CONTEXT_COLUMNS);
    }
    writer.write_record(&header)?;

    for record in records {
        let mut row = base_row(record);
        if with_context {
            row.extend(context_row(repository(record)));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the list of repository code scanning alerts to a csv file.
pub fn write_repo_cs_list(path: &Path, alerts: &[CodeScanningAlert]) -> Result<(), WriteError> {
    write_rows(path, CS_COLUMNS, false, alerts, cs_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the list of organization or enterprise code scanning alerts to a csv
/// file, repository context included.
pub fn write_org_cs_list(path: &Path, alerts: &[CodeScanningAlert]) -> Result<(), WriteError> {
    write_rows(path, CS_COLUMNS, true, alerts, cs_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the list of repository secret scanning alerts to a csv file.
pub fn write_repo_secrets_list(
    path: &Path,
    alerts: &[SecretScanningAlert],
) -> Result<(), WriteError> {
    write_rows(path, SECRETS_COLUMNS, false, alerts, secrets_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the list of organization or enterprise secret scanning alerts to a
/// csv file, repository context included.
pub fn write_org_secrets_list(
    path: &Path,
    alerts: &[SecretScanningAlert],
) -> Result<(), WriteError> {
    write_rows(path, SECRETS_COLUMNS, true, alerts, secrets_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the list of repository Dependabot alerts to a csv file.
pub fn write_repo_dependabot_list(
    path: &Path,
    alerts: &[DependabotAlert],
) -> Result<(), WriteError> {
    write_rows(path, DEPENDABOT_COLUMNS, false, alerts, dependabot_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the list of organization or enterprise Dependabot alerts to a csv
/// file, repository context included.
pub fn write_org_dependabot_list(
    path: &Path,
    alerts: &[DependabotAlert],
) -> Result<(), WriteError> {
    write_rows(path, DEPENDABOT_COLUMNS, true, alerts, dependabot_base_row, |alert| {
        alert.repository.as_ref()
    })
}

/// Write the repositories the legacy enterprise loop could not read. One
/// `owner/name` per row.
pub fn write_excluded_repos(path: &Path, excluded: &[RepoId]) -> Result<(), WriteError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(["repository"])?;
    for repo in excluded {
        writer.write_record([repo.full_name()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_mod::{
        code_scanning::{
            CodeScanningInstance, CodeScanningLocation, CodeScanningRule, CodeScanningTool,
        },
        secret_scanning::SecretScanningAlert,
    };

    fn cs_alert(repository: Option<RepositoryInfo>) -> CodeScanningAlert {
        CodeScanningAlert {
            number: 4,
            created_at: "2020-02-13T12:29:18Z".parse().unwrap(),
            updated_at: None,
            html_url: "https://github.com/acme/api/code-scanning/4".to_owned(),
            instances_url: "https://api.github.com/repos/acme/api/code-scanning/alerts/4/instances"
                .to_owned(),
            state: "open".to_owned(),
            fixed_at: None,
            dismissed_by: None,
            dismissed_at: None,
            dismissed_reason: None,
            rule: CodeScanningRule {
                id: Some("js/zipslip".to_owned()),
                severity: Some("error".to_owned()),
                security_severity_level: None,
                tags: Some(vec!["security".to_owned(), "external/cwe/cwe-022".to_owned()]),
                description: Some("Arbitrary file write during zip extraction".to_owned()),
                name: Some("js/zipslip".to_owned()),
            },
            tool: CodeScanningTool {
                name: Some("CodeQL".to_owned()),
                version: None,
            },
            most_recent_instance: CodeScanningInstance {
                git_ref: Some("refs/heads/main".to_owned()),
                state: Some("open".to_owned()),
                commit_sha: Some("39406e42cb832f68".to_owned()),
                category: None,
                location: Some(CodeScanningLocation {
                    path: Some("lib/ab12-gen.js".to_owned()),
                }),
            },
            repository,
        }
    }

    #[test]
    fn null_fields_flatten_to_empty_cells() {
        let row = cs_base_row(&cs_alert(None));
        assert_eq!(row.len(), CS_COLUMNS.len());
        assert_eq!(row[0], "4");
        assert_eq!(row[1], "2020-02-13T12:29:18Z");
        assert_eq!(row[4], ""); // fixed_at
        assert_eq!(row[5], ""); // dismissed_by
        assert_eq!(row[11], "security,external/cwe/cwe-022");
        assert_eq!(row[15], ""); // tool_version
        assert_eq!(row[20], "lib/ab12-gen.js");
    }

    #[test]
    fn context_columns_only_in_org_layout() {
        let repository = RepositoryInfo {
            id: Some(1),
            full_name: "acme/api".to_owned(),
            owner: Some(Actor {
                login: Some("acme".to_owned()),
                kind: Some("Organization".to_owned()),
                site_admin: Some(false),
            }),
            html_url: Some("https://github.com/acme/api".to_owned()),
            fork: Some(false),
            private: Some(true),
        };
        let context = context_row(Some(&repository));
        assert_eq!(
            context,
            vec!["acme/api", "acme", "Organization", "false", "https://github.com/acme/api", "false", "true"]
        );
        assert_eq!(context_row(None), vec![String::new(); 7]);

        let base = cs_base_row(&cs_alert(Some(repository)));
        assert_eq!(base.len(), CS_COLUMNS.len());
    }

    #[test]
    fn secrets_row_flattens_resolved_by() {
        let alert: SecretScanningAlert = serde_json::from_value(serde_json::json!({
            "number": 42,
            "created_at": "2020-11-06T18:18:30Z",
            "html_url": "https://github.com/acme/api/security/secret-scanning/42",
            "state": "resolved",
            "resolution": "false_positive",
            "resolved_at": "2020-11-07T02:47:13Z",
            "resolved_by": { "login": "monalisa", "type": "User", "site_admin": true },
            "secret_type": "mailchimp_api_key",
            "secret_type_display_name": "Mailchimp API Key"
        }))
        .unwrap();
        let row = secrets_base_row(&alert);
        assert_eq!(row.len(), SECRETS_COLUMNS.len());
        assert_eq!(row[6], "monalisa");
        assert_eq!(row[7], "User");
        assert_eq!(row[8], "true");
        assert_eq!(row[11], ""); // validity absent on this shape

        let unresolved: SecretScanningAlert = serde_json::from_value(serde_json::json!({
            "number": 1,
            "created_at": "2020-11-06T18:18:30Z",
            "html_url": "",
            "state": "open",
            "secret_type": "adafruit_io_key"
        }))
        .unwrap();
        let row = secrets_base_row(&unresolved);
        assert_eq!(row[6], "");
        assert_eq!(row[8], "");
    }

    #[test]
    fn files_get_written_with_headers() {
        let dir = std::env::temp_dir().join("ghas_report_csv_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cs_list.csv");

        write_org_cs_list(&path, &[cs_alert(None)]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("number,created_at"));
        assert!(header.ends_with("repo_url,repo_isfork,repo_isprivate"));
        assert_eq!(lines.count(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
