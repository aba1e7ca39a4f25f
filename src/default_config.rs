use const_format::concatcp;

const CLOUD_HOST: &str = "github.com";

/// REST endpoint of the public cloud. Anything else is treated as a
/// GHES / GitHub AE deployment.
pub const CLOUD_API_ENDPOINT: &str = concatcp!("https://api.", CLOUD_HOST);

/// Web (non-API) endpoint, used for the staff repository report on servers.
pub const CLOUD_WEB_ENDPOINT: &str = concatcp!("https://", CLOUD_HOST);

/// Path of the staff report listing every repository on a server.
pub const REPO_REPORT_PATH: &str = "/stafftools/reports/all_repositories.csv";

/// Output file names, one per alert family, plus the side file for
/// repositories the legacy enterprise loop could not read.
pub const CS_LIST_FILE: &str = "cs_list.csv";
pub const SECRETS_LIST_FILE: &str = "secrets_list.csv";
pub const DEPENDABOT_LIST_FILE: &str = "dependabot_list.csv";
pub const EXCLUDED_REPOS_FILE: &str = "excluded_repos.csv";

pub const OUTPUT_DIR: &str = ".";
