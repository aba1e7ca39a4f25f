use std::path::PathBuf;

use clap::Parser;
use ghas_report::config::{parse_features, Config};

/// CSV reports of GitHub security alerts. Flags override the environment
/// configuration; the credential itself is only ever taken from the
/// environment (GITHUB_PAT or GITHUB_TOKEN).
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// REST endpoint, e.g. https://ghes.example.com/api/v3
    #[arg(long)]
    api_endpoint: Option<String>,
    /// Web endpoint of a GHES deployment, for the staff repository report
    #[arg(long)]
    server_endpoint: Option<String>,

    /// enterprise, organization or repository
    #[arg(short, long)]
    scope: Option<String>,
    /// Enterprise slug, organization login, or owner/repo
    #[arg(short = 'n', long)]
    scope_name: Option<String>,

    /// Comma-separated subset of codescanning,secretscanning,dependabot, or "all"
    #[arg(short, long)]
    features: Option<String>,

    /// Directory the CSV files are written into
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Cli::parse();
    // SCOPE_NAME is mandatory in the environment; seed it from the flag so a
    // flag-only invocation works too.
    if let Some(ref scope_name) = args.scope_name {
        std::env::set_var("SCOPE_NAME", scope_name);
    }
    let mut config = Config::from_env()?;

    if let Some(api_endpoint) = args.api_endpoint {
        config.api_endpoint = api_endpoint;
    }
    if let Some(server_endpoint) = args.server_endpoint {
        config.web_endpoint = server_endpoint;
    }
    if let Some(scope) = args.scope {
        config.scope = scope.parse()?;
    }
    if let Some(features) = args.features {
        config.features = parse_features(&features);
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let client = reqwest::Client::new();
    let summary = ghas_report::run_report(&config, &client).await?;

    log::info!(
        "Done: {} completed, {} skipped (feature disabled), {} failed",
        summary.completed.len(),
        summary.skipped_disabled.len(),
        summary.failed.len()
    );
    if !summary.is_success() {
        anyhow::bail!("{} of the requested reports failed", summary.failed.len());
    }
    Ok(())
}
