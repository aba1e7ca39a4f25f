use ghas_report::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // initialize env_logger with log level Info as default
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::from_env()?;
    log::info!(
        "Reporting on {:?} scope {} against {}",
        config.scope,
        config.scope_name,
        config.api_endpoint
    );

    let client = reqwest::Client::new();
    let summary = ghas_report::run_report(&config, &client).await?;

    if !summary.is_success() {
        for (family, message) in &summary.failed {
            log::error!("{family} did not complete: {message}");
        }
        anyhow::bail!("{} of the requested reports failed", summary.failed.len());
    }
    Ok(())
}
