use anyhow::Context;
use clap::Parser;
use deploy::config::DeployConfig;
use deploy::deployment::run;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DeployConfig::parse();
    let info = run(&config).context("deployment failed")?;

    println!("Deployment info saved to: {}", config.output.display());
    println!();
    println!("{info}");
    Ok(())
}
