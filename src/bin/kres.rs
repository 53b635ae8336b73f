//! kres - kernel resolution CLI
//!
//! Loads the kernel definitions file, resolves every configured
//! distribution against its upstream (or the artifact mirror) and
//! renders the resulting worklist in the requested report formats.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use kres_core::fetch::packages::{PackageApi, RepoPage, RhApiClient, RhPackage};
use kres_core::{
    ArtifactStore, ArtifactoryClient, DistroFamily, Distributions, GithubTagClient, KernelCache,
    KresError, ReportFormat, ResolutionReport, Resolver, RetryingClient,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kres")]
#[command(version = kres_core::VERSION)]
#[command(about = "Kernel resolution and cache reconciliation", long_about = None)]
struct Cli {
    /// Definitions of the kernel versions to resolve
    #[arg(long, default_value = "./kernellist.yaml")]
    config: PathBuf,

    /// Artifact repository base URL
    #[arg(long = "art-base-url", default_value = "https://artifactory.invalid/artifactory/")]
    art_base_url: String,

    /// Cache-synchronization mode: list the upstreams and reconcile
    /// against the artifact cache. Requires ARTIFACTORY_TOKEN.
    #[arg(long)]
    sync: bool,

    /// Report output, format_name[,output file path]. Known formats:
    /// table, json, yaml, csv. Repeatable.
    #[arg(long = "format")]
    formats: Vec<String>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

/// Package catalog backend for the run. RHEL resolution needs the
/// authenticated client; every other family never calls it.
enum PackageBackend {
    Rh(RhApiClient),
    Unconfigured,
}

impl PackageApi for PackageBackend {
    async fn list_page(&self, repo: &str, offset: u64) -> kres_core::Result<RepoPage> {
        match self {
            PackageBackend::Rh(client) => client.list_page(repo, offset).await,
            PackageBackend::Unconfigured => Err(KresError::Configuration(
                "RH_OFFLINE_TOKEN env variable not defined".to_string(),
            )),
        }
    }

    async fn mint_download_url(&self, package: &RhPackage) -> kres_core::Result<String> {
        match self {
            PackageBackend::Rh(client) => client.mint_download_url(package).await,
            PackageBackend::Unconfigured => Err(KresError::Configuration(
                "RH_OFFLINE_TOKEN env variable not defined".to_string(),
            )),
        }
    }
}

fn parse_format_option(value: &str) -> anyhow::Result<(ReportFormat, Option<PathBuf>)> {
    let mut parts = value.trim().splitn(2, ',');
    let name = parts.next().unwrap_or_default();
    let format = name.parse::<ReportFormat>()?;
    let path = parts
        .next()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    Ok((format, path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level)
                .with_context(|| format!("invalid log level: {}", cli.log_level))?,
        )
        .init();

    let outputs = cli
        .formats
        .iter()
        .map(|option| parse_format_option(option))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let start = Utc::now();
    let mut distributions = Distributions::from_yaml_file(&cli.config)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;

    let art_token = std::env::var("ARTIFACTORY_TOKEN").unwrap_or_default();
    let rh_offline_token = std::env::var("RH_OFFLINE_TOKEN").unwrap_or_default();

    let cache = if cli.sync {
        if art_token.is_empty() {
            bail!("ARTIFACTORY_TOKEN env variable not set");
        }
        if distributions.artifactory_repo.is_empty() {
            bail!("artifactoryRepo not set in config file");
        }
        let store = ArtifactoryClient::new(&cli.art_base_url, &art_token);
        let entries = store
            .search(&distributions.artifactory_repo)
            .await
            .context("artifact cache query failed")?;
        tracing::info!(artifacts = entries.len(), "loaded artifact cache index");
        KernelCache::from_entries(&entries)
    } else {
        KernelCache::new()
    };

    let http = RetryingClient::new(10);
    let tags = GithubTagClient::new();
    let mirror_url = format!(
        "{}/{}",
        cli.art_base_url.trim_end_matches('/'),
        distributions.artifactory_repo
    );

    let mut kernels = Vec::new();
    for distro in &mut distributions.distributions {
        if !cli.sync {
            distro.use_artifact_cache(&mirror_url)?;
        }

        let packages = if distro.name == DistroFamily::Rhel && cli.sync {
            if rh_offline_token.is_empty() {
                tracing::error!(distro = %distro.name, "RH_OFFLINE_TOKEN env variable not defined");
                continue;
            }
            PackageBackend::Rh(RhApiClient::new(&rh_offline_token)?)
        } else {
            PackageBackend::Unconfigured
        };

        let resolver = Resolver::new(&http, &packages, &tags, &cache, cli.sync);
        let resolved = resolver
            .resolve_distribution(distro)
            .await
            .with_context(|| format!("resolution failed for {}", distro.name))?;
        tracing::info!(distro = %distro.name, kernels = resolved.len(), "distribution resolved");
        kernels.extend(resolved);
    }

    let report = ResolutionReport::new(start, Utc::now(), kernels);
    if outputs.is_empty() {
        print!("{}", report.render(ReportFormat::Table)?);
        return Ok(());
    }
    for (format, path) in outputs {
        let rendered = report.render(format)?;
        match path {
            Some(path) => std::fs::write(&path, rendered)
                .with_context(|| format!("cannot write report to {}", path.display()))?,
            None => print!("{}", rendered),
        }
    }
    Ok(())
}
