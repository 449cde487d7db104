use anyhow::{Context, Result};
use clap::Parser;
use node_updater::{GithubReleaseClient, TrustAnchor, Updater, Url};
use noded::{shutdown, ApiBuilder, DaemonArgs, ShutdownSignal};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse();

    let default_filter = if args.debug {
        "debug"
    } else {
        "info,noded=debug,node_updater=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let release_url = args
        .release_url
        .parse::<Url>()
        .with_context(|| format!("invalid release URL {}", args.release_url))?;
    let source = GithubReleaseClient::builder()
        .release_url(release_url)
        .max_archive_bytes(args.max_archive_bytes)
        .build()?;
    let config = args.updater_config()?;
    let updater = Arc::new(Updater::new(source, TrustAnchor::embedded()?, config));
    info!(
        version = noded::VERSION,
        install_dir = %updater.install_dir().display(),
        "starting node daemon"
    );
    for target in updater.config().plan.targets() {
        debug!(binary = %target, path = %updater.installed_path(target).display(), "update target");
    }

    let (trigger, signal) = shutdown::channel();
    let router = ApiBuilder::new(updater).shutdown(trigger).build()?;

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_stop(signal))
        .await?;

    info!("node daemon stopped");
    Ok(())
}

async fn wait_for_stop(signal: ShutdownSignal) {
    tokio::select! {
        _ = signal.wait() => info!("shutdown requested via API"),
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
    }
}
