//! Updraft Server - main entry point
//!
//! Serves update manifests and assets over HTTP from a local directory
//! tree or a GitHub repository.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use updraft_lib::engine::{
    api::{create_router, ApiState},
    config::{parse_repo, ServerConfig, StoreBackend},
    signing::Signer,
};

#[derive(Parser)]
#[command(
    name = "updraft-server",
    version,
    about = "OTA update distribution server for the Expo Updates protocol"
)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// Directory containing the updates/ tree (local backend)
    #[arg(long, default_value = ".", env = "UPDATES_ROOT")]
    updates_dir: PathBuf,

    /// Serve bundles from a GitHub repository (owner/name) instead of disk
    #[arg(long, env = "UPDATES_REPO")]
    github_repo: Option<String>,

    /// Branch to read bundles from
    #[arg(long, default_value = "main")]
    github_branch: String,

    /// Token for private repositories and higher rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// PEM private key for code signing (PKCS#8 or PKCS#1)
    #[arg(long, env = "PRIVATE_KEY_PATH")]
    private_key: Option<PathBuf>,

    /// Public server address used in asset URLs, e.g. https://updates.example.com
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// The platform this deployment serves
    #[arg(long, default_value = "android")]
    platform: String,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let backend = match &self.github_repo {
            Some(repo) => {
                let (owner, name) = parse_repo(repo)?;
                StoreBackend::GitHub {
                    owner,
                    repo: name,
                    branch: self.github_branch.clone(),
                    token: self.github_token.clone(),
                }
            }
            None => StoreBackend::Local {
                root: self.updates_dir.clone(),
            },
        };
        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            platform: self.platform,
            public_url: self.public_url,
            private_key_path: self.private_key,
            backend,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_config()?;

    let signer = Signer::from_pem_file(config.private_key_path.as_deref())
        .context("failed to load signing key")?;
    if signer.is_configured() {
        tracing::info!("code signing enabled");
    }

    match &config.backend {
        StoreBackend::Local { root } => {
            tracing::info!(root = %root.display(), "serving updates from local directory")
        }
        StoreBackend::GitHub { owner, repo, branch, .. } => {
            tracing::info!(%owner, %repo, %branch, "serving updates from GitHub repository")
        }
    }

    let state = ApiState {
        store: config.build_store(),
        signer: Arc::new(signer),
        platform: config.platform.clone(),
        public_url: config.public_url.clone(),
    };
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!(%address, "updraft server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
