use anyhow::Context;
use async_shutdown::Shutdown;
use clap::Parser;
use fwproxy::auth::BasicAuthSettings;
use fwproxy::config::ProxyConfig;
use fwproxy::dial::Direct;
use fwproxy::server::run_server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tokio::spawn;

/// Forward proxy for plain HTTP requests and CONNECT tunnels.
#[derive(Parser)]
struct Cli {
    /// Path to a YAML configuration file. Flags given here take precedence over it.
    #[clap(long)]
    config: Option<PathBuf>,

    /// The address to listen on [default: localhost:5050]
    #[clap(long)]
    listen: Option<String>,

    /// Credential clients must send as `Proxy-Authorization: Basic <credential>`.
    /// Authentication is disabled when no credential is given.
    #[clap(long, env = "PROXY_CREDENTIAL", conflicts_with = "user")]
    credential: Option<String>,

    /// Derive the credential from a user name and password.
    #[clap(long, requires = "password")]
    user: Option<String>,

    #[clap(long, requires = "user", env = "PROXY_PASSWORD")]
    password: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ProxyConfig> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::load(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen_address = listen;
        }

        match (self.credential, self.user, self.password) {
            (Some(credential), _, _) => config.shared_credential = credential,
            (None, Some(user), Some(password)) => {
                config.shared_credential = BasicAuthSettings { user, password }.to_credential()
            }
            _ => {}
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    let config = Arc::new(Cli::parse().into_config()?);

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("Binding tcp on {}", config.listen_address))?;

    log::info!(
        "Listening on {}, waiting for clients to connect",
        listener.local_addr()?
    );
    if config.auth_enabled() {
        log::info!("Proxy authentication enabled");
    } else {
        log::warn!("No credential configured, proxy authentication disabled");
    }

    let shutdown = Shutdown::new();
    let server = spawn(run_server(shutdown.clone(), listener, config, Direct));

    let _ = ctrl_c().await;
    log::info!("Shutting down");
    shutdown.shutdown();
    shutdown.wait_shutdown_complete().await;
    server.await??;
    Ok(())
}
