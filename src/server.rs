use anyhow::{bail, Context};
use async_shutdown::Shutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::spawn;

use crate::auth::authenticate;
use crate::config::ProxyConfig;
use crate::dial::Dialer;
use crate::http::req::extract_tunnel_request;
use crate::http::res::{connection_established, proxy_auth_required};
use crate::relay::relay;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin the loop.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until `shutdown` fires, serving each one on its own task.
pub async fn run_server(
    shutdown: Shutdown,
    listener: TcpListener,
    config: Arc<ProxyConfig>,
    dialer: impl Dialer + Clone + Send + Sync + 'static,
) -> anyhow::Result<()> {
    while let Some(r) = shutdown.wrap_cancel(listener.accept()).await {
        let (conn, addr) = match r {
            Ok(v) => v,
            Err(e) => {
                backoff_after_accept_error(&e).await;
                continue;
            }
        };

        log::info!("New connection from {addr}");

        let shutdown = shutdown.clone();
        let config = config.clone();
        let dialer = dialer.clone();

        spawn(async move {
            if let Some(Err(e)) = shutdown
                .wrap_cancel(serve_conn(conn, addr, &config, &dialer))
                .await
            {
                log::error!("{addr}: Connection error: {e:?}");
            }

            log::info!("Connection closed from {addr}");
        });
    }

    Ok(())
}

async fn backoff_after_accept_error(e: &std::io::Error) {
    log::error!("Accepting connection: {e:?}");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Take one client connection from its opening request through to the end of the relay.
///
/// Both the client and the destination stream are dropped, and therefore closed, whichever
/// way this returns.
pub async fn serve_conn(
    conn: impl AsyncRead + AsyncWrite + Unpin + Send,
    addr: SocketAddr,
    config: &ProxyConfig,
    dialer: &impl Dialer,
) -> anyhow::Result<()> {
    let mut conn = BufReader::new(conn);

    let req = extract_tunnel_request(&mut conn)
        .await
        .context("Malformed HTTP request")?;

    log::debug!(
        "{addr}: {} {} -> {}",
        req.method,
        req.request_target,
        req.destination
    );

    if !authenticate(&config.shared_credential, &req.proxy_authorization) {
        if let Err(e) = proxy_auth_required().to_async(&mut conn).await {
            log::error!("{addr}: Sending auth challenge: {e:?}");
        }
        bail!("Proxy authentication failed for {}", req.destination);
    }

    log::info!("{addr}: Connecting to {}", req.destination);
    let mut upstream = dialer
        .dial(&req.destination)
        .await
        .context("Connecting to destination")?;

    if req.is_connect {
        connection_established()
            .to_async(&mut conn)
            .await
            .context("Replying to CONNECT")?;
    } else {
        upstream
            .write_all(&req.forwardable_header)
            .await
            .context("Forwarding request header")?;
    }

    let name = format!("{addr} <-> {}", req.destination);
    log::info!("Begin tunnel: {name}");
    let stats = relay(conn, upstream, &name).await;
    log::info!(
        "Stop tunnel: {name}, sent {} bytes, received {} bytes",
        stats.forwarded,
        stats.returned
    );

    Ok(())
}
