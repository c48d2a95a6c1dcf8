use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the connection to a request's destination.
#[async_trait]
pub trait Dialer {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn dial(&self, destination: &str) -> anyhow::Result<Self::Stream>;
}

/// Plain TCP to the destination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Direct;

#[async_trait]
impl Dialer for Direct {
    type Stream = TcpStream;

    async fn dial(&self, destination: &str) -> anyhow::Result<Self::Stream> {
        let stream = TcpStream::connect(destination)
            .await
            .with_context(|| format!("Connecting to {destination}"))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
