use anyhow::Context;
use bytes::BytesMut;
use std::fmt::{Display, Write};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub struct ResponseWriter;

impl ResponseWriter {
    pub fn write(code: u16, reason: impl Display) -> HeaderWriter {
        let mut buf = BytesMut::new();
        write!(buf, "HTTP/1.1 {code} {reason}\r\n").unwrap();
        HeaderWriter(buf)
    }
}

pub struct HeaderWriter(BytesMut);

impl HeaderWriter {
    pub fn write_header(&mut self, name: impl Display, value: impl Display) -> &mut Self {
        write!(self.0, "{name}: {value}\r\n").unwrap();
        self
    }

    pub fn finish(mut self) -> BytesMut {
        self.0.extend_from_slice(b"\r\n");
        self.0
    }

    pub async fn to_async(self, w: &mut (impl AsyncWrite + Unpin)) -> anyhow::Result<()> {
        let buf = self.finish();
        w.write_all(&buf).await.context("Writing response")?;
        w.flush().await.context("Flushing response")
    }
}

/// Sent to the client once a CONNECT tunnel to the destination is up.
pub fn connection_established() -> HeaderWriter {
    ResponseWriter::write(200, "Connection established")
}

pub fn proxy_auth_required() -> HeaderWriter {
    let mut w = ResponseWriter::write(407, "Proxy Authentication Required");
    w.write_header("Proxy-Authenticate", r#"Basic realm="*""#);
    w
}
