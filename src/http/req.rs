use anyhow::{bail, Context};
use bytes::{BufMut, Bytes, BytesMut};
use hyper::{header, Uri};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::headers::Headers;

/// Upper bound for the request line plus all header lines.
pub const MAX_HEADER_LENGTH: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
    pub version: &'a str,
}

/// Split `GET /index.html HTTP/1.0` on its first two spaces.
pub fn parse_request_line(line: &str) -> anyhow::Result<RequestLine<'_>> {
    let parsed = line.split_once(' ').and_then(|(method, rest)| {
        rest.split_once(' ').map(|(target, version)| RequestLine {
            method,
            target,
            version,
        })
    });

    match parsed {
        Some(v) => Ok(v),
        None => bail!("Malformed HTTP request line: {line:?}"),
    }
}

/// What the proxy needs to know about a client's opening request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    pub method: String,
    pub request_target: String,
    pub is_connect: bool,
    /// Always `host:port` when taken from the request target. Taken verbatim from the
    /// `Host` header otherwise.
    pub destination: String,
    pub proxy_authorization: String,
    pub headers: Headers,
    /// Request line and headers as they go to the destination, ending with an empty line.
    pub forwardable_header: Bytes,
}

/// Read the request line and headers of one request.
///
/// Only the request head is consumed: anything the client pipelined after the empty line
/// stays in `r`.
pub async fn extract_tunnel_request(
    r: &mut (impl AsyncBufRead + Unpin),
) -> anyhow::Result<TunnelRequest> {
    let mut line_buf = Vec::new();
    let line_len = read_line(r, &mut line_buf, MAX_HEADER_LENGTH)
        .await
        .context("Reading request line")?;
    let request_line = std::str::from_utf8(trim_line_end(&line_buf))
        .context("Request line is not valid UTF-8")?;

    let RequestLine { method, target, .. } = parse_request_line(request_line)?;

    let is_connect = method == "CONNECT";
    let uri = if is_connect {
        format!("http://{target}").parse::<Uri>()
    } else {
        target.parse::<Uri>()
    }
    .with_context(|| format!("Parsing request target {target:?}"))?;

    // Outside CONNECT only absolute URIs, paths and `*` are request targets
    if !is_connect && uri.scheme().is_none() && !target.starts_with('/') && target != "*" {
        bail!("Invalid request target {target:?} for {method}");
    }

    let headers = read_headers(r, MAX_HEADER_LENGTH - line_len)
        .await
        .context("Reading request headers")?;

    let proxy_authorization = headers
        .get_header_text(header::PROXY_AUTHORIZATION)
        .unwrap_or_default()
        .to_string();

    let destination = match uri.authority() {
        Some(authority) if authority.as_str().ends_with(':') => {
            bail!("Empty port in request target {target:?}")
        }
        Some(authority) if !authority.host().is_empty() => match authority.port_u16() {
            Some(port) => format!("{}:{port}", authority.host()),
            None => format!("{}:80", authority.host()),
        },
        _ => match headers.get_header_text(header::HOST) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => bail!("Missing destination host for {target:?}"),
        },
    };

    let mut buf = BytesMut::with_capacity(line_len + 256);
    buf.put_slice(request_line.as_bytes());
    buf.put_slice(b"\r\n");
    for (name, value) in headers.iter() {
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value);
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");

    Ok(TunnelRequest {
        method: method.to_string(),
        request_target: target.to_string(),
        is_connect,
        destination,
        proxy_authorization,
        headers,
        forwardable_header: buf.freeze(),
    })
}

async fn read_headers(
    r: &mut (impl AsyncBufRead + Unpin),
    limit: usize,
) -> anyhow::Result<Headers> {
    let mut headers = Headers::default();
    let mut consumed = 0;
    let mut line = Vec::new();
    loop {
        let remaining = limit.saturating_sub(consumed);
        if remaining == 0 {
            bail!("Excess header length");
        }

        line.clear();
        consumed += read_line(r, &mut line, remaining).await?;
        if trim_line_end(&line).is_empty() {
            return Ok(headers);
        }

        // Terminate the field with an empty line so it parses on its own
        line.extend_from_slice(b"\r\n");
        let mut parsed = [httparse::EMPTY_HEADER; 1];
        match httparse::parse_headers(&line, &mut parsed).context("Parsing http header")? {
            httparse::Status::Complete((_, [h])) => {
                headers.append(h.name, Bytes::copy_from_slice(h.value.trim_ascii()))
            }
            _ => bail!("Malformed http header {:?}", String::from_utf8_lossy(&line)),
        }
    }
}

/// Append one `\n` terminated line to `out`, returning its length including the terminator.
async fn read_line(
    r: &mut (impl AsyncBufRead + Unpin),
    out: &mut Vec<u8>,
    limit: usize,
) -> anyhow::Result<usize> {
    let n = (&mut *r)
        .take(limit as u64)
        .read_until(b'\n', out)
        .await?;

    match out.last() {
        _ if n == 0 => bail!("EOF while reading request"),
        Some(b'\n') => Ok(n),
        _ if n >= limit => bail!("Excess header length"),
        _ => bail!("EOF while reading request"),
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
