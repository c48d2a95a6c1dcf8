use anyhow::Context;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the first stream to the second.
    pub forwarded: u64,
    /// Bytes copied from the second stream back to the first.
    pub returned: u64,
}

/// Copy until `r` reaches EOF, then shut down `w` so the other end sees the EOF as well.
/// `count` keeps what was copied even if the copy fails half way.
async fn copy_half(
    mut r: impl AsyncRead + Unpin,
    mut w: impl AsyncWrite + Unpin,
    count: &mut u64,
) -> anyhow::Result<()> {
    let mut buf = vec![0u8; 8192];
    loop {
        match r.read(buf.as_mut_slice()).await.context("Reading")? {
            0 => break,
            v => {
                w.write_all(&buf.as_slice()[..v])
                    .await
                    .context("Writing")?;
                *count += v as u64;
            }
        }
    }

    w.shutdown().await.context("Shutting down")
}

/// Copy bytes between `a` and `b` in both directions until both directions are done.
///
/// One side finishing does not stop the other. Errors of either direction are logged
/// under `name` and end only that direction.
pub async fn relay(
    a: impl AsyncRead + AsyncWrite + Unpin,
    b: impl AsyncRead + AsyncWrite + Unpin,
    name: &str,
) -> RelayStats {
    let (ar, aw) = split(a);
    let (br, bw) = split(b);

    let mut stats = RelayStats::default();
    let (forward, back) = tokio::join!(
        copy_half(ar, bw, &mut stats.forwarded),
        copy_half(br, aw, &mut stats.returned),
    );

    if let Err(e) = forward {
        log::error!("{name}: client -> destination: {e:?}");
    }

    if let Err(e) = back {
        log::error!("{name}: destination -> client: {e:?}");
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::spawn;
    use tokio::time::timeout;

    #[tokio::test]
    async fn relays_both_directions_until_both_close() {
        let _ = env_logger::try_init();

        let (mut client, proxy_client) = duplex(64);
        let (proxy_upstream, mut upstream) = duplex(64);

        let task = spawn(async move { relay(proxy_client, proxy_upstream, "test").await });

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        upstream.write_all(b"world!").await.unwrap();
        let mut buf = [0u8; 6];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world!");

        // Client half-closes: upstream sees EOF but can still answer
        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        upstream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        upstream.write_all(b"bye").await.unwrap();
        let mut buf = [0u8; 3];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"bye");
        assert!(!task.is_finished());

        drop(upstream);
        let stats = timeout(Duration::from_secs(5), task)
            .await
            .expect("relay to finish")
            .unwrap();

        assert_eq!(
            stats,
            RelayStats {
                forwarded: 5,
                returned: 9,
            }
        );

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn error_on_one_side_still_finishes() {
        let _ = env_logger::try_init();

        let (client, proxy_client) = duplex(64);
        let (proxy_upstream, upstream) = duplex(64);

        drop(client);
        drop(upstream);

        let stats = timeout(
            Duration::from_secs(5),
            relay(proxy_client, proxy_upstream, "test"),
        )
        .await
        .expect("relay to finish");
        assert_eq!(stats, RelayStats::default());
    }
}
