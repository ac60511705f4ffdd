//! Hub side of the registration exchange.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use dcpp_common::{nmdc_escape, normalize_target};
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::error::{AutoregError, AutoregResult};
use crate::framing::{scan_one, DELIMITER};
use crate::handshake::{Initiator, KeyDerivation, NmdcKeyDerivation};
use crate::info::HubInfo;

/// Hublist port used when the address does not name one.
pub const DEFAULT_PORT: u16 = 2501;

/// Connection deadline when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity for the hublist's `$Lock` command.
const LOCK_BUFFER_SIZE: usize = 512;

/// Register a hub on the hublist at `addr`.
///
/// The whole exchange, connect included, must finish before `deadline`
/// (default: [`DEFAULT_TIMEOUT`] from now). No response is read; success
/// means the registration was written and the connection closed.
pub async fn register(addr: &str, info: &HubInfo, deadline: Option<Instant>) -> AutoregResult<()> {
    let target = normalize_target(addr, DEFAULT_PORT);
    let deadline = deadline.unwrap_or_else(|| Instant::now() + DEFAULT_TIMEOUT);

    info!("Registering hub '{}' on hublist {}", info.name, target);
    timeout_at(deadline, async {
        let stream = TcpStream::connect(&target).await?;
        register_on(stream, info, &target, &NmdcKeyDerivation).await
    })
    .await?
}

/// Run the registration exchange over an already open stream.
///
/// `dialed` is the address used to reach the hublist; when non-empty it is
/// appended as a trailing field.
pub async fn register_on<S>(
    mut stream: S,
    info: &HubInfo,
    dialed: &str,
    derivation: &dyn KeyDerivation,
) -> AutoregResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if info.host.as_bytes().contains(&DELIMITER) {
        return Err(AutoregError::malformed(format!(
            "hub host contains '|': {:?}",
            info.host
        )));
    }

    let mut buf = [0u8; LOCK_BUFFER_SIZE];
    let (end, _) = scan_one(&mut stream, &mut buf).await?;

    let mut initiator = Initiator::new(derivation);
    let (lock, key_command) = initiator.answer(&buf[..end])?;
    debug!(
        "Answering lock {:?} (pk: {:?})",
        lock.challenge, lock.party_key
    );

    let mut out = BytesMut::with_capacity(key_command.len() + 128);
    out.put_slice(&key_command);
    put_field(&mut out, nmdc_escape(&info.name).as_bytes());
    put_field(&mut out, info.host.as_bytes());
    put_field(&mut out, nmdc_escape(&info.description).as_bytes());
    put_field(&mut out, info.users.to_string().as_bytes());
    put_field(&mut out, info.share.to_string().as_bytes());
    if !dialed.is_empty() {
        put_field(&mut out, dialed.as_bytes());
    }

    stream.write_all(&out).await?;
    stream.flush().await?;
    initiator.key_sent();
    stream.shutdown().await?;

    info!("Registered hub '{}' ({} users)", info.name, info.users);
    Ok(())
}

fn put_field(out: &mut BytesMut, value: &[u8]) {
    out.put_slice(value);
    out.put_u8(DELIMITER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn test_info() -> HubInfo {
        HubInfo {
            name: "TestHub".to_string(),
            host: "example.com:411".to_string(),
            description: "A|Test".to_string(),
            users: 5,
            share: 1_073_741_824,
        }
    }

    #[tokio::test]
    async fn test_register_on_writes_fields_in_order() {
        let (client, mut hublist) = tokio::io::duplex(1024);
        hublist.write_all(b"$Lock abc Pk=list|").await.unwrap();

        register_on(client, &test_info(), "", &NmdcKeyDerivation)
            .await
            .unwrap();

        let mut received = Vec::new();
        hublist.read_to_end(&mut received).await.unwrap();

        let key = NmdcKeyDerivation.derive_key(b"abc").to_command();
        let mut expected = key;
        expected.extend_from_slice(b"TestHub|example.com:411|A&#124;Test|5|1073741824|");
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_register_on_appends_dialed_address() {
        let (client, mut hublist) = tokio::io::duplex(1024);
        hublist.write_all(b"$Lock abc|").await.unwrap();

        register_on(client, &test_info(), "hublist.example:2501", &NmdcKeyDerivation)
            .await
            .unwrap();

        let mut received = Vec::new();
        hublist.read_to_end(&mut received).await.unwrap();
        assert!(received.ends_with(b"|1073741824|hublist.example:2501|"));
    }

    #[tokio::test]
    async fn test_register_on_rejects_wrong_marker() {
        let (client, mut hublist) = tokio::io::duplex(1024);
        hublist.write_all(b"$Hello abc|").await.unwrap();

        let err = register_on(client, &test_info(), "", &NmdcKeyDerivation)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoregError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_register_on_lock_too_long() {
        let (client, mut hublist) = tokio::io::duplex(4096);
        hublist.write_all(&[b'x'; 600]).await.unwrap();

        let err = register_on(client, &test_info(), "", &NmdcKeyDerivation)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoregError::ShortBuffer { capacity: 512 }));
    }

    #[tokio::test]
    async fn test_register_on_rejects_pipe_in_host() {
        let (client, _hublist) = tokio::io::duplex(1024);
        let info = HubInfo {
            host: "bad|host".to_string(),
            ..test_info()
        };
        let err = register_on(client, &info, "", &NmdcKeyDerivation)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoregError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_register_times_out_without_lock() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let deadline = Instant::now() + Duration::from_millis(100);
        let err = register(&addr.to_string(), &test_info(), Some(deadline))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        silent.abort();
    }
}
